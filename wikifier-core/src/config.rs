//! # Configuração do Wikifier
//!
//! Todos os parâmetros têm valores padrão, então um arquivo YAML só precisa
//! declarar o que muda:
//!
//! ```yaml
//! es_server: http://localhost:9200
//! es_index: ethiopia_wikifier_index
//! similarity_threshold: 0.6
//! census_code_file: /dados/ethiopia_census_code.csv
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::census::CensusCodeTable;
use crate::error::{WikifierError, WikifierResult};

/// Parâmetros do pipeline de wikificação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikifierConfig {
    /// URL base do servidor Elasticsearch.
    pub es_server: String,
    /// Nome do índice com os rótulos das regiões.
    pub es_index: String,
    /// Endpoint SPARQL usado no enriquecimento de aliases.
    pub sparql_server: String,
    /// Similaridade mínima (Jaccard) para considerar candidatos não exatos.
    pub similarity_threshold: f64,
    /// Fração mínima (estritamente maior) de códigos de censo na coluna
    /// para pular a busca no índice.
    pub census_threshold: f64,
    /// Número de resultados das consultas por frase e fuzzy.
    pub top_k: usize,
    /// Peso do campo `labels` em relação a `aliases`.
    pub label_weight: f64,
    /// Delimitador de hierarquia dentro de um rótulo ("Cidade<Região<País").
    pub level_delimiter: char,
    /// CSV opcional `codigo,qnode` com os códigos de censo.
    pub census_code_file: Option<PathBuf>,
    /// Timeout das requisições HTTP. `None` = sem timeout.
    pub request_timeout_secs: Option<u64>,
}

impl Default for WikifierConfig {
    fn default() -> Self {
        Self {
            es_server: "https://dsbox02.isi.edu:8888/es".to_string(),
            es_index: "ethiopia_wikifier_index".to_string(),
            sparql_server: "https://dsbox02.isi.edu:8888/bigdata/namespace/wdq/sparql".to_string(),
            similarity_threshold: 0.5,
            census_threshold: 0.9,
            top_k: 5,
            label_weight: 5.0,
            level_delimiter: '<',
            census_code_file: None,
            request_timeout_secs: None,
        }
    }
}

impl WikifierConfig {
    /// Lê e valida a configuração a partir de um texto YAML.
    pub fn from_yaml_str(text: &str) -> WikifierResult<Self> {
        let config: WikifierConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Lê e valida a configuração a partir de um arquivo YAML.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> WikifierResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Rejeita valores que tornariam o pipeline sem sentido.
    pub fn validate(&self) -> WikifierResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(WikifierError::Configuration(format!(
                "similarity_threshold deve estar em [0, 1], recebido {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.census_threshold) {
            return Err(WikifierError::Configuration(format!(
                "census_threshold deve estar em [0, 1], recebido {}",
                self.census_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(WikifierError::Configuration("top_k deve ser maior que zero".into()));
        }
        if self.label_weight <= 0.0 {
            return Err(WikifierError::Configuration("label_weight deve ser positivo".into()));
        }
        if self.level_delimiter.is_whitespace() {
            return Err(WikifierError::Configuration(
                "level_delimiter não pode ser espaço em branco".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Carrega a tabela de códigos de censo configurada (ou uma tabela vazia).
    pub fn load_census_table(&self) -> WikifierResult<CensusCodeTable> {
        match &self.census_code_file {
            Some(path) => CensusCodeTable::from_csv_path(path),
            None => Ok(CensusCodeTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = WikifierConfig::default();
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.census_threshold, 0.9);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.level_delimiter, '<');
        assert!(config.request_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = WikifierConfig::from_yaml_str(
            "es_server: http://localhost:9200\nsimilarity_threshold: 0.7\n",
        )
        .unwrap();
        assert_eq!(config.es_server, "http://localhost:9200");
        assert_eq!(config.similarity_threshold, 0.7);
        // Campos ausentes mantêm o padrão
        assert_eq!(config.es_index, "ethiopia_wikifier_index");
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = WikifierConfig::from_yaml_str("similarity_threshold: 1.5\n").unwrap_err();
        assert!(err.is_configuration());

        let err = WikifierConfig::from_yaml_str("top_k: 0\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_yaml_file_and_census_table() {
        let mut census = tempfile::NamedTempFile::new().unwrap();
        writeln!(census, "010101,Q1000001").unwrap();
        writeln!(census, "010102,Q1000002").unwrap();

        let mut yaml = tempfile::NamedTempFile::new().unwrap();
        writeln!(yaml, "census_code_file: {}", census.path().display()).unwrap();
        writeln!(yaml, "request_timeout_secs: 30").unwrap();

        let config = WikifierConfig::from_yaml_file(yaml.path()).unwrap();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));

        let table = config.load_census_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("010102"), Some("Q1000002"));
    }

    #[test]
    fn test_missing_census_file_is_empty_table() {
        let table = WikifierConfig::default().load_census_table().unwrap();
        assert!(table.is_empty());
    }
}

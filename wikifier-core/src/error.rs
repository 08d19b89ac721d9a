//! # Erros do Wikifier
//!
//! Apenas falhas de infraestrutura (índice, SPARQL, arquivos) e de configuração
//! viram erro. Uma menção sem candidato **não** é erro: ela gera uma linha de
//! saída com `item` vazio.

use thiserror::Error;

/// Erros que podem ocorrer durante a wikificação.
#[derive(Debug, Error)]
pub enum WikifierError {
    /// Falha de transporte, resposta vazia ou malformada do índice de busca.
    /// É fatal para a chamada de `produce` que a originou.
    #[error("Falha na consulta ao índice de busca: {0}")]
    Retrieval(String),

    /// Coluna alvo inexistente, tag de contexto inválida ou valor de
    /// configuração fora do intervalo. Levantado antes de qualquer consulta.
    #[error("Configuração inválida: {0}")]
    Configuration(String),

    /// Falha no endpoint SPARQL usado para enriquecer aliases.
    #[error("Falha na consulta SPARQL: {0}")]
    TripleStore(String),

    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erro de YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Erro HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

/// Tipo de resultado das operações do wikifier.
pub type WikifierResult<T> = Result<T, WikifierError>;

impl WikifierError {
    /// Indica se o erro aconteceu antes de qualquer consulta externa.
    pub fn is_configuration(&self) -> bool {
        matches!(self, WikifierError::Configuration(_))
    }
}

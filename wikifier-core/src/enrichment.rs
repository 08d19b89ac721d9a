//! # Enriquecimento de Aliases via SPARQL
//!
//! Antes de montar o índice, os nomes de cada região são completados com os
//! títulos dos artigos da Wikipédia ligados ao item (`schema:about`). Só
//! títulos escritos com caracteres latinos simples são aceitos.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::WikifierConfig;
use crate::error::{WikifierError, WikifierResult};
use crate::index_builder::LabelMemo;

/// Caracteres permitidos (em minúsculas) num título aceito como alias.
pub const ENGLISH_TITLE_CHARS: &str = "abcdefghijklmnopqrstuvwxyz_() 1234567890'";

/// Valor de uma variável num resultado SPARQL.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BindingValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Uma linha de resultado: variável → valor.
pub type Binding = HashMap<String, BindingValue>;

/// Endpoint capaz de responder consultas SELECT.
pub trait TripleStore: Send + Sync {
    fn select(&self, sparql: &str) -> WikifierResult<Vec<Binding>>;
}

/// Cliente SPARQL bloqueante (POST url-encoded, resultados em JSON).
pub struct SparqlClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl SparqlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> WikifierResult<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: endpoint.into(),
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &WikifierConfig) -> WikifierResult<Self> {
        Self::new(&config.sparql_server, config.request_timeout())
    }

    /// Extrai `results.bindings` de uma resposta JSON.
    pub fn parse_bindings(response: &Value) -> WikifierResult<Vec<Binding>> {
        let bindings = response
            .pointer("/results/bindings")
            .cloned()
            .ok_or_else(|| WikifierError::TripleStore("resposta sem results.bindings".into()))?;
        serde_json::from_value(bindings)
            .map_err(|e| WikifierError::TripleStore(format!("bindings inválidos: {}", e)))
    }
}

impl TripleStore for SparqlClient {
    fn select(&self, sparql: &str) -> WikifierResult<Vec<Binding>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", sparql)])
            .send()
            .map_err(|e| {
                WikifierError::TripleStore(format!("falha ao consultar {}: {}", self.endpoint, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikifierError::TripleStore(format!(
                "{} respondeu HTTP {}",
                self.endpoint, status
            )));
        }
        let value: Value = response
            .json()
            .map_err(|e| WikifierError::TripleStore(format!("JSON inválido: {}", e)))?;
        Self::parse_bindings(&value)
    }
}

/// Consulta dos artigos da Wikipédia ligados a cada item.
pub fn article_titles_query<S: AsRef<str>>(ids: &[S]) -> String {
    let values: Vec<String> = ids.iter().map(|id| format!("wd:{}", id.as_ref())).collect();
    format!(
        r#"SELECT DISTINCT ?item ?article WHERE {{
  values ?item {{{}}}
  ?article schema:about ?item ;
  FILTER (SUBSTR(str(?article), 12, 13) = "wikipedia.org")
}}"#,
        values.join(" ")
    )
}

/// Pares (id, título) dos artigos da Wikipédia dos itens.
///
/// O título vem da URL do artigo, decodificado e com `_` trocado por espaço.
pub fn article_titles<S: AsRef<str>>(
    store: &dyn TripleStore,
    ids: &[S],
) -> WikifierResult<Vec<(String, String)>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let bindings = store.select(&article_titles_query(ids))?;

    let mut titles = Vec::new();
    for binding in bindings {
        let (Some(item), Some(article)) = (binding.get("item"), binding.get("article")) else {
            continue;
        };
        if !article.value.contains("wikipedia.org/wiki/") {
            continue;
        }
        let id = item.value.rsplit('/').next().unwrap_or_default().to_string();
        let raw_title = article.value.rsplit("/wiki/").next().unwrap_or_default();
        match urlencoding::decode(raw_title) {
            Ok(title) => titles.push((id, title.replace('_', " "))),
            Err(e) => warn!("Título de artigo ignorado ({}): {}", raw_title, e),
        }
    }
    Ok(titles)
}

/// Título composto apenas de caracteres latinos simples.
pub fn is_english_title(title: &str) -> bool {
    title
        .to_lowercase()
        .chars()
        .all(|c| ENGLISH_TITLE_CHARS.contains(c))
}

/// Remove o trecho entre o primeiro `(` e o último `)`: "Bale (zone)" → "Bale".
pub fn strip_parenthetical(title: &str) -> Option<String> {
    let open = title.find('(')?;
    let close = title.rfind(')')?;
    if close < open {
        return None;
    }
    let stripped = format!("{}{}", &title[..open], &title[close + 1..]);
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Acrescenta ao memo os títulos aceitos e suas variantes sem parênteses.
/// Devolve quantos nomes novos entraram.
pub fn enrich_aliases(memo: &mut LabelMemo, store: &dyn TripleStore) -> WikifierResult<usize> {
    let ids: Vec<String> = memo.keys().cloned().collect();
    let titles = article_titles(store, ids.as_slice())?;

    let mut added = 0;
    for (id, title) in titles {
        if !is_english_title(&title) {
            continue;
        }
        let Some(names) = memo.get_mut(&id) else { continue };
        if let Some(stripped) = strip_parenthetical(&title) {
            if names.insert(stripped) {
                added += 1;
            }
        }
        if names.insert(title) {
            added += 1;
        }
    }
    info!("Enriquecimento SPARQL: {} nomes novos para {} itens", added, ids.len());
    Ok(added)
}

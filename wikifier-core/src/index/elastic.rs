//! Índice Elasticsearch via `_msearch`.
//!
//! Cada fase do retriever vira **uma** requisição HTTP: o corpo NDJSON tem
//! um par (cabeçalho, consulta) por termo e a resposta traz um item em
//! `responses` para cada par, na mesma ordem.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::{IndexHit, IndexQuery, SearchIndex};
use crate::candidate::MatchMethod;
use crate::config::WikifierConfig;
use crate::error::{WikifierError, WikifierResult};

/// Limite de resultados da busca exata (que não usa `top_k`).
pub const EXACT_MAX_HITS: usize = 100;

/// Sufixo do subcampo keyword normalizado em minúsculas.
const KEYWORD_LOWER: &str = "keyword_lower";

pub struct ElasticsearchIndex {
    server: String,
    index: String,
    client: reqwest::blocking::Client,
}

impl ElasticsearchIndex {
    /// Cria o cliente. Sem `timeout` a requisição espera indefinidamente.
    pub fn new(
        server: impl Into<String>,
        index: impl Into<String>,
        timeout: Option<Duration>,
    ) -> WikifierResult<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            server: server.into().trim_end_matches('/').to_string(),
            index: index.into(),
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &WikifierConfig) -> WikifierResult<Self> {
        Self::new(&config.es_server, &config.es_index, config.request_timeout())
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}/_msearch", self.server, self.index)
    }

    /// Corpo de uma consulta individual.
    pub fn query_body(query: &IndexQuery, term: &str) -> Value {
        let weighted_fields: Vec<String> = query
            .fields
            .iter()
            .map(|f| format!("{}^{}", f.name, f.weight))
            .collect();

        match query.mode {
            MatchMethod::ExactMatch => {
                let term_lower = term.trim().to_lowercase();
                let should: Vec<Value> = query
                    .fields
                    .iter()
                    .map(|f| {
                        let mut term_query = serde_json::Map::new();
                        term_query.insert(
                            format!("{}.{}", f.name, KEYWORD_LOWER),
                            json!({ "value": term_lower, "boost": f.weight }),
                        );
                        json!({ "term": term_query })
                    })
                    .collect();
                json!({
                    "size": query.top_k.unwrap_or(EXACT_MAX_HITS),
                    "query": { "bool": { "should": should, "minimum_should_match": 1 } }
                })
            }
            MatchMethod::PhraseMatch => json!({
                "size": query.top_k.unwrap_or(EXACT_MAX_HITS),
                "query": {
                    "multi_match": { "query": term, "type": "phrase", "fields": weighted_fields }
                }
            }),
            MatchMethod::FuzzyMatch => json!({
                "size": query.top_k.unwrap_or(EXACT_MAX_HITS),
                "query": {
                    "multi_match": { "query": term, "fields": weighted_fields, "fuzziness": "AUTO" }
                }
            }),
        }
    }

    /// Corpo NDJSON do `_msearch` (termina com quebra de linha).
    pub fn msearch_body(query: &IndexQuery) -> WikifierResult<String> {
        let mut body = String::new();
        for term in &query.terms {
            body.push_str("{}\n");
            body.push_str(&serde_json::to_string(&Self::query_body(query, term))?);
            body.push('\n');
        }
        Ok(body)
    }

    /// Converte a resposta do `_msearch` em resultados.
    ///
    /// Exige um item em `responses` por termo; qualquer item com `error`
    /// invalida a fase inteira.
    pub fn parse_response(query: &IndexQuery, response: &Value) -> WikifierResult<Vec<IndexHit>> {
        let responses = response
            .get("responses")
            .and_then(Value::as_array)
            .ok_or_else(|| WikifierError::Retrieval("resposta sem 'responses'".into()))?;

        if responses.len() != query.terms.len() {
            return Err(WikifierError::Retrieval(format!(
                "esperadas {} respostas, recebidas {}",
                query.terms.len(),
                responses.len()
            )));
        }

        let mut hits = Vec::new();
        for (term, item) in query.terms.iter().zip(responses) {
            if let Some(error) = item.get("error") {
                return Err(WikifierError::Retrieval(format!(
                    "erro do índice para '{}': {}",
                    term, error
                )));
            }
            let Some(raw_hits) = item.pointer("/hits/hits").and_then(Value::as_array) else {
                continue;
            };
            for raw in raw_hits {
                let source = raw.get("_source").cloned().unwrap_or(Value::Null);
                let kg_id = source
                    .get("id")
                    .and_then(Value::as_str)
                    .or_else(|| raw.get("_id").and_then(Value::as_str))
                    .unwrap_or_default()
                    .to_string();
                if kg_id.is_empty() {
                    continue;
                }
                let mut kg_labels = string_list(source.get("labels"));
                for alias in string_list(source.get("aliases")) {
                    if !kg_labels.contains(&alias) {
                        kg_labels.push(alias);
                    }
                }
                hits.push(IndexHit {
                    term: term.clone(),
                    kg_id,
                    kg_labels,
                    score: raw.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                });
            }
        }
        Ok(hits)
    }
}

/// Aceita tanto uma string quanto uma lista de strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>> {
        if query.terms.is_empty() {
            return Ok(Vec::new());
        }
        let body = Self::msearch_body(query)?;
        debug!(
            "_msearch {} com {} termos ({})",
            self.endpoint(),
            query.terms.len(),
            query.mode.label()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .map_err(|e| WikifierError::Retrieval(format!("falha de transporte: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| WikifierError::Retrieval(format!("falha ao ler resposta: {}", e)))?;
        if !status.is_success() {
            return Err(WikifierError::Retrieval(format!("HTTP {}: {}", status, text)));
        }
        if text.trim().is_empty() {
            return Err(WikifierError::Retrieval("resposta vazia".into()));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| WikifierError::Retrieval(format!("JSON inválido: {}", e)))?;
        Self::parse_response(query, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FieldWeight;

    fn query(mode: MatchMethod, terms: &[&str]) -> IndexQuery {
        IndexQuery {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            mode,
            fields: FieldWeight::label_fields(5.0),
            top_k: if mode == MatchMethod::ExactMatch { None } else { Some(5) },
        }
    }

    #[test]
    fn test_exact_body_uses_lowercase_keyword_fields() {
        let body = ElasticsearchIndex::query_body(&query(MatchMethod::ExactMatch, &[]), "Addis Ababa");
        let should = body.pointer("/query/bool/should").unwrap().as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(
            should[0].pointer("/term/labels.keyword_lower/value").unwrap(),
            "addis ababa"
        );
        assert_eq!(should[0].pointer("/term/labels.keyword_lower/boost").unwrap(), 5.0);
        assert_eq!(body["size"], EXACT_MAX_HITS);
    }

    #[test]
    fn test_phrase_and_fuzzy_bodies() {
        let phrase = ElasticsearchIndex::query_body(&query(MatchMethod::PhraseMatch, &[]), "bale");
        assert_eq!(phrase.pointer("/query/multi_match/type").unwrap(), "phrase");
        assert_eq!(phrase["size"], 5);

        let fuzzy = ElasticsearchIndex::query_body(&query(MatchMethod::FuzzyMatch, &[]), "bale");
        assert_eq!(fuzzy.pointer("/query/multi_match/fuzziness").unwrap(), "AUTO");
        let fields = fuzzy.pointer("/query/multi_match/fields").unwrap();
        assert_eq!(fields[0], "labels^5");
        assert_eq!(fields[1], "aliases^1");
    }

    #[test]
    fn test_msearch_body_is_ndjson() {
        let body = ElasticsearchIndex::msearch_body(&query(MatchMethod::PhraseMatch, &["bale", "oromia"]))
            .unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4, "um cabeçalho e uma consulta por termo");
        assert_eq!(lines[0], "{}");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_parse_response() {
        let response = json!({
            "responses": [
                { "hits": { "hits": [
                    { "_id": "doc1", "_score": 12.5,
                      "_source": { "id": "Q804254", "labels": ["Bale"], "aliases": ["bale<oromia", "Bale"] } },
                    { "_id": "Q999", "_score": 3.0, "_source": { "labels": "Bali" } }
                ] } },
                { "hits": { "hits": [] } }
            ]
        });
        let hits = ElasticsearchIndex::parse_response(
            &query(MatchMethod::FuzzyMatch, &["bale", "nada"]),
            &response,
        )
        .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].kg_id, "Q804254");
        assert_eq!(hits[0].kg_labels, vec!["Bale", "bale<oromia"]);
        assert_eq!(hits[0].score, 12.5);
        assert_eq!(hits[1].kg_id, "Q999", "sem _source.id usa _id");
        assert_eq!(hits[1].term, "bale");
    }

    #[test]
    fn test_parse_response_errors() {
        let q = query(MatchMethod::ExactMatch, &["bale"]);
        let err = ElasticsearchIndex::parse_response(&q, &json!({})).unwrap_err();
        assert!(matches!(err, WikifierError::Retrieval(_)));

        let err = ElasticsearchIndex::parse_response(&q, &json!({ "responses": [] })).unwrap_err();
        assert!(matches!(err, WikifierError::Retrieval(_)));

        let err = ElasticsearchIndex::parse_response(
            &q,
            &json!({ "responses": [ { "error": { "type": "index_not_found_exception" } } ] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("index_not_found"));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let index = ElasticsearchIndex::new("http://localhost:9200/", "regioes", None).unwrap();
        assert_eq!(index.endpoint(), "http://localhost:9200/regioes/_msearch");
    }
}

//! # Índice de Busca
//!
//! O wikifier não implementa ranking textual: ele consulta um índice externo
//! através do trait [`SearchIndex`] e arbitra entre os resultados.
//!
//! Cada consulta é um lote: vários termos, um único método de busca
//! (exato, frase ou fuzzy) e os campos com seus pesos. Implementações:
//!
//! - [`ElasticsearchIndex`]: `_msearch` sobre HTTP (cliente bloqueante).
//! - [`MemoryIndex`]: índice em memória para testes, demo e execuções offline.

mod elastic;
mod memory;

pub use elastic::ElasticsearchIndex;
pub use memory::MemoryIndex;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidate::MatchMethod;
use crate::error::WikifierResult;

/// Campo do índice e seu peso de relevância.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    pub name: String,
    pub weight: f64,
}

impl FieldWeight {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// `labels` com o peso configurado e `aliases` com peso 1.
    pub fn label_fields(label_weight: f64) -> Vec<FieldWeight> {
        vec![
            FieldWeight::new("labels", label_weight),
            FieldWeight::new("aliases", 1.0),
        ]
    }
}

/// Uma consulta em lote.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    /// Termos distintos a procurar.
    pub terms: Vec<String>,
    pub mode: MatchMethod,
    pub fields: Vec<FieldWeight>,
    /// Máximo de resultados por termo. `None` = sem limite (busca exata).
    pub top_k: Option<usize>,
}

/// Um resultado bruto do índice, antes da normalização.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    /// Termo da consulta que produziu este resultado.
    pub term: String,
    pub kg_id: String,
    pub kg_labels: Vec<String>,
    pub score: f64,
}

/// Contrato do índice de busca consumido pelo retriever.
///
/// Falha de transporte ou resposta malformada deve virar
/// [`WikifierError::Retrieval`](crate::error::WikifierError::Retrieval).
pub trait SearchIndex: Send + Sync {
    fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>>;
}

impl<T: SearchIndex + ?Sized> SearchIndex for Arc<T> {
    fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>> {
        (**self).query(query)
    }
}

impl<T: SearchIndex + ?Sized> SearchIndex for &T {
    fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>> {
        (**self).query(query)
    }
}

/// Documento indexável: uma entidade do grafo com rótulos e aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub kg_id: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl IndexDocument {
    pub fn new<L, A>(kg_id: impl Into<String>, labels: L, aliases: A) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            kg_id: kg_id.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    /// Rótulos seguidos dos aliases, sem repetição, na ordem original.
    pub fn all_labels(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::with_capacity(self.labels.len() + self.aliases.len());
        for label in self.labels.iter().chain(self.aliases.iter()) {
            if !all.contains(label) {
                all.push(label.clone());
            }
        }
        all
    }

    /// Valores de um campo pelo nome (`labels` ou `aliases`).
    pub fn field(&self, name: &str) -> &[String] {
        match name {
            "labels" => &self.labels,
            "aliases" => &self.aliases,
            _ => &[],
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Índice roteirizado para testes: respostas fixas por (método, termo).

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::WikifierError;

    #[derive(Default)]
    pub(crate) struct ScriptedIndex {
        hits: HashMap<(MatchMethod, String), Vec<(String, Vec<String>, f64)>>,
        fail: bool,
        pub(crate) queries: Mutex<Vec<IndexQuery>>,
    }

    impl ScriptedIndex {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Índice que falha em qualquer consulta.
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn with_hit(
            mut self,
            mode: MatchMethod,
            term: &str,
            kg_id: &str,
            labels: &[&str],
            score: f64,
        ) -> Self {
            self.hits.entry((mode, term.to_string())).or_default().push((
                kg_id.to_string(),
                labels.iter().map(|l| l.to_string()).collect(),
                score,
            ));
            self
        }

        pub(crate) fn recorded(&self) -> Vec<IndexQuery> {
            self.queries.lock().map(|q| q.clone()).unwrap_or_default()
        }
    }

    impl SearchIndex for ScriptedIndex {
        fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>> {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push(query.clone());
            }
            if self.fail {
                return Err(WikifierError::Retrieval("índice indisponível".into()));
            }
            let mut out = Vec::new();
            for term in &query.terms {
                if let Some(hits) = self.hits.get(&(query.mode, term.clone())) {
                    let limit = query.top_k.unwrap_or(usize::MAX);
                    for (kg_id, labels, score) in hits.iter().take(limit) {
                        out.push(IndexHit {
                            term: term.clone(),
                            kg_id: kg_id.clone(),
                            kg_labels: labels.clone(),
                            score: *score,
                        });
                    }
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_labels_dedup_in_order() {
        let doc = IndexDocument::new("Q1", ["Bale", "bale"], ["bale", "bale<oromia"]);
        assert_eq!(doc.all_labels(), vec!["Bale", "bale", "bale<oromia"]);
        assert_eq!(doc.field("aliases").len(), 2);
        assert!(doc.field("descricao").is_empty());
    }

    #[test]
    fn test_label_fields_weights() {
        let fields = FieldWeight::label_fields(5.0);
        assert_eq!(fields[0].name, "labels");
        assert_eq!(fields[0].weight, 5.0);
        assert_eq!(fields[1].weight, 1.0);
    }

    #[test]
    fn test_document_json_aliases_default() {
        let doc: IndexDocument =
            serde_json::from_str(r#"{"kg_id":"Q115","labels":["Ethiopia"]}"#).unwrap();
        assert!(doc.aliases.is_empty());
    }
}

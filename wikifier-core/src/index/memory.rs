//! Índice em memória.
//!
//! Reproduz os três modos de busca de forma simples e determinística:
//!
//! - **exato**: igualdade sem distinção de maiúsculas com algum rótulo;
//! - **frase**: as palavras do termo aparecem contíguas num rótulo, com
//!   score proporcional à cobertura;
//! - **fuzzy**: melhor `strsim::jaro_winkler` acima de [`FUZZY_MIN_SIMILARITY`].
//!
//! O score é multiplicado pelo peso do campo; vale o maior entre os campos.

use std::path::Path;

use tracing::info;

use super::{IndexDocument, IndexHit, IndexQuery, SearchIndex};
use crate::candidate::MatchMethod;
use crate::error::WikifierResult;
use crate::similarity::clean_label;

/// Similaridade mínima para um resultado fuzzy.
pub const FUZZY_MIN_SIMILARITY: f64 = 0.85;

#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    documents: Vec<IndexDocument>,
}

impl MemoryIndex {
    pub fn new(documents: Vec<IndexDocument>) -> Self {
        Self { documents }
    }

    /// Carrega um arquivo JSON com uma lista de [`IndexDocument`].
    pub fn from_json_path(path: impl AsRef<Path>) -> WikifierResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let documents: Vec<IndexDocument> = serde_json::from_str(&text)?;
        info!(
            "Índice em memória carregado de {}: {} documentos",
            path.as_ref().display(),
            documents.len()
        );
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[IndexDocument] {
        &self.documents
    }

    fn score_value(mode: MatchMethod, term: &str, term_tokens: &[&str], value: &str) -> f64 {
        match mode {
            MatchMethod::ExactMatch => {
                if value.trim().to_lowercase() == term {
                    1.0
                } else {
                    0.0
                }
            }
            MatchMethod::PhraseMatch => {
                let cleaned = clean_label(value);
                let value_tokens: Vec<&str> = cleaned.split_whitespace().collect();
                let contiguous = !term_tokens.is_empty()
                    && value_tokens
                        .windows(term_tokens.len())
                        .any(|window| window == term_tokens);
                if contiguous {
                    term_tokens.len() as f64 / value_tokens.len() as f64
                } else {
                    0.0
                }
            }
            MatchMethod::FuzzyMatch => {
                let similarity = strsim::jaro_winkler(term, &value.trim().to_lowercase());
                if similarity >= FUZZY_MIN_SIMILARITY {
                    similarity
                } else {
                    0.0
                }
            }
        }
    }
}

impl SearchIndex for MemoryIndex {
    fn query(&self, query: &IndexQuery) -> WikifierResult<Vec<IndexHit>> {
        let mut hits = Vec::new();

        for term in &query.terms {
            let term_lower = term.trim().to_lowercase();
            let term_clean = clean_label(term);
            let term_tokens: Vec<&str> = term_clean.split_whitespace().collect();

            let mut scored: Vec<(usize, f64)> = Vec::new();
            for (position, document) in self.documents.iter().enumerate() {
                let mut best = 0.0_f64;
                for field in &query.fields {
                    for value in document.field(&field.name) {
                        let score =
                            Self::score_value(query.mode, &term_lower, &term_tokens, value) * field.weight;
                        best = best.max(score);
                    }
                }
                if best > 0.0 {
                    scored.push((position, best));
                }
            }

            // Ordenação estável: empates mantêm a ordem dos documentos
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            if let Some(limit) = query.top_k {
                scored.truncate(limit);
            }

            hits.extend(scored.into_iter().map(|(position, score)| {
                let document = &self.documents[position];
                IndexHit {
                    term: term.clone(),
                    kg_id: document.kg_id.clone(),
                    kg_labels: document.all_labels(),
                    score,
                }
            }));
        }

        Ok(hits)
    }
}

//! # Similaridade e Normalização de Rótulos
//!
//! Três transformações de texto convivem no pipeline e **não** são
//! intercambiáveis:
//!
//! - [`clean_label`]: o texto enviado ao índice na primeira passada
//!   ("Mi'irabawi Gojjam!" -> "mi'irabawi gojjam").
//! - [`remove_punctuation`]: o texto da segunda passada; remove pontuação
//!   **e** junta as palavras ("Addis Ababa" -> "addisababa").
//! - [`SimilarityScorer::tokens`]: a tokenização da similaridade, que troca
//!   pontuação por espaço ("Bale<Oromia" -> {"bale", "oromia"}).

use std::collections::HashSet;

/// Similaridade de Jaccard entre conjuntos de palavras.
///
/// `|A ∩ B| / |A ∪ B|`, simétrica e determinística. Dois textos sem nenhuma
/// palavra têm similaridade 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityScorer {
    ignore_case: bool,
}

impl SimilarityScorer {
    pub fn new(ignore_case: bool) -> Self {
        Self { ignore_case }
    }

    /// Conjunto de palavras: pontuação vira espaço, depois separa por espaços.
    pub fn tokens(&self, text: &str) -> HashSet<String> {
        let spaced: String = text
            .chars()
            .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
            .collect();
        spaced
            .split_whitespace()
            .map(|w| {
                if self.ignore_case {
                    w.to_lowercase()
                } else {
                    w.to_string()
                }
            })
            .collect()
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let tokens_a = self.tokens(a);
        let tokens_b = self.tokens(b);

        let union = tokens_a.union(&tokens_b).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = tokens_a.intersection(&tokens_b).count();
        intersection as f64 / union as f64
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Normaliza o rótulo usado na consulta ao índice.
///
/// Minúsculas, tudo que não é alfanumérico, espaço ou apóstrofo vira espaço,
/// espaços colapsados.
pub fn clean_label(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove pontuação e espaços, juntando as palavras (consulta da segunda passada).
pub fn remove_punctuation(text: &str) -> String {
    let spaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect();
    spaced.split_whitespace().collect()
}

/// Número de palavras de uma menção (separadas por espaço).
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Remove aspas duplas que envolvem um rótulo vindo do grafo (`"Bale"` -> `Bale`).
pub fn strip_quotes(label: &str) -> &str {
    if label.len() >= 2 && label.starts_with('"') && label.ends_with('"') {
        &label[1..label.len() - 1]
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_similarity_identical_ignore_case() {
        let scorer = SimilarityScorer::default();
        assert!(approx_eq(scorer.similarity("Addis Ababa", "addis ababa"), 1.0));
    }

    #[test]
    fn test_similarity_partial_overlap() {
        let scorer = SimilarityScorer::default();
        // {west, gojjam} vs {gojjam}: 1 / 2
        assert!(approx_eq(scorer.similarity("west gojjam", "Gojjam"), 0.5));
        // Pontuação separa palavras: {bale, oromia} vs {bale}
        assert!(approx_eq(scorer.similarity("bale", "Bale<Oromia"), 0.5));
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let scorer = SimilarityScorer::default();
        let a = "north shewa zone";
        let b = "Semien Shewa";
        assert!(approx_eq(scorer.similarity(a, b), scorer.similarity(b, a)));
    }

    #[test]
    fn test_similarity_case_sensitive() {
        let scorer = SimilarityScorer::new(false);
        assert!(approx_eq(scorer.similarity("Bale", "bale"), 0.0));
    }

    #[test]
    fn test_similarity_empty() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.similarity("", "   "), 0.0);
        assert_eq!(scorer.similarity("!!", "Bale"), 0.0);
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("  Mi'irabawi   Gojjam! "), "mi'irabawi gojjam");
        assert_eq!(clean_label("Bale-Zone"), "bale zone");
    }

    #[test]
    fn test_remove_punctuation_joins_words() {
        assert_eq!(remove_punctuation("Addis Ababa"), "addisababa");
        assert_eq!(remove_punctuation("Mi'irabawi Gojjam"), "miirabawigojjam");
        assert_eq!(remove_punctuation("..."), "");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Bale\""), "Bale");
        assert_eq!(strip_quotes("Bale"), "Bale");
        assert_eq!(strip_quotes("\""), "\"");
    }
}

//! # Recuperação de Candidatos
//!
//! A primeira passada consulta o índice com o rótulo limpo de cada menção,
//! em três fases (exata, frase, fuzzy), e monta a [`CandidateTable`].
//! A segunda passada reconsulta, sem pontuação, as menções que ficaram sem
//! resultado ou que têm várias palavras e nenhum match exato.
//!
//! Cada fase é uma única consulta em lote com os termos distintos. Os
//! resultados são distribuídos de volta para todas as menções com o mesmo
//! termo.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::candidate::{hierarchy_level, Candidate, CandidateGroup, CandidateTable, MatchMethod};
use crate::config::WikifierConfig;
use crate::error::{WikifierError, WikifierResult};
use crate::index::{FieldWeight, IndexHit, IndexQuery, SearchIndex};
use crate::similarity::{clean_label, remove_punctuation, word_count};
use crate::table::{Mention, Table};

/// Uma menção e o texto efetivamente enviado ao índice.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMention {
    pub mention: Mention,
    pub query: String,
}

impl QueryMention {
    pub fn new(mention: Mention, query: impl Into<String>) -> Self {
        Self {
            mention,
            query: query.into(),
        }
    }
}

/// Resultado normalizado de um termo, já deduplicado por `kg_id`.
#[derive(Debug, Clone)]
struct ScoredHit {
    kg_id: String,
    kg_labels: Vec<String>,
    method: MatchMethod,
    retrieval_score: f64,
    normalized_score: f64,
}

/// Consulta o índice e monta a tabela de candidatos.
pub struct CandidateRetriever<'a> {
    index: &'a dyn SearchIndex,
    fields: Vec<FieldWeight>,
    top_k: usize,
    level_delimiter: char,
}

impl<'a> CandidateRetriever<'a> {
    pub fn new(index: &'a dyn SearchIndex, config: &WikifierConfig) -> Self {
        Self {
            index,
            fields: FieldWeight::label_fields(config.label_weight),
            top_k: config.top_k,
            level_delimiter: config.level_delimiter,
        }
    }

    /// Primeira passada sobre a coluna `column` (pelo nome).
    pub fn retrieve(&self, table: &Table, column: &str) -> WikifierResult<CandidateTable> {
        let column_index = table.column_index(column).ok_or_else(|| {
            WikifierError::Configuration(format!("coluna '{}' não existe na tabela", column))
        })?;
        self.retrieve_column(table, column_index)
    }

    pub fn retrieve_column(&self, table: &Table, column: usize) -> WikifierResult<CandidateTable> {
        let mentions: Vec<QueryMention> = table
            .mentions(column)
            .into_iter()
            .map(|m| {
                let query = clean_label(&m.label);
                QueryMention::new(m, query)
            })
            .collect();
        self.retrieve_mentions(&mentions)
    }

    /// Consulta os termos distintos nas três fases e distribui os resultados.
    ///
    /// Menções sem nenhum resultado recebem um sentinela "sem match".
    pub fn retrieve_mentions(&self, mentions: &[QueryMention]) -> WikifierResult<CandidateTable> {
        let mut terms: Vec<String> = Vec::new();
        for m in mentions {
            if !m.query.is_empty() && !terms.contains(&m.query) {
                terms.push(m.query.clone());
            }
        }

        let by_term = if terms.is_empty() {
            HashMap::new()
        } else {
            self.query_all_phases(&terms)?
        };

        let mut rows = Vec::new();
        for m in mentions {
            match by_term.get(&m.query) {
                Some(hits) if !hits.is_empty() => {
                    rows.extend(hits.iter().map(|hit| self.to_candidate(m, hit)));
                }
                _ => rows.push(Candidate::no_match_for(&m.mention, &m.query)),
            }
        }

        let table = CandidateTable::new(rows);
        info!(
            "Recuperação: {} menções, {} termos distintos, {} candidatos",
            mentions.len(),
            terms.len(),
            table.match_count()
        );
        Ok(table)
    }

    fn query_all_phases(&self, terms: &[String]) -> WikifierResult<HashMap<String, Vec<ScoredHit>>> {
        let mut by_term: HashMap<String, Vec<ScoredHit>> = HashMap::new();

        for method in MatchMethod::ALL {
            let query = IndexQuery {
                terms: terms.to_vec(),
                mode: method,
                fields: self.fields.clone(),
                top_k: match method {
                    MatchMethod::ExactMatch => None,
                    _ => Some(self.top_k),
                },
            };
            let hits = self.index.query(&query)?;
            debug!("Fase {}: {} resultados", method.label(), hits.len());

            let max_score = hits.iter().map(|h| h.score).fold(0.0_f64, f64::max);
            for hit in hits {
                let normalized = if max_score > 0.0 { hit.score / max_score } else { 0.0 };
                let entry = by_term.entry(hit.term.clone()).or_default();
                Self::insert_dedup(entry, hit, method, normalized);
            }
        }
        Ok(by_term)
    }

    /// Um `kg_id` por termo: o match exato sempre vence; entre os demais
    /// fica o maior score normalizado, na posição em que apareceu primeiro.
    fn insert_dedup(entry: &mut Vec<ScoredHit>, hit: IndexHit, method: MatchMethod, normalized: f64) {
        match entry.iter_mut().find(|existing| existing.kg_id == hit.kg_id) {
            Some(existing) => {
                if existing.method != MatchMethod::ExactMatch
                    && (method == MatchMethod::ExactMatch || normalized > existing.normalized_score)
                {
                    existing.kg_labels = hit.kg_labels;
                    existing.method = method;
                    existing.retrieval_score = hit.score;
                    existing.normalized_score = normalized;
                }
            }
            None => entry.push(ScoredHit {
                kg_id: hit.kg_id,
                kg_labels: hit.kg_labels,
                method,
                retrieval_score: hit.score,
                normalized_score: normalized,
            }),
        }
    }

    fn to_candidate(&self, m: &QueryMention, hit: &ScoredHit) -> Candidate {
        Candidate {
            column: m.mention.column,
            row: m.mention.row,
            label: m.mention.label.clone(),
            label_clean: m.query.clone(),
            other_information: m.mention.other_information.clone(),
            kg_id: hit.kg_id.clone(),
            kg_labels: hit.kg_labels.clone(),
            method: hit.method,
            retrieval_score: hit.retrieval_score,
            normalized_score: hit.normalized_score,
            level: hierarchy_level(&hit.kg_labels, self.level_delimiter),
        }
    }
}

/// Segunda passada: reconsulta sem pontuação.
pub struct SecondPassRetriever<'r, 'a> {
    retriever: &'r CandidateRetriever<'a>,
}

impl<'r, 'a> SecondPassRetriever<'r, 'a> {
    pub fn new(retriever: &'r CandidateRetriever<'a>) -> Self {
        Self { retriever }
    }

    /// Menções que merecem nova consulta: grupo sem candidatos reais, ou sem
    /// match exato e com mais de uma palavra.
    pub fn select(groups: &[CandidateGroup]) -> Vec<QueryMention> {
        groups
            .iter()
            .filter(|g| {
                let Some(first) = g.first() else { return false };
                !g.has_matches() || (!g.has_exact_match() && word_count(&first.label) > 1)
            })
            .filter_map(|g| {
                let first = g.first()?;
                let query = remove_punctuation(&first.label);
                if query.is_empty() {
                    return None;
                }
                let mention = Mention {
                    column: first.column,
                    row: first.row,
                    label: first.label.clone(),
                    other_information: first.other_information.clone(),
                };
                Some(QueryMention::new(mention, query))
            })
            .collect()
    }

    /// Consulta as menções selecionadas; só candidatos reais são devolvidos.
    pub fn retrieve_second_pass(&self, selected: &[QueryMention]) -> WikifierResult<CandidateTable> {
        let table = self.retriever.retrieve_mentions(selected)?;
        let rows = table.into_rows().into_iter().filter(Candidate::is_match).collect();
        Ok(CandidateTable::new(rows))
    }

    /// Executa a segunda passada sobre a tabela da primeira.
    ///
    /// Devolve a tabela combinada e quantas menções foram reconsultadas.
    /// Sem menções selecionadas, a tabela volta inalterada e o índice não é
    /// consultado.
    pub fn run(&self, first_pass: CandidateTable) -> WikifierResult<(CandidateTable, usize)> {
        let selected = Self::select(&first_pass.groups());
        if selected.is_empty() {
            debug!("Segunda passada: nenhuma menção selecionada");
            return Ok((first_pass, 0));
        }

        let second_pass = self.retrieve_second_pass(&selected)?;
        info!(
            "Segunda passada: {} menções reconsultadas, {} novos candidatos",
            selected.len(),
            second_pass.len()
        );
        Ok((CandidateTable::merge(first_pass, second_pass), selected.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::testing::ScriptedIndex;

    fn table(values: &[&str]) -> Table {
        let mut table = Table::new(vec!["admin2".into(), "admin1".into()]);
        for v in values {
            table.push_row(vec![Some(v.to_string()), Some("Oromia".into())]);
        }
        table
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let index = ScriptedIndex::new();
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let err = retriever.retrieve(&table(&["Bale"]), "admin3").unwrap_err();
        assert!(err.is_configuration());
        assert!(index.recorded().is_empty(), "nenhuma consulta antes do erro");
    }

    #[test]
    fn test_three_phases_with_distinct_terms() {
        let index = ScriptedIndex::new().with_hit(MatchMethod::ExactMatch, "bale", "Q1", &["Bale"], 10.0);
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let candidates = retriever.retrieve(&table(&["Bale", "BALE!", "Arsi"]), "admin2").unwrap();

        let queries = index.recorded();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].mode, MatchMethod::ExactMatch);
        assert_eq!(queries[0].top_k, None);
        assert_eq!(queries[1].top_k, Some(5));
        assert_eq!(queries[0].terms, vec!["bale", "arsi"]);

        // "Bale" e "BALE!" compartilham o termo; "Arsi" vira sentinela
        let groups = candidates.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].candidates[0].kg_id, "Q1");
        assert_eq!(groups[1].candidates[0].kg_id, "Q1");
        assert_eq!(groups[1].candidates[0].label, "BALE!");
        assert!(!groups[2].has_matches());
        assert_eq!(groups[2].candidates[0].other_information, "Oromia");
    }

    #[test]
    fn test_duplicate_keeps_exact_match() {
        let index = ScriptedIndex::new()
            .with_hit(MatchMethod::FuzzyMatch, "bale", "Q1", &["Bale"], 9.0)
            .with_hit(MatchMethod::ExactMatch, "bale", "Q1", &["Bale"], 2.0)
            .with_hit(MatchMethod::FuzzyMatch, "bale", "Q2", &["Bali<Indonesia"], 3.0);
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let candidates = retriever.retrieve(&table(&["Bale"]), "admin2").unwrap();

        let rows = candidates.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kg_id, "Q1");
        assert_eq!(rows[0].method, MatchMethod::ExactMatch);
        assert_eq!(rows[0].normalized_score, 1.0);
        assert_eq!(rows[1].kg_id, "Q2");
        // 3.0 / 9.0 (máximo da fase fuzzy)
        assert!((rows[1].normalized_score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(rows[1].level, 2);
    }

    #[test]
    fn test_retrieval_error_propagates() {
        let index = ScriptedIndex::failing();
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let err = retriever.retrieve(&table(&["Bale"]), "admin2").unwrap_err();
        assert!(matches!(err, WikifierError::Retrieval(_)));
    }

    #[test]
    fn test_only_punctuation_mention_is_not_queried() {
        let index = ScriptedIndex::new();
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let candidates = retriever.retrieve(&table(&["--"]), "admin2").unwrap();
        assert!(index.recorded().is_empty());
        assert_eq!(candidates.len(), 1);
        assert!(!candidates.rows()[0].is_match());
    }

    #[test]
    fn test_second_pass_selection_rule() {
        let c = |row: usize, label: &str, kg_id: &str, method: MatchMethod| {
            let mut candidate = crate::candidate::tests::candidate(row, kg_id, &["x"], method, 1.0);
            candidate.label = label.to_string();
            candidate
        };
        let groups = vec![
            // sem candidatos reais
            CandidateGroup::new(0, 0, vec![Candidate::no_match(&c(0, "Xyz", "Q0", MatchMethod::ExactMatch))]),
            // várias palavras, sem exato
            CandidateGroup::new(0, 1, vec![c(1, "West Gojjam", "Q1", MatchMethod::FuzzyMatch)]),
            // uma palavra, sem exato
            CandidateGroup::new(0, 2, vec![c(2, "Gojjam", "Q2", MatchMethod::FuzzyMatch)]),
            // várias palavras, com exato
            CandidateGroup::new(0, 3, vec![c(3, "Addis Ababa", "Q3", MatchMethod::ExactMatch)]),
        ];
        let selected = SecondPassRetriever::select(&groups);
        let rows: Vec<usize> = selected.iter().map(|s| s.mention.row).collect();
        assert_eq!(rows, vec![0, 1]);
        assert_eq!(selected[1].query, "westgojjam");
    }

    #[test]
    fn test_second_pass_merges_before_first_pass() {
        let index = ScriptedIndex::new()
            .with_hit(MatchMethod::FuzzyMatch, "west gojjam", "Q1", &["Gojjam"], 2.0)
            .with_hit(MatchMethod::ExactMatch, "westgojjam", "Q9", &["Westgojjam"], 1.0);
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let first = retriever.retrieve(&table(&["West Gojjam"]), "admin2").unwrap();

        let second = SecondPassRetriever::new(&retriever);
        let (merged, requeried) = second.run(first).unwrap();
        assert_eq!(requeried, 1);
        let group = &merged.groups()[0];
        assert_eq!(group.candidates[0].kg_id, "Q9");
        assert_eq!(group.candidates[0].label_clean, "westgojjam");
        assert_eq!(group.candidates[1].kg_id, "Q1");
        assert_eq!(index.recorded().len(), 6, "três fases em cada passada");
    }

    #[test]
    fn test_second_pass_skipped_when_nothing_selected() {
        let index = ScriptedIndex::new().with_hit(MatchMethod::ExactMatch, "bale", "Q1", &["Bale"], 1.0);
        let config = WikifierConfig::default();
        let retriever = CandidateRetriever::new(&index, &config);
        let first = retriever.retrieve(&table(&["Bale"]), "admin2").unwrap();
        let expected = first.clone();

        let (merged, requeried) = SecondPassRetriever::new(&retriever).run(first).unwrap();
        assert_eq!(requeried, 0);
        assert_eq!(merged, expected);
        assert_eq!(index.recorded().len(), 3);
    }
}

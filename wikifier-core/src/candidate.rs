//! # Candidatos
//!
//! Um [`Candidate`] é uma linha da tabela de candidatos: a menção (posição,
//! texto, contexto) mais um identificador do grafo encontrado por um dos
//! métodos de busca. Candidatos nunca são alterados depois de criados,
//! apenas filtrados e agrupados.
//!
//! O "sem match" é representado por um candidato sentinela com `kg_id` vazio,
//! assim todo grupo tem pelo menos uma linha e toda menção gera saída.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::Mention;

/// Método de busca que produziu o candidato.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    ExactMatch,
    PhraseMatch,
    FuzzyMatch,
}

impl MatchMethod {
    /// Ordem em que os métodos são consultados.
    pub const ALL: [MatchMethod; 3] = [
        MatchMethod::ExactMatch,
        MatchMethod::PhraseMatch,
        MatchMethod::FuzzyMatch,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MatchMethod::ExactMatch => "exact-match",
            MatchMethod::PhraseMatch => "phrase-match",
            MatchMethod::FuzzyMatch => "fuzzy-match",
        }
    }
}

/// Um candidato a resolução de uma menção.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub column: usize,
    pub row: usize,
    /// Texto original da menção.
    pub label: String,
    /// Texto efetivamente enviado ao índice (limpo ou sem pontuação).
    pub label_clean: String,
    /// Valores das outras colunas da linha, separados por `|`.
    pub other_information: String,
    /// Identificador no grafo. Vazio = sem match.
    pub kg_id: String,
    /// Nomes alternativos, possivelmente com hierarquia ("Bale<Oromia").
    pub kg_labels: Vec<String>,
    pub method: MatchMethod,
    pub retrieval_score: f64,
    /// Score normalizado em [0, 1] entre todos os resultados do mesmo método.
    pub normalized_score: f64,
    /// Profundidade hierárquica, calculada uma única vez na normalização.
    pub level: u32,
}

impl Candidate {
    /// Sentinela "sem match" que preserva posição, texto e contexto de `template`.
    pub fn no_match(template: &Candidate) -> Self {
        Self {
            column: template.column,
            row: template.row,
            label: template.label.clone(),
            label_clean: template.label_clean.clone(),
            other_information: template.other_information.clone(),
            kg_id: String::new(),
            kg_labels: Vec::new(),
            method: MatchMethod::ExactMatch,
            retrieval_score: 0.0,
            normalized_score: 0.0,
            level: 0,
        }
    }

    /// Sentinela "sem match" para uma menção que ainda não tem candidatos.
    pub fn no_match_for(mention: &Mention, label_clean: &str) -> Self {
        Self {
            column: mention.column,
            row: mention.row,
            label: mention.label.clone(),
            label_clean: label_clean.to_string(),
            other_information: mention.other_information.clone(),
            kg_id: String::new(),
            kg_labels: Vec::new(),
            method: MatchMethod::ExactMatch,
            retrieval_score: 0.0,
            normalized_score: 0.0,
            level: 0,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.kg_id.is_empty()
    }

    pub fn position(&self) -> (usize, usize) {
        (self.column, self.row)
    }
}

/// Profundidade hierárquica de um conjunto de rótulos.
///
/// Maior número de partes ao separar cada rótulo pelo delimitador;
/// sem rótulos, o nível é 0.
pub fn hierarchy_level(labels: &[String], delimiter: char) -> u32 {
    labels
        .iter()
        .map(|label| label.split(delimiter).count() as u32)
        .max()
        .unwrap_or(0)
}

/// Todos os candidatos de uma mesma menção.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub column: usize,
    pub row: usize,
    /// Nunca vazio: um grupo sem resultados contém um sentinela.
    pub candidates: Vec<Candidate>,
}

impl CandidateGroup {
    pub fn new(column: usize, row: usize, candidates: Vec<Candidate>) -> Self {
        Self {
            column,
            row,
            candidates,
        }
    }

    /// Candidatos reais (ignora sentinelas).
    pub fn matches(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.is_match())
    }

    pub fn has_matches(&self) -> bool {
        self.candidates.iter().any(Candidate::is_match)
    }

    pub fn has_exact_match(&self) -> bool {
        self.matches().any(|c| c.method == MatchMethod::ExactMatch)
    }

    pub fn first(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Sentinela "sem match" para este grupo.
    pub fn no_match(&self) -> Candidate {
        match self.first() {
            Some(first) => Candidate::no_match(first),
            None => Candidate::no_match_for(
                &Mention {
                    column: self.column,
                    row: self.row,
                    label: String::new(),
                    other_information: String::new(),
                },
                "",
            ),
        }
    }
}

/// Tabela plana de candidatos de todas as menções de uma coluna.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateTable {
    rows: Vec<Candidate>,
}

impl CandidateTable {
    pub fn new(rows: Vec<Candidate>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Candidate] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Candidate> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Número de candidatos reais (sem sentinelas).
    pub fn match_count(&self) -> usize {
        self.rows.iter().filter(|c| c.is_match()).count()
    }

    /// Concatena a segunda passada **antes** da primeira e reordena por
    /// (coluna, linha) de forma estável.
    pub fn merge(first_pass: CandidateTable, second_pass: CandidateTable) -> CandidateTable {
        let mut rows = second_pass.rows;
        rows.extend(first_pass.rows);
        rows.sort_by_key(Candidate::position);
        CandidateTable { rows }
    }

    /// Agrupa por menção em ordem estável de (coluna, linha); dentro de cada
    /// grupo a ordem de inserção é preservada.
    pub fn groups(&self) -> Vec<CandidateGroup> {
        let mut grouped: BTreeMap<(usize, usize), Vec<Candidate>> = BTreeMap::new();
        for candidate in &self.rows {
            grouped
                .entry(candidate.position())
                .or_default()
                .push(candidate.clone());
        }
        grouped
            .into_iter()
            .map(|((column, row), candidates)| CandidateGroup::new(column, row, candidates))
            .collect()
    }
}

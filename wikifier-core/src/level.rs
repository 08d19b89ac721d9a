//! # Níveis Administrativos
//!
//! O nível de um candidato é a profundidade da hierarquia em seus rótulos
//! ("Bale<Oromia" = 2). Este módulo reúne:
//!
//! - a tradução da tag de contexto (`admin1`, `admin2`, ...) em nível alvo;
//! - o [`LevelHistogram`], que conta os níveis das resoluções confiáveis de
//!   uma chamada de `produce`;
//! - o filtro [`filter_by_level`].

use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, CandidateGroup};
use crate::error::{WikifierError, WikifierResult};

/// Converte a tag de contexto do chamador no nível alvo.
///
/// `admin1..admin3` restringem o nível; outras tags começando com `admin`
/// são inválidas; qualquer outra tag não restringe nada.
pub fn admin_level_for_context(context: &str) -> WikifierResult<Option<u32>> {
    match context {
        "admin1" => Ok(Some(1)),
        "admin2" => Ok(Some(2)),
        "admin3" => Ok(Some(3)),
        other if other.starts_with("admin") => Err(WikifierError::Configuration(format!(
            "tag de nível administrativo desconhecida: '{}'",
            other
        ))),
        _ => Ok(None),
    }
}

/// Contagem dos níveis observados entre resoluções confiáveis.
///
/// Local a uma chamada: cada `produce` cria (ou reinicia) o seu próprio
/// histograma. As contagens guardam a ordem de inserção, que decide empates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelHistogram {
    counts: Vec<(u32, usize)>,
}

impl LevelHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, level: u32) {
        match self.counts.iter_mut().find(|(l, _)| *l == level) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((level, 1)),
        }
    }

    pub fn count(&self, level: u32) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Nível com mais ocorrências. Em empate vence o primeiro inserido;
    /// histograma vazio devolve 0.
    pub fn dominant_level(&self) -> u32 {
        let mut best: Option<(u32, usize)> = None;
        for &(level, count) in &self.counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((level, count)),
            }
        }
        best.map(|(level, _)| level).unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Pares (nível, contagem) na ordem de inserção.
    pub fn entries(&self) -> &[(u32, usize)] {
        &self.counts
    }
}

/// Mantém só os candidatos do nível pedido.
///
/// Se nada sobrar, devolve um grupo com um único sentinela "sem match"
/// copiado do primeiro membro original, para que a menção ainda produza uma
/// linha de saída.
pub fn filter_by_level(group: &CandidateGroup, level: u32) -> CandidateGroup {
    let kept: Vec<Candidate> = group
        .candidates
        .iter()
        .filter(|c| c.level == level)
        .cloned()
        .collect();

    if !kept.is_empty() {
        return CandidateGroup::new(group.column, group.row, kept);
    }

    let sentinel: Vec<Candidate> = group.first().map(Candidate::no_match).into_iter().collect();
    CandidateGroup::new(group.column, group.row, sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::tests::candidate;
    use crate::candidate::MatchMethod;

    fn three_levels() -> CandidateGroup {
        CandidateGroup::new(
            0,
            0,
            vec![
                candidate(0, "Q10", &["oromia"], MatchMethod::FuzzyMatch, 0.9),
                candidate(0, "Q20", &["bale<oromia"], MatchMethod::FuzzyMatch, 0.8),
                candidate(0, "Q30", &["x<bale<oromia"], MatchMethod::PhraseMatch, 0.7),
            ],
        )
    }

    #[test]
    fn test_context_tags() {
        assert_eq!(admin_level_for_context("admin1").unwrap(), Some(1));
        assert_eq!(admin_level_for_context("admin3").unwrap(), Some(3));
        assert_eq!(admin_level_for_context("country").unwrap(), None);
        assert_eq!(admin_level_for_context("").unwrap(), None);
        let err = admin_level_for_context("admin9").unwrap_err();
        assert!(err.is_configuration(), "admin9 deve ser erro de configuração");
    }

    #[test]
    fn test_filter_keeps_requested_level() {
        let filtered = filter_by_level(&three_levels(), 2);
        assert_eq!(filtered.candidates.len(), 1);
        assert_eq!(filtered.candidates[0].kg_id, "Q20");
    }

    #[test]
    fn test_filter_empty_result_is_sentinel() {
        let mut group = three_levels();
        group.candidates[0].other_information = "Oromia|12".into();
        let filtered = filter_by_level(&group, 5);
        assert_eq!(filtered.candidates.len(), 1);
        let sentinel = &filtered.candidates[0];
        assert!(!sentinel.is_match());
        assert_eq!(sentinel.other_information, "Oromia|12");
        assert_eq!(sentinel.label, "mention");
    }

    #[test]
    fn test_filter_is_idempotent() {
        for level in 0..5 {
            let once = filter_by_level(&three_levels(), level);
            let twice = filter_by_level(&once, level);
            assert_eq!(once, twice, "filtro não idempotente no nível {}", level);
        }
    }

    #[test]
    fn test_histogram_dominant_level() {
        let mut histogram = LevelHistogram::new();
        assert_eq!(histogram.dominant_level(), 0);

        histogram.record(2);
        histogram.record(3);
        histogram.record(3);
        assert_eq!(histogram.dominant_level(), 3);
        assert_eq!(histogram.count(3), 2);

        histogram.record(2);
        // Empate 2x2: vence o primeiro inserido
        assert_eq!(histogram.dominant_level(), 2);

        histogram.reset();
        assert!(histogram.is_empty());
    }
}

//! # Resolução de Candidatos
//!
//! Reduz cada [`CandidateGroup`] a exatamente uma [`Resolution`], em duas
//! fases explícitas:
//!
//! 1. **Classificação** ([`CandidateResolver::classify`]): uma escada de
//!    regras por grupo. A primeira regra aplicável decide:
//!    - grupo sem candidatos reais → sem match;
//!    - restrição de nível ativa → filtra pelo nível (vazio → sem match);
//!    - um único candidato → aceito (resolução confiável);
//!    - um único match exato → aceito (resolução confiável);
//!    - vários matches exatos → adiado;
//!    - nenhum exato: se algum rótulo alcança o limiar de similaridade,
//!      adiado; senão, sem match.
//!
//!    Resoluções confiáveis registram seu nível no [`LevelHistogram`].
//!
//! 2. **Desempate dos adiados** ([`pick_deferred`]): com o nível dominante
//!    do histograma lido **uma vez** ao fim da classificação, filtra por
//!    nível, conta sobreposições entre rótulos e "other information", e por
//!    último usa o score normalizado.
//!
//! Os grupos são percorridos em ordem estável de (coluna, linha); o nível
//! dominante depende dessa ordem.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{Candidate, CandidateGroup, CandidateTable, MatchMethod};
use crate::config::WikifierConfig;
use crate::error::WikifierResult;
use crate::level::{admin_level_for_context, filter_by_level, LevelHistogram};
use crate::similarity::{strip_quotes, SimilarityScorer};
use crate::table::OTHER_INFORMATION_SEPARATOR;
use crate::wikifier::WikifierOutputRow;

/// Regra da escada que decidiu um grupo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    NoCandidates,
    LevelFilteredOut,
    SingleCandidate,
    UniqueExactMatch,
    MultipleExactMatches,
    SimilarLabels,
    BelowSimilarity,
    /// Resolvido no desempate dos adiados.
    TieBreak,
}

impl Decision {
    /// Decisões que deixam o grupo para a segunda fase.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Decision::MultipleExactMatches | Decision::SimilarLabels)
    }
}

/// Resultado da primeira fase para um grupo.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Resolved {
        candidate: Candidate,
        decision: Decision,
    },
    Deferred {
        group: CandidateGroup,
        decision: Decision,
    },
}

impl Classification {
    pub fn decision(&self) -> Decision {
        match self {
            Classification::Resolved { decision, .. } | Classification::Deferred { decision, .. } => {
                *decision
            }
        }
    }
}

/// O candidato escolhido para uma menção (ou o sentinela "sem match").
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub candidate: Candidate,
    pub decision: Decision,
}

impl Resolution {
    /// Identificador resolvido; vazio para "sem match".
    pub fn item(&self) -> &str {
        &self.candidate.kg_id
    }

    pub fn is_match(&self) -> bool {
        self.candidate.is_match()
    }

    pub fn to_output_row(&self, context: &str) -> WikifierOutputRow {
        WikifierOutputRow {
            column: self.candidate.column,
            row: self.candidate.row,
            value: self.candidate.label.clone(),
            context: context.to_string(),
            item: self.candidate.kg_id.clone(),
        }
    }
}

/// Passos observáveis da resolução.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverStep {
    Classified {
        column: usize,
        row: usize,
        decision: Decision,
    },
    PendingResolved {
        column: usize,
        row: usize,
        kg_id: String,
    },
}

pub struct CandidateResolver {
    pub similarity_threshold: f64,
    /// Nível alvo quando o contexto é `admin1..admin3`.
    pub level_restriction: Option<u32>,
    pub level_delimiter: char,
    scorer: SimilarityScorer,
}

impl CandidateResolver {
    pub fn new(similarity_threshold: f64, level_restriction: Option<u32>) -> Self {
        Self {
            similarity_threshold,
            level_restriction,
            level_delimiter: '<',
            scorer: SimilarityScorer::default(),
        }
    }

    /// Resolver para a tag de contexto do chamador. Tag `adminN` inválida
    /// é erro de configuração.
    pub fn from_config(config: &WikifierConfig, context: &str) -> WikifierResult<Self> {
        let mut resolver = Self::new(config.similarity_threshold, admin_level_for_context(context)?);
        resolver.level_delimiter = config.level_delimiter;
        Ok(resolver)
    }

    /// Primeira fase: aplica a escada de regras a um grupo.
    pub fn classify(&self, group: &CandidateGroup, histogram: &mut LevelHistogram) -> Classification {
        let matches: Vec<Candidate> = group.matches().cloned().collect();
        if matches.is_empty() {
            return Classification::Resolved {
                candidate: group.no_match(),
                decision: Decision::NoCandidates,
            };
        }
        let mut working = CandidateGroup::new(group.column, group.row, matches);

        if let Some(level) = self.level_restriction {
            working = filter_by_level(&working, level);
            if !working.has_matches() {
                return Classification::Resolved {
                    candidate: working.no_match(),
                    decision: Decision::LevelFilteredOut,
                };
            }
        }

        if working.candidates.len() == 1 {
            let candidate = working.candidates.remove(0);
            histogram.record(candidate.level);
            return Classification::Resolved {
                candidate,
                decision: Decision::SingleCandidate,
            };
        }

        let exact: Vec<Candidate> = working
            .candidates
            .iter()
            .filter(|c| c.method == MatchMethod::ExactMatch)
            .cloned()
            .collect();
        match exact.len() {
            0 => {}
            1 => {
                let candidate = exact.into_iter().next().unwrap_or_else(|| working.no_match());
                histogram.record(candidate.level);
                return Classification::Resolved {
                    candidate,
                    decision: Decision::UniqueExactMatch,
                };
            }
            _ => {
                return Classification::Deferred {
                    group: CandidateGroup::new(group.column, group.row, exact),
                    decision: Decision::MultipleExactMatches,
                };
            }
        }

        let mut seen = HashSet::new();
        let deduped: Vec<Candidate> = working
            .candidates
            .iter()
            .filter(|c| seen.insert(c.kg_id.clone()))
            .cloned()
            .collect();
        let deduped = CandidateGroup::new(group.column, group.row, deduped);

        let label_clean = deduped.first().map(|c| c.label_clean.clone()).unwrap_or_default();
        let similar = deduped.candidates.iter().any(|c| {
            c.kg_labels.iter().any(|label| {
                self.scorer.similarity(strip_quotes(label), &label_clean) >= self.similarity_threshold
            })
        });

        if similar {
            Classification::Deferred {
                group: deduped,
                decision: Decision::SimilarLabels,
            }
        } else {
            Classification::Resolved {
                candidate: deduped.no_match(),
                decision: Decision::BelowSimilarity,
            }
        }
    }

    /// Resolve todos os grupos com um histograma novo.
    pub fn resolve(&self, table: &CandidateTable) -> Vec<Resolution> {
        let mut histogram = LevelHistogram::new();
        self.resolve_observed(table, &mut histogram, &mut |_| {})
    }

    /// Resolve todos os grupos, acumulando em `histogram` e reportando cada
    /// passo a `observer`. Uma resolução por grupo, em ordem de (coluna, linha).
    pub fn resolve_observed(
        &self,
        table: &CandidateTable,
        histogram: &mut LevelHistogram,
        observer: &mut dyn FnMut(&ResolverStep),
    ) -> Vec<Resolution> {
        let groups = table.groups();
        let mut slots: Vec<Option<Resolution>> = vec![None; groups.len()];
        let mut deferred: Vec<(usize, CandidateGroup)> = Vec::new();

        for (position, group) in groups.iter().enumerate() {
            let classification = self.classify(group, histogram);
            let decision = classification.decision();
            debug!("Grupo ({}, {}): {:?}", group.column, group.row, decision);
            observer(&ResolverStep::Classified {
                column: group.column,
                row: group.row,
                decision,
            });
            match classification {
                Classification::Resolved { candidate, decision } => {
                    slots[position] = Some(Resolution { candidate, decision });
                }
                Classification::Deferred { group, .. } => deferred.push((position, group)),
            }
        }

        let dominant = histogram.dominant_level();
        if !deferred.is_empty() {
            debug!("{} grupos adiados, nível dominante {}", deferred.len(), dominant);
        }
        for (position, group) in deferred {
            let candidate = pick_deferred(&group, dominant, self.level_delimiter);
            observer(&ResolverStep::PendingResolved {
                column: group.column,
                row: group.row,
                kg_id: candidate.kg_id.clone(),
            });
            slots[position] = Some(Resolution {
                candidate,
                decision: Decision::TieBreak,
            });
        }

        slots.into_iter().flatten().collect()
    }
}

/// Segunda fase: escolhe um candidato de um grupo adiado.
///
/// Filtra pelo nível dominante (voltando ao grupo inteiro se nada sobrar),
/// mantém os empatados na maior sobreposição com o "other information" e,
/// entre eles, o maior score normalizado. Empates ficam com o primeiro.
pub fn pick_deferred(group: &CandidateGroup, dominant_level: u32, delimiter: char) -> Candidate {
    let at_level: Vec<&Candidate> = group
        .candidates
        .iter()
        .filter(|c| c.level == dominant_level)
        .collect();
    let pool: Vec<&Candidate> = if at_level.is_empty() {
        group.candidates.iter().collect()
    } else {
        at_level
    };

    let scored: Vec<(usize, &Candidate)> = pool
        .into_iter()
        .map(|c| (context_overlap(c, delimiter), c))
        .collect();
    let best_overlap = scored.iter().map(|(score, _)| *score).max().unwrap_or(0);

    let mut winner: Option<&Candidate> = None;
    for (score, candidate) in scored {
        if score != best_overlap {
            continue;
        }
        match winner {
            Some(current) if candidate.normalized_score <= current.normalized_score => {}
            _ => winner = Some(candidate),
        }
    }

    winner.cloned().unwrap_or_else(|| group.no_match())
}

/// Quantos termos do "other information" aparecem entre as partes dos
/// rótulos do candidato (separadas por vírgula, `|` ou o delimitador).
pub fn context_overlap(candidate: &Candidate, delimiter: char) -> usize {
    let context: HashSet<String> = candidate
        .other_information
        .split(OTHER_INFORMATION_SEPARATOR)
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if context.is_empty() {
        return 0;
    }

    let parts: HashSet<String> = candidate
        .kg_labels
        .iter()
        .flat_map(|label| label.split(|c: char| c == ',' || c == '|' || c == delimiter))
        .map(|t| strip_quotes(t.trim()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    context.intersection(&parts).count()
}

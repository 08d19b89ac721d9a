//! # Wikifier — Orquestrador com Eventos Observáveis
//!
//! Coordena, para uma coluna alvo:
//!
//! 1. o atalho dos códigos de censo (coluna quase toda composta de códigos
//!    conhecidos → consulta direta, sem índice);
//! 2. a primeira passada de recuperação, a segunda passada e a resolução;
//! 3. o realinhamento das resoluções às linhas da tabela de entrada.
//!
//! Cada chamada de `produce` usa um resolver e um histograma próprios, então
//! o mesmo [`RegionWikifier`] pode atender várias colunas em paralelo.
//! [`RegionWikifier::produce_streaming`] emite [`WikifierEvent`]s por um
//! canal `mpsc` para a interface acompanhar o progresso.

use std::io::Write;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::census::CensusCodeTable;
use crate::config::WikifierConfig;
use crate::country::CountryWikifier;
use crate::error::{WikifierError, WikifierResult};
use crate::index::SearchIndex;
use crate::level::{admin_level_for_context, LevelHistogram};
use crate::resolver::{CandidateResolver, Decision, ResolverStep};
use crate::retriever::{CandidateRetriever, SecondPassRetriever};
use crate::table::Table;

/// Cabeçalho do arquivo de saída do wikifier.
pub const OUTPUT_HEADER: [&str; 5] = ["column", "row", "value", "context", "item"];

/// Uma linha do arquivo de saída: a menção e o identificador resolvido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikifierOutputRow {
    pub column: usize,
    pub row: usize,
    /// Texto original da célula.
    pub value: String,
    /// Tag semântica do chamador (ex.: "admin2").
    pub context: String,
    /// Identificador resolvido; vazio = sem match.
    pub item: String,
}

impl WikifierOutputRow {
    pub fn is_resolved(&self) -> bool {
        !self.item.is_empty()
    }
}

/// Resultado de `produce`.
#[derive(Debug, Clone, PartialEq)]
pub struct WikifierOutput {
    /// Tabela de entrada com a coluna `<alvo>_wikifier` anexada.
    pub table: Table,
    pub output_column: String,
    /// Uma linha por menção, em ordem de (coluna, linha).
    pub rows: Vec<WikifierOutputRow>,
    pub census_short_circuit: bool,
}

/// Eventos emitidos durante a wikificação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WikifierEvent {
    /// A coluna foi resolvida direto pela tabela de códigos de censo.
    CensusShortCircuit { matched: usize, total: usize },
    /// Primeira passada concluída.
    RetrievalDone { mentions: usize, candidates: usize },
    /// Segunda passada concluída (`requeried` = 0 quando pulada).
    SecondPassDone { requeried: usize, candidates: usize },
    /// Um grupo passou pela escada de regras.
    GroupClassified {
        column: usize,
        row: usize,
        decision: Decision,
    },
    /// Um grupo adiado foi desempatado.
    PendingResolved {
        column: usize,
        row: usize,
        kg_id: String,
    },
    Done {
        rows: Vec<WikifierOutputRow>,
        processing_ms: u64,
    },
    Error { message: String },
}

impl From<&ResolverStep> for WikifierEvent {
    fn from(step: &ResolverStep) -> Self {
        match step {
            ResolverStep::Classified { column, row, decision } => WikifierEvent::GroupClassified {
                column: *column,
                row: *row,
                decision: *decision,
            },
            ResolverStep::PendingResolved { column, row, kg_id } => WikifierEvent::PendingResolved {
                column: *column,
                row: *row,
                kg_id: kg_id.clone(),
            },
        }
    }
}

/// Wikifier de regiões administrativas sobre um índice de busca.
pub struct RegionWikifier<I: SearchIndex> {
    pub index: I,
    pub config: WikifierConfig,
    pub census: Arc<CensusCodeTable>,
}

impl<I: SearchIndex> RegionWikifier<I> {
    pub fn new(index: I, config: WikifierConfig) -> Self {
        Self {
            index,
            config,
            census: Arc::new(CensusCodeTable::default()),
        }
    }

    pub fn with_census_codes(mut self, census: Arc<CensusCodeTable>) -> Self {
        self.census = census;
        self
    }

    /// Wikifica a coluna `target_column` e anexa `<alvo>_wikifier` à tabela.
    pub fn produce(&self, table: &Table, target_column: &str, context: &str) -> WikifierResult<WikifierOutput> {
        self.run(table, target_column, context, &mut |_| {})
    }

    /// Como [`produce`](Self::produce), enviando eventos pelo canal. Em caso
    /// de falha o último evento é `Error`.
    pub fn produce_streaming(
        &self,
        table: &Table,
        target_column: &str,
        context: &str,
        tx: mpsc::Sender<WikifierEvent>,
    ) -> WikifierResult<WikifierOutput> {
        let result = self.run(table, target_column, context, &mut |event| {
            let _ = tx.send(event);
        });
        if let Err(err) = &result {
            let _ = tx.send(WikifierEvent::Error {
                message: err.to_string(),
            });
        }
        result
    }

    fn run(
        &self,
        table: &Table,
        target_column: &str,
        context: &str,
        emit: &mut dyn FnMut(WikifierEvent),
    ) -> WikifierResult<WikifierOutput> {
        let start = Instant::now();

        // Erros de configuração antes de qualquer consulta
        let column = table.column_index(target_column).ok_or_else(|| {
            WikifierError::Configuration(format!("coluna '{}' não existe na tabela", target_column))
        })?;
        let resolver = CandidateResolver::from_config(&self.config, context)?;
        let output_column = format!("{}_wikifier", target_column);

        // === Atalho: códigos de censo ===
        if let Some(items) = self.census.short_circuit(table, column, self.config.census_threshold) {
            let rows: Vec<WikifierOutputRow> = table
                .mentions(column)
                .into_iter()
                .map(|m| WikifierOutputRow {
                    column,
                    row: m.row,
                    value: m.label,
                    context: context.to_string(),
                    item: items.get(m.row).cloned().unwrap_or_default(),
                })
                .collect();
            let matched = rows.iter().filter(|r| r.is_resolved()).count();
            info!(
                "Coluna '{}' resolvida por códigos de censo ({}/{})",
                target_column,
                matched,
                table.len()
            );
            emit(WikifierEvent::CensusShortCircuit {
                matched,
                total: table.len(),
            });
            return Ok(self.finish(table, output_column, rows, true, start, emit));
        }

        // === Passo 1: primeira passada ===
        let retriever = CandidateRetriever::new(&self.index, &self.config);
        let first_pass = retriever.retrieve_column(table, column)?;
        emit(WikifierEvent::RetrievalDone {
            mentions: table.mentions(column).len(),
            candidates: first_pass.match_count(),
        });

        // === Passo 2: segunda passada ===
        let (candidates, requeried) = SecondPassRetriever::new(&retriever).run(first_pass)?;
        emit(WikifierEvent::SecondPassDone {
            requeried,
            candidates: candidates.match_count(),
        });

        // === Passo 3: resolução com histograma local à chamada ===
        let mut histogram = LevelHistogram::new();
        let resolutions = resolver.resolve_observed(&candidates, &mut histogram, &mut |step| {
            emit(WikifierEvent::from(step))
        });

        let rows: Vec<WikifierOutputRow> = resolutions
            .iter()
            .map(|r| r.to_output_row(context))
            .collect();
        info!(
            "Coluna '{}': {} menções, {} resolvidas",
            target_column,
            rows.len(),
            rows.iter().filter(|r| r.is_resolved()).count()
        );
        Ok(self.finish(table, output_column, rows, false, start, emit))
    }

    /// Realinha as resoluções às linhas de entrada e emite `Done`.
    fn finish(
        &self,
        table: &Table,
        output_column: String,
        rows: Vec<WikifierOutputRow>,
        census_short_circuit: bool,
        start: Instant,
        emit: &mut dyn FnMut(WikifierEvent),
    ) -> WikifierOutput {
        let mut values: Vec<Option<String>> = vec![None; table.len()];
        for row in rows.iter().filter(|r| r.is_resolved()) {
            if let Some(slot) = values.get_mut(row.row) {
                *slot = Some(row.item.clone());
            }
        }
        let mut output_table = table.clone();
        output_table.append_column(output_column.clone(), values);

        emit(WikifierEvent::Done {
            rows: rows.clone(),
            processing_ms: start.elapsed().as_millis() as u64,
        });

        WikifierOutput {
            table: output_table,
            output_column,
            rows,
            census_short_circuit,
        }
    }
}

/// Coluna a wikificar e sua tag de contexto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub column: String,
    pub context: String,
}

impl ColumnSpec {
    pub fn new(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            context: context.into(),
        }
    }
}

/// Wikifica uma coluna mista: primeiro pelo gazetteer de países, depois as
/// linhas restantes pelo wikifier de regiões.
///
/// Linhas de país vêm antes, seguidas das de região; o resultado final é
/// ordenado de forma estável por (coluna, linha).
pub fn wikify_column<I: SearchIndex>(
    wikifier: &RegionWikifier<I>,
    countries: &CountryWikifier,
    table: &Table,
    column: &str,
    context: &str,
) -> WikifierResult<Vec<WikifierOutputRow>> {
    let column_index = table.column_index(column).ok_or_else(|| {
        WikifierError::Configuration(format!("coluna '{}' não existe na tabela", column))
    })?;
    admin_level_for_context(context)?;

    let mut rows = Vec::new();
    let mut remaining = Vec::new();
    for mention in table.mentions(column_index) {
        match countries.lookup(&mention.label) {
            Some(country) => rows.push(WikifierOutputRow {
                column: column_index,
                row: mention.row,
                value: mention.label,
                context: context.to_string(),
                item: country.id.clone(),
            }),
            None => remaining.push(mention.row),
        }
    }

    if !remaining.is_empty() {
        let subset = table.select_rows(&remaining);
        let output = wikifier.produce(&subset, column, context)?;
        rows.extend(output.rows.into_iter().filter_map(|mut row| {
            row.row = *remaining.get(row.row)?;
            Some(row)
        }));
    }

    rows.sort_by_key(|r| (r.column, r.row));
    Ok(rows)
}

/// Wikifica várias colunas em paralelo. O resultado concatena as linhas na
/// ordem de `specs`; o primeiro erro interrompe tudo.
pub fn wikify_columns<I: SearchIndex>(
    wikifier: &RegionWikifier<I>,
    countries: &CountryWikifier,
    table: &Table,
    specs: &[ColumnSpec],
) -> WikifierResult<Vec<WikifierOutputRow>> {
    let per_column: Vec<Vec<WikifierOutputRow>> = specs
        .par_iter()
        .map(|spec| wikify_column(wikifier, countries, table, &spec.column, &spec.context))
        .collect::<WikifierResult<Vec<_>>>()?;
    Ok(per_column.into_iter().flatten().collect())
}

/// Escreve as linhas no formato `column,row,value,context,item`.
pub fn write_wikifier_csv<W: Write>(rows: &[WikifierOutputRow], writer: W) -> WikifierResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(OUTPUT_HEADER)?;
    for row in rows {
        csv_writer.write_record([
            row.column.to_string(),
            row.row.to_string(),
            row.value.clone(),
            row.context.clone(),
            row.item.clone(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

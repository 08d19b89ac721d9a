//! # Códigos de Censo
//!
//! Tabela estática `código → qnode`, carregada uma vez na inicialização.
//! Quando quase toda a coluna alvo já é composta de códigos conhecidos, o
//! wikifier resolve por consulta direta e não toca no índice.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::error::WikifierResult;
use crate::table::Table;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusCodeTable {
    codes: HashMap<String, String>,
}

impl CensusCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lê um CSV sem cabeçalho com duas colunas: código e qnode.
    ///
    /// Linhas com menos de duas colunas ou com campos vazios são ignoradas.
    pub fn from_csv_reader<R: Read>(reader: R) -> WikifierResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            match (record.get(0).map(str::trim), record.get(1).map(str::trim)) {
                (Some(code), Some(qnode)) if !code.is_empty() && !qnode.is_empty() => {
                    table.insert(code, qnode);
                }
                _ => warn!("Linha {} da tabela de censo ignorada: {:?}", line + 1, record),
            }
        }
        info!("Tabela de códigos de censo: {} entradas", table.len());
        Ok(table)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> WikifierResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn insert(&mut self, code: impl Into<String>, qnode: impl Into<String>) {
        self.codes.insert(code.into(), qnode.into());
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.codes.get(code.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Fração das linhas da coluna cujo valor é um código conhecido.
    ///
    /// O denominador são **todas** as linhas, inclusive as vazias. Tabela
    /// vazia tem fração 0.
    pub fn match_ratio(&self, table: &Table, column: usize) -> f64 {
        if table.is_empty() {
            return 0.0;
        }
        let matched = (0..table.len())
            .filter(|&row| table.cell(row, column).and_then(|v| self.get(v)).is_some())
            .count();
        matched as f64 / table.len() as f64
    }

    /// Se a fração de códigos conhecidos é estritamente maior que
    /// `threshold`, devolve o qnode de cada linha (vazio se desconhecido).
    pub fn short_circuit(&self, table: &Table, column: usize, threshold: f64) -> Option<Vec<String>> {
        if self.is_empty() || self.match_ratio(table, column) <= threshold {
            return None;
        }
        Some(
            (0..table.len())
                .map(|row| {
                    table
                        .cell(row, column)
                        .and_then(|v| self.get(v))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> CensusCodeTable {
        let csv = "010101,Q1000001\n010102, Q1000002\nsem_qnode\n,Q9\n";
        CensusCodeTable::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn column(values: &[Option<&str>]) -> Table {
        let mut table = Table::new(vec!["codigo".into()]);
        for v in values {
            table.push_row(vec![v.map(String::from)]);
        }
        table
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let table = codes();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("010102"), Some("Q1000002"));
        assert_eq!(table.get(" 010101 "), Some("Q1000001"));
    }

    #[test]
    fn test_short_circuit_requires_strictly_greater_ratio() {
        let codes = codes();
        let mut values = vec![Some("010101"); 9];
        values.push(Some("999999"));
        // 9/10 = 0.9: não passa de 0.9
        assert!(codes.short_circuit(&column(&values), 0, 0.9).is_none());

        let values = vec![Some("010101"), Some("010102")];
        let items = codes.short_circuit(&column(&values), 0, 0.9).unwrap();
        assert_eq!(items, vec!["Q1000001", "Q1000002"]);
    }

    #[test]
    fn test_empty_cells_count_in_denominator() {
        let codes = codes();
        let table = column(&[Some("010101"), None]);
        assert_eq!(codes.match_ratio(&table, 0), 0.5);
        let items = codes.short_circuit(&table, 0, 0.4).unwrap();
        assert_eq!(items, vec!["Q1000001", ""]);
    }

    #[test]
    fn test_empty_table_never_short_circuits() {
        assert!(codes().short_circuit(&column(&[]), 0, 0.0).is_none());
        assert!(CensusCodeTable::new()
            .short_circuit(&column(&[Some("010101")]), 0, 0.0)
            .is_none());
    }
}

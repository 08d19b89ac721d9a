//! # Tabela de Entrada e Extração de Menções
//!
//! Uma [`Table`] é o recorte já parseado de uma planilha: cabeçalhos e linhas
//! com células opcionais. Cada célula não vazia da coluna alvo vira uma
//! [`Mention`], identificada pela posição (coluna, linha).

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WikifierResult;

/// Separador das informações de contexto ("other information").
pub const OTHER_INFORMATION_SEPARATOR: &str = "|";

/// Tabela simples com cabeçalho e células opcionais.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Uma menção textual extraída de uma célula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Índice da coluna na tabela de origem.
    pub column: usize,
    /// Índice da linha na tabela de origem.
    pub row: usize,
    /// Texto original da célula.
    pub label: String,
    /// Valores das demais colunas da linha, separados por `|`.
    pub other_information: String,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Adiciona uma linha, completando com `None` ou truncando até a largura da tabela.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Lê uma tabela CSV com linha de cabeçalho. Células vazias viram `None`.
    pub fn from_csv_reader<R: Read>(reader: R) -> WikifierResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut table = Table::new(columns);

        for record in csv_reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.trim().is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> WikifierResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Valor de uma célula, tratando texto só com espaços como vazio.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    /// Anexa uma nova coluna. Linhas sem valor correspondente recebem `None`.
    pub fn append_column(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        self.columns.push(name.into());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().flatten());
        }
    }

    /// Extrai as menções da coluna, na ordem das linhas.
    pub fn mentions(&self, column: usize) -> Vec<Mention> {
        (0..self.rows.len())
            .filter_map(|row| {
                let label = self.cell(row, column)?;
                Some(Mention {
                    column,
                    row,
                    label: label.to_string(),
                    other_information: self.other_information(row, column),
                })
            })
            .collect()
    }

    /// Nova tabela contendo apenas as linhas indicadas (na ordem dada).
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let mut table = Table::new(self.columns.clone());
        for &row in rows {
            if let Some(values) = self.rows.get(row) {
                table.push_row(values.clone());
            }
        }
        table
    }

    fn other_information(&self, row: usize, column: usize) -> String {
        (0..self.columns.len())
            .filter(|&c| c != column)
            .filter_map(|c| self.cell(row, c))
            .map(|v| v.trim())
            .collect::<Vec<_>>()
            .join(OTHER_INFORMATION_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec!["admin1".into(), "admin2".into(), "valor".into()]);
        table.push_row(vec![Some("Oromia".into()), Some("Bale".into()), Some("12".into())]);
        table.push_row(vec![Some("Amhara".into()), None, Some("7".into())]);
        table.push_row(vec![Some("Tigray".into()), Some("   ".into())]);
        table
    }

    #[test]
    fn test_push_row_pads_to_width() {
        let table = sample();
        assert_eq!(table.rows[2].len(), 3);
        assert_eq!(table.rows[2][2], None);
    }

    #[test]
    fn test_mentions_skip_empty_cells() {
        let table = sample();
        let mentions = table.mentions(1);
        // Linha 1 é None e linha 2 só tem espaços
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].row, 0);
        assert_eq!(mentions[0].label, "Bale");
        assert_eq!(mentions[0].other_information, "Oromia|12");
    }

    #[test]
    fn test_from_csv_reader() {
        let csv = "admin1,admin2\nOromia,Bale\nAmhara,\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["admin1", "admin2"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.column_index("admin2"), Some(1));
        assert_eq!(table.column_index("admin3"), None);
    }

    #[test]
    fn test_append_column_and_select_rows() {
        let mut table = sample();
        table.append_column("admin1_wikifier", vec![Some("Q202107".into())]);
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows[0][3].as_deref(), Some("Q202107"));
        assert_eq!(table.rows[1][3], None);

        let subset = table.select_rows(&[2, 0]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.cell(0, 0), Some("Tigray"));
        assert_eq!(subset.cell(1, 0), Some("Oromia"));
    }
}

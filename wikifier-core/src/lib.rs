//! # wikifier-core — Wikificação de Regiões Administrativas em Tabelas
//!
//! Este crate liga menções textuais de uma coluna de planilha ("Bale",
//! "West Gojjam", "Oromia") a identificadores de um grafo de conhecimento
//! (`Q804254`). A busca textual fica a cargo de um índice externo; o crate
//! decide entre os candidatos devolvidos.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui por uma coluna de cada vez:
//!
//! 1.  **Entrada**: uma [`Table`] e o nome da coluna alvo, mais a tag de
//!     contexto (`admin1`, `admin2`, `admin3`).
//! 2.  **Atalho de censo** ([`census`]): se quase toda a coluna for composta
//!     de códigos de censo conhecidos, a resposta sai direto da tabela.
//! 3.  **Recuperação** ([`retriever`]): cada menção é consultada no
//!     [`SearchIndex`] por busca exata, por frase e fuzzy.
//!     *   **Segunda passada**: menções sem match, ou com várias palavras e
//!         sem match exato, são consultadas de novo sem pontuação.
//! 4.  **Resolução** ([`resolver`]): uma escada de regras escolhe no máximo um
//!     candidato por menção, usando o filtro de nível ([`level`]) e a
//!     similaridade de Jaccard ([`similarity`]).
//! 5.  **Saída**: linhas `column,row,value,context,item` e a coluna
//!     `<alvo>_wikifier` anexada à tabela.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use wikifier_core::{IndexDocument, MemoryIndex, RegionWikifier, Table, WikifierConfig};
//!
//! // 1. Índice em memória com um único documento
//! let index = MemoryIndex::new(vec![IndexDocument::new(
//!     "Q3624078",
//!     ["Addis Ababa"],
//!     Vec::<String>::new(),
//! )]);
//!
//! // 2. Tabela com a coluna a wikificar
//! let mut table = Table::new(vec!["admin1".to_string()]);
//! table.push_row(vec![Some("Addis Ababa".to_string())]);
//!
//! // 3. Wikifica a coluna com restrição de nível 1
//! let wikifier = RegionWikifier::new(index, WikifierConfig::default());
//! let output = wikifier.produce(&table, "admin1", "admin1").unwrap();
//!
//! assert_eq!(output.rows[0].item, "Q3624078");
//! assert_eq!(output.output_column, "admin1_wikifier");
//! ```
//!
//! ## Módulos Principais
//!
//! - [`wikifier`]: Orquestrador que conecta todos os estágios e emite eventos.
//! - [`index`]: Trait do índice de busca, cliente Elasticsearch e índice em memória.
//! - [`index_builder`]: Geração dos documentos do índice a partir de arestas KGTK.
//! - [`enrichment`]: Aliases extraídos de títulos da Wikipedia via SPARQL.
//! - [`country`]: Gazetteer de países usado antes do wikifier de regiões.

pub mod candidate;
pub mod census;
pub mod config;
pub mod country;
pub mod enrichment;
pub mod error;
pub mod index;
pub mod index_builder;
pub mod level;
pub mod resolver;
pub mod retriever;
pub mod similarity;
pub mod table;
pub mod wikifier;

pub use candidate::{Candidate, CandidateGroup, CandidateTable, MatchMethod};
pub use census::CensusCodeTable;
pub use config::WikifierConfig;
pub use country::{CountryRecord, CountryWikifier};
pub use enrichment::{SparqlClient, TripleStore};
pub use error::{WikifierError, WikifierResult};
pub use index::{ElasticsearchIndex, IndexDocument, MemoryIndex, SearchIndex};
pub use index_builder::IndexDocumentBuilder;
pub use level::LevelHistogram;
pub use resolver::{CandidateResolver, Decision, Resolution};
pub use retriever::{CandidateRetriever, SecondPassRetriever};
pub use similarity::SimilarityScorer;
pub use table::{Mention, Table};
pub use wikifier::{
    wikify_column, wikify_columns, write_wikifier_csv, ColumnSpec, RegionWikifier, WikifierEvent,
    WikifierOutput, WikifierOutputRow,
};

//! # Wikificação de Países
//!
//! Gazetteer simples de nomes de países → Wikidata. Nomes de país são
//! poucos e estáveis, então não passam pelo índice de busca: a consulta é
//! direta, sem distinguir maiúsculas nem pontuação.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::WikifierResult;

/// Um país da base embutida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
}

impl CountryRecord {
    fn new(id: &str, name: &str, aliases: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Chave de consulta: minúsculas, sem pontuação, espaços colapsados.
pub fn country_key(label: &str) -> String {
    let kept: String = label
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct CountryWikifier {
    records: Vec<CountryRecord>,
    by_key: HashMap<String, usize>,
}

impl CountryWikifier {
    /// Gazetteer com os países embutidos.
    pub fn new() -> Self {
        let mut wikifier = Self::empty();
        for record in builtin_countries() {
            wikifier.add(record);
        }
        wikifier
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Adiciona um país. Nomes já conhecidos passam a apontar para o novo registro.
    pub fn add(&mut self, record: CountryRecord) {
        let position = self.records.len();
        for label in std::iter::once(&record.name).chain(record.aliases.iter()) {
            let key = country_key(label);
            if !key.is_empty() {
                self.by_key.insert(key, position);
            }
        }
        self.records.push(record);
    }

    /// Acrescenta pares `rótulo,qnode` de um CSV sem cabeçalho.
    pub fn extend_from_csv_reader<R: Read>(&mut self, reader: R) -> WikifierResult<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut added = 0;
        for record in csv_reader.records() {
            let record = record?;
            match (record.get(0).map(str::trim), record.get(1).map(str::trim)) {
                (Some(label), Some(id)) if !label.is_empty() && !id.is_empty() => {
                    self.add(CountryRecord::new(id, label, &[]));
                    added += 1;
                }
                _ => warn!("Linha de país ignorada: {:?}", record),
            }
        }
        info!("{} países adicionados ao gazetteer", added);
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup(&self, label: &str) -> Option<&CountryRecord> {
        self.by_key
            .get(&country_key(label))
            .and_then(|&position| self.records.get(position))
    }

    /// Resolve uma lista de rótulos. Só os rótulos reconhecidos aparecem no mapa.
    pub fn wikify<S: AsRef<str>>(&self, labels: &[S]) -> BTreeMap<String, String> {
        labels
            .iter()
            .filter_map(|label| {
                let label = label.as_ref();
                self.lookup(label).map(|r| (label.to_string(), r.id.clone()))
            })
            .collect()
    }
}

impl Default for CountryWikifier {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_countries() -> Vec<CountryRecord> {
    vec![
        CountryRecord::new("Q115", "Ethiopia", &["Federal Democratic Republic of Ethiopia", "Abyssinia"]),
        CountryRecord::new("Q114", "Kenya", &["Republic of Kenya"]),
        CountryRecord::new("Q1045", "Somalia", &["Federal Republic of Somalia"]),
        CountryRecord::new("Q1049", "Sudan", &["Republic of the Sudan", "the Sudan"]),
        CountryRecord::new("Q958", "South Sudan", &["Republic of South Sudan"]),
        CountryRecord::new("Q986", "Eritrea", &["State of Eritrea"]),
        CountryRecord::new("Q977", "Djibouti", &["Republic of Djibouti"]),
        CountryRecord::new("Q1036", "Uganda", &["Republic of Uganda"]),
        CountryRecord::new("Q924", "Tanzania", &["United Republic of Tanzania"]),
        CountryRecord::new("Q79", "Egypt", &["Arab Republic of Egypt"]),
        CountryRecord::new("Q1037", "Rwanda", &["Republic of Rwanda"]),
        CountryRecord::new("Q967", "Burundi", &["Republic of Burundi"]),
        CountryRecord::new("Q974", "Democratic Republic of the Congo", &["DR Congo", "DRC", "Congo-Kinshasa"]),
        CountryRecord::new("Q1033", "Nigeria", &["Federal Republic of Nigeria"]),
        CountryRecord::new("Q258", "South Africa", &["Republic of South Africa", "RSA"]),
        CountryRecord::new("Q805", "Yemen", &["Republic of Yemen"]),
        CountryRecord::new("Q851", "Saudi Arabia", &["Kingdom of Saudi Arabia", "KSA"]),
        CountryRecord::new("Q30", "United States of America", &["United States", "USA", "U.S.A.", "US", "America"]),
        CountryRecord::new("Q145", "United Kingdom", &["UK", "U.K.", "Great Britain", "Britain"]),
        CountryRecord::new("Q142", "France", &["French Republic"]),
        CountryRecord::new("Q183", "Germany", &["Federal Republic of Germany"]),
        CountryRecord::new("Q38", "Italy", &["Italian Republic"]),
        CountryRecord::new("Q29", "Spain", &["Kingdom of Spain"]),
        CountryRecord::new("Q148", "China", &["People's Republic of China", "PRC"]),
        CountryRecord::new("Q668", "India", &["Republic of India"]),
        CountryRecord::new("Q17", "Japan", &[]),
        CountryRecord::new("Q159", "Russia", &["Russian Federation"]),
        CountryRecord::new("Q155", "Brazil", &["Brasil", "Federative Republic of Brazil"]),
        CountryRecord::new("Q16", "Canada", &[]),
        CountryRecord::new("Q408", "Australia", &["Commonwealth of Australia"]),
    ]
}

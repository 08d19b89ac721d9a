//! # Construção dos Documentos do Índice
//!
//! Monta os [`IndexDocument`]s a partir de arestas KGTK (`node1`, `label`,
//! `node2`) das regiões:
//!
//! - arestas `label` dão os nomes, mais variantes sem sufixos administrativos
//!   ("Bale Zone" → "Bale") e sem o trecho após a vírgula;
//! - os nomes são normalizados em minúsculas e ganham traduções das palavras
//!   de direção ("misraq bale" → "east bale");
//! - as propriedades de hierarquia `P2006190001..3` apontam para as regiões
//!   de nível 1 a 3 do nó, e cada combinação dos seus nomes vira um alias
//!   `nível3<nível2<nível1`. São esses aliases que dão o nível do candidato.

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use tracing::{info, warn};

use crate::enrichment::{enrich_aliases, TripleStore};
use crate::error::WikifierResult;
use crate::index::IndexDocument;
use crate::similarity::strip_quotes;

/// Nomes conhecidos de cada nó.
pub type LabelMemo = BTreeMap<String, BTreeSet<String>>;

/// Propriedades que apontam para as regiões de nível 1, 2 e 3 de um nó.
pub const HIERARCHY_PROPERTIES: [&str; 3] = ["P2006190001", "P2006190002", "P2006190003"];

/// Sufixos removidos para gerar variantes de nome.
pub const NAME_SUFFIXES: [&str; 4] = ["(woreda)", "Zone", "Region", "District"];

/// Palavras de direção em amárico transliterado e sua tradução.
pub const DIRECTION_WORDS: [(&str, &str); 7] = [
    ("misraq", "east"),
    ("misraqawi", "eastern"),
    ("mirab", "west"),
    ("mi'irabawi", "western"),
    ("debub", "south"),
    ("debubawi", "southern"),
    ("semien", "north"),
];

/// Uma aresta KGTK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgtkEdge {
    pub node1: String,
    pub label: String,
    pub node2: String,
}

/// Lê um TSV KGTK com cabeçalho. Linhas que não têm exatamente três
/// colunas são ignoradas.
pub fn parse_kgtk_edges<R: BufRead>(reader: R) -> WikifierResult<Vec<KgtkEdge>> {
    let mut edges = Vec::new();
    for (number, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        let line = line.strip_suffix('\t').unwrap_or(line);
        let parts: Vec<&str> = line.split('\t').collect();
        let [node1, label, node2] = parts.as_slice() else {
            warn!("Linha {} do KGTK ignorada: {:?}", number + 1, line);
            continue;
        };
        let node2 = strip_quotes(node2);
        if node1.is_empty() || node2.is_empty() {
            continue;
        }
        edges.push(KgtkEdge {
            node1: node1.to_string(),
            label: label.to_string(),
            node2: node2.to_string(),
        });
    }
    Ok(edges)
}

/// Informação de um nó reunida das arestas.
#[derive(Debug, Default)]
struct NodeInfo {
    label: Option<String>,
    parents: [Option<String>; 3],
}

pub struct IndexDocumentBuilder {
    pub level_delimiter: char,
}

impl IndexDocumentBuilder {
    pub fn new(level_delimiter: char) -> Self {
        Self { level_delimiter }
    }

    /// Nomes crus de cada nó: rótulos e suas variantes.
    pub fn label_memo(edges: &[KgtkEdge]) -> LabelMemo {
        let mut memo = LabelMemo::new();
        for edge in edges.iter().filter(|e| e.label == "label") {
            let names = memo.entry(edge.node1.clone()).or_default();
            names.insert(edge.node2.clone());
            for suffix in NAME_SUFFIXES {
                if edge.node2.contains(suffix) {
                    let variant = edge.node2.replace(suffix, "").trim().to_string();
                    if !variant.is_empty() {
                        names.insert(variant);
                    }
                }
            }
            if let Some((before_comma, _)) = edge.node2.split_once(',') {
                if !before_comma.trim().is_empty() {
                    names.insert(before_comma.to_string());
                }
            }
        }
        memo
    }

    /// Minúsculas e traduções das palavras de direção.
    pub fn normalize_memo(memo: LabelMemo) -> LabelMemo {
        memo.into_iter()
            .map(|(node, names)| {
                let mut normalized = BTreeSet::new();
                for name in names {
                    let lower = name.trim().to_lowercase();
                    for (word, translation) in DIRECTION_WORDS {
                        if lower.contains(word) {
                            normalized.insert(lower.replace(word, translation));
                        }
                    }
                    normalized.insert(lower);
                }
                (node, normalized)
            })
            .collect()
    }

    /// Todas as combinações dos nomes por nível, do nível mais profundo ao
    /// mais alto. Níveis sem nomes são pulados.
    pub fn hierarchy_aliases(&self, levels: &[&BTreeSet<String>]) -> Vec<String> {
        let mut combinations: Vec<Vec<&str>> = vec![Vec::new()];
        for names in levels.iter().filter(|n| !n.is_empty()) {
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    names.iter().map(move |name| {
                        let mut next = prefix.clone();
                        next.push(name.as_str());
                        next
                    })
                })
                .collect();
        }
        let delimiter = self.level_delimiter.to_string();
        combinations
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|mut c| {
                c.reverse();
                c.join(&delimiter)
            })
            .collect()
    }

    pub fn build_from_edges(&self, edges: &[KgtkEdge]) -> Vec<IndexDocument> {
        let memo = Self::normalize_memo(Self::label_memo(edges));
        self.build_documents(edges, &memo)
    }

    /// Como [`build_from_edges`](Self::build_from_edges), completando os
    /// nomes com os títulos da Wikipédia antes de normalizar.
    pub fn build_with_enrichment(
        &self,
        edges: &[KgtkEdge],
        store: &dyn TripleStore,
    ) -> WikifierResult<Vec<IndexDocument>> {
        let mut memo = Self::label_memo(edges);
        enrich_aliases(&mut memo, store)?;
        let memo = Self::normalize_memo(memo);
        Ok(self.build_documents(edges, &memo))
    }

    fn build_documents(&self, edges: &[KgtkEdge], memo: &LabelMemo) -> Vec<IndexDocument> {
        // Nós na ordem em que aparecem no arquivo
        let mut order: Vec<String> = Vec::new();
        let mut nodes: BTreeMap<String, NodeInfo> = BTreeMap::new();
        for edge in edges {
            let info = nodes.entry(edge.node1.clone()).or_insert_with(|| {
                order.push(edge.node1.clone());
                NodeInfo::default()
            });
            if edge.label == "label" {
                info.label = Some(edge.node2.clone());
            } else if let Some(level) = HIERARCHY_PROPERTIES.iter().position(|p| *p == edge.label) {
                info.parents[level] = Some(edge.node2.clone());
            }
        }

        let empty = BTreeSet::new();
        let mut documents = Vec::new();
        for node in order {
            let Some(info) = nodes.get(&node) else { continue };

            let mut labels: Vec<String> = info.label.iter().cloned().collect();
            if let Some(names) = memo.get(&node) {
                labels.extend(names.iter().filter(|n| Some(*n) != info.label.as_ref()).cloned());
            }

            let levels: Vec<&BTreeSet<String>> = info
                .parents
                .iter()
                .map(|parent| parent.as_ref().and_then(|p| memo.get(p)).unwrap_or(&empty))
                .collect();
            let aliases = self.hierarchy_aliases(&levels);

            if labels.is_empty() && aliases.is_empty() {
                continue;
            }
            documents.push(IndexDocument {
                kg_id: node,
                labels,
                aliases,
            });
        }
        info!("{} documentos de índice gerados", documents.len());
        documents
    }
}

impl Default for IndexDocumentBuilder {
    fn default() -> Self {
        Self::new('<')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::hierarchy_level;
    use crate::enrichment::tests::FakeStore;

    const KGTK: &str = "node1\tlabel\tnode2\n\
Q_OR\tlabel\t\"Oromia Region\"\n\
Q_OR\tP2006190001\tQ_OR\n\
Q_BALE\tlabel\t\"Bale Zone\"\t\n\
Q_BALE\tP2006190001\tQ_OR\n\
Q_BALE\tP2006190002\tQ_BALE\n\
Q_W\tlabel\t\"Misraq Bale (woreda)\"\n\
Q_W\tP2006190001\tQ_OR\n\
Q_W\tP2006190002\tQ_BALE\n\
Q_W\tP2006190003\tQ_W\n\
linha quebrada\n";

    fn edges() -> Vec<KgtkEdge> {
        parse_kgtk_edges(KGTK.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_edges() {
        let edges = edges();
        assert_eq!(edges.len(), 9, "cabeçalho e linha quebrada ignorados");
        assert_eq!(edges[0].node2, "Oromia Region", "aspas removidas");
        assert_eq!(edges[2].node2, "Bale Zone", "tab final removido");
    }

    #[test]
    fn test_label_memo_variants() {
        let memo = IndexDocumentBuilder::label_memo(&[KgtkEdge {
            node1: "Q1".into(),
            label: "label".into(),
            node2: "Gambela Region, Ethiopia".into(),
        }]);
        let names = &memo["Q1"];
        assert!(names.contains("Gambela Region, Ethiopia"));
        assert!(names.contains("Gambela , Ethiopia"));
        assert!(names.contains("Gambela Region"));
    }

    #[test]
    fn test_direction_words_are_translated() {
        let memo = IndexDocumentBuilder::normalize_memo(IndexDocumentBuilder::label_memo(&edges()));
        let names = &memo["Q_W"];
        assert!(names.contains("misraq bale"));
        assert!(names.contains("east bale"));
        assert!(names.contains("east bale (woreda)"));
    }

    #[test]
    fn test_hierarchy_aliases_give_levels() {
        let documents = IndexDocumentBuilder::default().build_from_edges(&edges());
        let ids: Vec<&str> = documents.iter().map(|d| d.kg_id.as_str()).collect();
        assert_eq!(ids, vec!["Q_OR", "Q_BALE", "Q_W"]);

        let level = |d: &IndexDocument| hierarchy_level(&d.all_labels(), '<');
        assert_eq!(level(&documents[0]), 1);
        assert_eq!(level(&documents[1]), 2);
        assert_eq!(level(&documents[2]), 3);

        assert_eq!(documents[1].labels[0], "Bale Zone");
        assert!(documents[1].aliases.contains(&"bale<oromia".to_string()));
        assert!(documents[1].aliases.contains(&"bale zone<oromia region".to_string()));
        assert!(documents[2].aliases.contains(&"east bale<bale<oromia".to_string()));
    }

    #[test]
    fn test_build_with_enrichment_adds_titles() {
        let store = FakeStore::with_articles(&[("Q_BALE", "https://en.wikipedia.org/wiki/Bale_Province")]);
        let documents = IndexDocumentBuilder::default()
            .build_with_enrichment(&edges(), &store)
            .unwrap();
        assert!(documents[1].labels.contains(&"bale province".to_string()));
    }
}

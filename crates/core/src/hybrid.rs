//! Weighted fusion of several wide recommendation tables into one ranking.

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::config::{ConfigError, HybridConfig};
use crate::domain::edge::{ranking_order, HybridEdge, ScoredPair};
use crate::domain::item::ItemId;
use crate::errors::{DomainError, PipelineError};
use crate::table::{RecommendationTable, WideTable};

#[derive(Clone, Debug, PartialEq)]
pub struct HybridOutput {
    /// Source names in the order of every `HybridEdge::source_scores` vector.
    pub sources: Vec<String>,
    pub table: RecommendationTable,
    /// Outer-joined edges sorted by item, then combined score.
    pub edges: Vec<HybridEdge>,
}

impl HybridOutput {
    pub fn wide(&self) -> WideTable {
        self.table.to_wide()
    }
}

#[derive(Clone, Debug)]
pub struct HybridFuser {
    config: HybridConfig,
}

impl HybridFuser {
    pub fn new(config: HybridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.config.sources.iter().map(|source| source.name.as_str())
    }

    /// Fuse one wide table per configured source, looked up by source name.
    pub fn fuse(
        &self,
        tables: &BTreeMap<String, WideTable>,
    ) -> Result<HybridOutput, PipelineError> {
        let width = self.config.sources.len();
        let mut joined: HashMap<(ItemId, ItemId), Vec<Option<f64>>> = HashMap::new();

        for (slot, source) in self.config.sources.iter().enumerate() {
            let table = tables.get(&source.name).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "no table supplied for hybrid source `{}`",
                    source.name
                ))
            })?;

            for pair in table.to_long() {
                if pair.item == pair.neighbor {
                    return Err(DomainError::SelfEdge {
                        source_name: source.name.clone(),
                        item: pair.item,
                    }
                    .into());
                }
                let scores =
                    joined.entry((pair.item, pair.neighbor)).or_insert_with(|| vec![None; width]);
                // first occurrence is the better rank
                if scores[slot].is_none() {
                    scores[slot] = Some(pair.score);
                }
            }
        }

        let mut edges: Vec<HybridEdge> = joined
            .into_iter()
            .map(|((item, neighbor), source_scores)| {
                let combined_score = self
                    .config
                    .sources
                    .iter()
                    .zip(&source_scores)
                    .map(|(source, score)| source.weight * score.unwrap_or(0.0))
                    .sum();
                HybridEdge { item, neighbor, source_scores, combined_score }
            })
            .collect();
        edges.sort_by(|left, right| {
            left.item.cmp(&right.item).then_with(|| {
                ranking_order(
                    left.combined_score,
                    &left.neighbor,
                    right.combined_score,
                    &right.neighbor,
                )
            })
        });

        let long: Vec<ScoredPair> = edges
            .iter()
            .map(|edge| ScoredPair {
                item: edge.item.clone(),
                neighbor: edge.neighbor.clone(),
                score: edge.combined_score,
            })
            .collect();
        let table = RecommendationTable::from_long(&long, self.config.k);

        info!(
            event_name = "pipeline.hybrid.fused",
            sources = width,
            joined_edges = edges.len(),
            items = table.len(),
            kept_edges = table.edge_count(),
            k = self.config.k,
            "recommendation sources fused"
        );

        Ok(HybridOutput {
            sources: self.source_names().map(str::to_owned).collect(),
            table,
            edges,
        })
    }
}

//! Jaccard co-purchase scoring over basket counts.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::basket::BasketSet;
use crate::config::{CooccurrenceConfig, Denylist};
use crate::domain::edge::ranking_order;
use crate::domain::item::ItemId;
use crate::table::RecommendationTable;

/// |baskets with both| / |baskets with either|.
pub fn jaccard(pair_count: u32, left_count: u32, right_count: u32) -> f64 {
    let union = f64::from(left_count) + f64::from(right_count) - f64::from(pair_count);
    if union <= 0.0 {
        return 0.0;
    }
    f64::from(pair_count) / union
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CooccurrenceReport {
    pub candidate_pairs: usize,
    pub supported_pairs: usize,
    pub sources: usize,
    pub edges: usize,
}

#[derive(Clone, Debug)]
pub struct CooccurrenceScorer {
    config: CooccurrenceConfig,
    denylist: Denylist,
}

impl CooccurrenceScorer {
    pub fn new(config: CooccurrenceConfig, denylist: Denylist) -> Self {
        Self { config, denylist }
    }

    pub fn score(&self, baskets: &BasketSet, available: &HashSet<ItemId>) -> RecommendationTable {
        self.score_with_report(baskets, available).0
    }

    pub fn score_with_report(
        &self,
        baskets: &BasketSet,
        available: &HashSet<ItemId>,
    ) -> (RecommendationTable, CooccurrenceReport) {
        let items = &baskets.item_stats;
        let mut report =
            CooccurrenceReport { candidate_pairs: baskets.pair_stats.len(), ..Default::default() };

        let mut by_source: HashMap<&ItemId, Vec<(ItemId, f64)>> = HashMap::new();
        for (pair, pair_count) in baskets.pair_stats.iter() {
            if pair_count < self.config.min_pair_support {
                continue;
            }
            let (first, second) = (pair.first(), pair.second());
            let (first_count, second_count) = (items.get(first), items.get(second));
            if first_count < self.config.min_item_support
                || second_count < self.config.min_item_support
            {
                continue;
            }

            report.supported_pairs += 1;
            let score = jaccard(pair_count, first_count, second_count);
            by_source.entry(first).or_default().push((second.clone(), score));
            by_source.entry(second).or_default().push((first.clone(), score));
        }

        let lists: Vec<(ItemId, Vec<(ItemId, f64)>)> = by_source
            .into_par_iter()
            .map(|(source, edges)| (source.clone(), self.reduce_source(edges, available)))
            .filter(|(_, edges)| !edges.is_empty())
            .collect();

        let table = RecommendationTable::from_ranked(self.config.topk, lists);
        report.sources = table.len();
        report.edges = table.edge_count();

        info!(
            event_name = "pipeline.cooccurrence.scored",
            candidate_pairs = report.candidate_pairs,
            supported_pairs = report.supported_pairs,
            sources = report.sources,
            edges = report.edges,
            "co-purchase neighbors scored"
        );

        (table, report)
    }

    /// Cap, then filter, then truncate one source item's edges.
    fn reduce_source(
        &self,
        mut edges: Vec<(ItemId, f64)>,
        available: &HashSet<ItemId>,
    ) -> Vec<(ItemId, f64)> {
        edges.sort_by(|left, right| ranking_order(left.1, &left.0, right.1, &right.0));
        edges.truncate(self.config.k_neighbors);
        edges.retain(|(target, score)| {
            available.contains(target)
                && !self.denylist.contains(target)
                && *score >= self.config.score_threshold
        });
        edges.truncate(self.config.topk);
        edges
    }
}

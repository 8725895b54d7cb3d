use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// A directed, ranked recommendation from one scoring source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub source: ItemId,
    pub target: ItemId,
    pub score: f64,
    /// 1-based position within the source item's list.
    pub rank: usize,
}

/// Long-form edge row: one (item, neighbor, score) triple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub item: ItemId,
    pub neighbor: ItemId,
    pub score: f64,
}

impl ScoredPair {
    pub fn new(item: impl Into<ItemId>, neighbor: impl Into<ItemId>, score: f64) -> Self {
        Self { item: item.into(), neighbor: neighbor.into(), score }
    }
}

/// Outer-joined edge across every fused source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridEdge {
    pub item: ItemId,
    pub neighbor: ItemId,
    /// One slot per fused source, in source order. `None` when the source lacks the edge.
    pub source_scores: Vec<Option<f64>>,
    pub combined_score: f64,
}

/// Ranking order shared by every scorer: score descending, then target id ascending.
///
/// NaN sorts last so it can never take a top slot.
pub fn ranking_order(
    left_score: f64,
    left_target: &ItemId,
    right_score: f64,
    right_target: &ItemId,
) -> Ordering {
    match (left_score.is_nan(), right_score.is_nan()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }

    right_score.total_cmp(&left_score).then_with(|| left_target.cmp(right_target))
}

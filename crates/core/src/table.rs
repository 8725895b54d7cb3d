//! Ranked recommendation tables and the wide ⇄ long conversions between them.
//!
//! A *wide* table has one row per item with `Top r` / `Score r` column pairs, as written
//! to disk. A *long* table has one [`ScoredPair`] per edge. Every scorer produces a
//! [`RecommendationTable`] and every consumer goes through the conversions here, so the
//! tie-break (score descending, then neighbor id ascending) is applied in one place.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::domain::edge::{ranking_order, NeighborEdge, ScoredPair};
use crate::domain::item::ItemId;
use crate::errors::DomainError;

pub const ID_COLUMN: &str = "Product ID";
pub const TOP_PREFIX: &str = "Top ";
pub const SCORE_PREFIX: &str = "Score ";

pub fn top_column(rank: usize) -> String {
    format!("{TOP_PREFIX}{rank}")
}

pub fn score_column(rank: usize) -> String {
    format!("{SCORE_PREFIX}{rank}")
}

/// How neighbors with equal scores must be ordered within a row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TieOrder {
    /// Target id ascending.
    #[default]
    TargetId,
    /// The scorer's own secondary key, e.g. lift for association rules.
    Scorer,
}

/// Item → ranked neighbor edges from a single source.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecommendationTable {
    k: usize,
    tie_order: TieOrder,
    rows: BTreeMap<ItemId, Vec<NeighborEdge>>,
}

impl RecommendationTable {
    pub fn empty(k: usize) -> Self {
        Self { k, tie_order: TieOrder::default(), rows: BTreeMap::new() }
    }

    /// Build from per-item neighbor lists that are already in final rank order.
    ///
    /// Lists are truncated to `k`; empty lists are skipped so no item gets an empty row.
    pub fn from_ranked<I>(k: usize, lists: I) -> Self
    where
        I: IntoIterator<Item = (ItemId, Vec<(ItemId, f64)>)>,
    {
        let mut rows = BTreeMap::new();
        for (source, neighbors) in lists {
            let edges: Vec<NeighborEdge> = neighbors
                .into_iter()
                .take(k)
                .enumerate()
                .map(|(index, (target, score))| NeighborEdge {
                    source: source.clone(),
                    target,
                    score,
                    rank: index + 1,
                })
                .collect();
            if !edges.is_empty() {
                rows.insert(source, edges);
            }
        }
        Self { k, tie_order: TieOrder::default(), rows }
    }

    pub fn with_tie_order(mut self, tie_order: TieOrder) -> Self {
        self.tie_order = tie_order;
        self
    }


    /// long → wide: order each item's edges by score, keep the first `k`.
    ///
    /// A repeated (item, neighbor) pair keeps only its best-scored occurrence.
    pub fn from_long(pairs: &[ScoredPair], k: usize) -> Self {
        let mut grouped: BTreeMap<&ItemId, Vec<&ScoredPair>> = BTreeMap::new();
        for pair in pairs {
            grouped.entry(&pair.item).or_default().push(pair);
        }

        let lists = grouped.into_iter().map(|(item, mut edges)| {
            edges.sort_by(|left, right| {
                ranking_order(left.score, &left.neighbor, right.score, &right.neighbor)
            });
            let mut seen = HashSet::new();
            let neighbors: Vec<(ItemId, f64)> = edges
                .into_iter()
                .filter(|edge| seen.insert(&edge.neighbor))
                .map(|edge| (edge.neighbor.clone(), edge.score))
                .collect();
            (item.clone(), neighbors)
        });

        Self::from_ranked(k, lists)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn get(&self, item: &ItemId) -> Option<&[NeighborEdge]> {
        self.rows.get(item).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&ItemId, &[NeighborEdge])> {
        self.rows.iter().map(|(item, edges)| (item, edges.as_slice()))
    }

    pub fn edges(&self) -> impl Iterator<Item = &NeighborEdge> {
        self.rows.values().flatten()
    }

    pub fn to_long(&self) -> Vec<ScoredPair> {
        self.edges()
            .map(|edge| ScoredPair {
                item: edge.source.clone(),
                neighbor: edge.target.clone(),
                score: edge.score,
            })
            .collect()
    }

    pub fn to_wide(&self) -> WideTable {
        let rows = self
            .rows
            .iter()
            .map(|(item, edges)| {
                let mut slots: Vec<WideSlot> = edges
                    .iter()
                    .map(|edge| WideSlot {
                        top: Some(edge.target.clone()),
                        score: Some(edge.score),
                    })
                    .collect();
                slots.resize(self.k, WideSlot::default());
                WideRow { item: Some(item.clone()), slots }
            })
            .collect();
        WideTable { k: self.k, has_scores: true, rows }
    }

    /// Check the table invariants: contiguous ranks, no self edges, no repeated target,
    /// at most `k` edges, scores non-increasing with ties ordered per [`TieOrder`].
    pub fn validate(&self, source_name: &str) -> Result<(), DomainError> {
        for (item, edges) in &self.rows {
            if edges.len() > self.k {
                return Err(DomainError::InvariantViolation(format!(
                    "`{source_name}` lists {} neighbors for `{item}` (k = {})",
                    edges.len(),
                    self.k
                )));
            }

            let mut targets = HashSet::new();
            for (index, edge) in edges.iter().enumerate() {
                if edge.target == *item {
                    return Err(DomainError::SelfEdge {
                        source_name: source_name.to_owned(),
                        item: item.clone(),
                    });
                }
                if edge.rank != index + 1 {
                    return Err(DomainError::InvariantViolation(format!(
                        "`{source_name}` rank {} for `{item}` is out of sequence",
                        edge.rank
                    )));
                }
                if !targets.insert(&edge.target) {
                    return Err(DomainError::InvariantViolation(format!(
                        "`{source_name}` repeats neighbor `{}` for `{item}`",
                        edge.target
                    )));
                }
            }

            let scorer_ties = self.tie_order == TieOrder::Scorer;
            let ordered = edges.windows(2).all(|pair| {
                ranking_order(pair[0].score, &pair[0].target, pair[1].score, &pair[1].target)
                    .is_lt()
                    || (scorer_ties && pair[0].score == pair[1].score)
            });
            if !ordered {
                return Err(DomainError::InvariantViolation(format!(
                    "`{source_name}` neighbors of `{item}` are not in rank order"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WideSlot {
    pub top: Option<ItemId>,
    pub score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WideRow {
    pub item: Option<ItemId>,
    /// Exactly `k` slots; unused ranks are null.
    pub slots: Vec<WideSlot>,
}

/// Columnar `Product ID, Top 1, Score 1, …` table with nullable cells.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WideTable {
    pub k: usize,
    /// Tables written without `Score r` columns carry no usable edges for fusion.
    pub has_scores: bool,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn empty(k: usize) -> Self {
        Self { k, has_scores: true, rows: Vec::new() }
    }

    /// long → wide with null padding for unused ranks.
    pub fn from_long(pairs: &[ScoredPair], k: usize) -> Self {
        RecommendationTable::from_long(pairs, k).to_wide()
    }

    /// wide → long: one row per non-null `Top r` / `Score r` pair.
    ///
    /// Rows with a null item id are skipped, as are ranks with a null neighbor or score.
    pub fn to_long(&self) -> Vec<ScoredPair> {
        if !self.has_scores {
            return Vec::new();
        }

        let mut pairs = Vec::new();
        for row in &self.rows {
            let Some(item) = &row.item else {
                continue;
            };
            for slot in &row.slots {
                if let (Some(neighbor), Some(score)) = (&slot.top, slot.score) {
                    pairs.push(ScoredPair {
                        item: item.clone(),
                        neighbor: neighbor.clone(),
                        score,
                    });
                }
            }
        }
        pairs
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(1 + self.k * 2);
        columns.push(ID_COLUMN.to_owned());
        for rank in 1..=self.k {
            columns.push(top_column(rank));
            if self.has_scores {
                columns.push(score_column(rank));
            }
        }
        columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

//! Neighbor extraction around an external item-similarity collaborator.
//!
//! The collaborator owns the model: it turns an [`InteractionLog`] into a dense
//! [`SimilarityMatrix`]. The adapter only thresholds, gates and ranks each row, so any
//! model honoring the numeric contract can be swapped in.

pub mod collaborators;
pub mod interactions;

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::basket::PairStats;
use crate::config::{ConfigError, Denylist, EmbeddingConfig};
use crate::domain::edge::ranking_order;
use crate::domain::item::ItemId;
use crate::errors::PipelineError;
use crate::table::RecommendationTable;

pub use self::collaborators::{ItemCosine, VectorCosine};
pub use self::interactions::InteractionLog;

/// Square item × item score matrix; row and column `i` both belong to `item_ids[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityMatrix {
    pub item_ids: Vec<ItemId>,
    pub values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn new(item_ids: Vec<ItemId>, values: Array2<f64>) -> Result<Self, ConfigError> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(ConfigError::Validation(format!(
                "similarity matrix must be square, got {rows}x{cols}"
            )));
        }
        if rows != item_ids.len() {
            return Err(ConfigError::Validation(format!(
                "similarity matrix has {rows} rows for {} item ids",
                item_ids.len()
            )));
        }
        let distinct: HashSet<&ItemId> = item_ids.iter().collect();
        if distinct.len() != item_ids.len() {
            return Err(ConfigError::Validation(
                "similarity matrix item ids must be unique".to_string(),
            ));
        }
        Ok(Self { item_ids, values })
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

/// Source of item × item similarity scores. Batching, retries and backoff are the
/// implementor's concern.
pub trait SimilarityCollaborator: Send + Sync {
    fn name(&self) -> &'static str;

    fn similarity_matrix(&self, log: &InteractionLog) -> Result<SimilarityMatrix, PipelineError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingReport {
    pub matrix_items: usize,
    pub rows_below_k_min: usize,
    pub sources: usize,
    pub edges: usize,
}

#[derive(Clone, Debug)]
pub struct EmbeddingNeighborAdapter {
    config: EmbeddingConfig,
    denylist: Denylist,
}

impl EmbeddingNeighborAdapter {
    pub fn new(config: EmbeddingConfig, denylist: Denylist) -> Self {
        Self { config, denylist }
    }

    /// Trim the log to the configured quantile band, ask the collaborator for scores,
    /// then rank every row.
    pub fn neighbors<C>(
        &self,
        collaborator: &C,
        log: &InteractionLog,
        pair_stats: &PairStats,
        available: &HashSet<ItemId>,
    ) -> Result<(RecommendationTable, EmbeddingReport), PipelineError>
    where
        C: SimilarityCollaborator + ?Sized,
    {
        let trimmed = log.trim_to_band(self.config.q_low, self.config.q_high);
        let matrix = collaborator.similarity_matrix(&trimmed)?;
        let (table, report) = self.rank(&matrix, pair_stats, available);

        info!(
            event_name = "pipeline.embedding.ranked",
            collaborator = collaborator.name(),
            interactions = trimmed.len(),
            matrix_items = report.matrix_items,
            rows_below_k_min = report.rows_below_k_min,
            sources = report.sources,
            edges = report.edges,
            "similarity neighbors ranked"
        );

        Ok((table, report))
    }

    /// Rank each row of an already validated matrix.
    pub fn rank(
        &self,
        matrix: &SimilarityMatrix,
        pair_stats: &PairStats,
        available: &HashSet<ItemId>,
    ) -> (RecommendationTable, EmbeddingReport) {
        let rows: Vec<(usize, Option<Vec<(ItemId, f64)>>)> = (0..matrix.len())
            .into_par_iter()
            .map(|row| {
                let neighbors = self.rank_row(matrix, row, pair_stats, available);
                (row, (neighbors.len() >= self.config.k_min.max(1)).then_some(neighbors))
            })
            .collect();

        let mut report = EmbeddingReport { matrix_items: matrix.len(), ..Default::default() };
        let mut lists = Vec::new();
        for (row, neighbors) in rows {
            match neighbors {
                Some(neighbors) => lists.push((matrix.item_ids[row].clone(), neighbors)),
                None => report.rows_below_k_min += 1,
            }
        }

        let table = RecommendationTable::from_ranked(self.config.k_max, lists);
        report.sources = table.len();
        report.edges = table.edge_count();
        (table, report)
    }

    fn rank_row(
        &self,
        matrix: &SimilarityMatrix,
        row: usize,
        pair_stats: &PairStats,
        available: &HashSet<ItemId>,
    ) -> Vec<(ItemId, f64)> {
        let source = &matrix.item_ids[row];
        let scores: ArrayView1<'_, f64> = matrix.values.row(row);

        let mut candidates: Vec<(usize, f64)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|&(col, score)| col != row && score.is_finite())
            .filter(|&(_, score)| !self.config.positive_only || score > 0.0)
            .collect();

        if let Some(floor) = self.config.min_score {
            candidates.retain(|&(_, score)| score >= floor);
        }
        if let Some(relative) = self.config.relative_min {
            let row_max =
                candidates.iter().map(|&(_, score)| score).fold(f64::NEG_INFINITY, f64::max);
            if row_max > 0.0 {
                let floor = relative * row_max;
                candidates.retain(|&(_, score)| score >= floor);
            }
        }

        let mut neighbors: Vec<(ItemId, f64)> = candidates
            .into_iter()
            .map(|(col, score)| (&matrix.item_ids[col], score))
            .filter(|(target, _)| {
                self.config
                    .min_pair_support
                    .map_or(true, |min| pair_stats.get(source, target) >= min)
            })
            .filter(|(target, _)| available.contains(*target) && !self.denylist.contains(target))
            .map(|(target, score)| (target.clone(), score))
            .collect();

        neighbors.sort_by(|left, right| ranking_order(left.1, &left.0, right.1, &right.0));
        neighbors.truncate(self.config.k_max);
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{TimeZone, Utc};
    use ndarray::array;

    use super::{
        EmbeddingNeighborAdapter, InteractionLog, ItemCosine, SimilarityCollaborator,
        SimilarityMatrix,
    };
    use crate::basket::{BasketBuilder, PairStats};
    use crate::config::{ConfigError, Denylist, EmbeddingConfig};
    use crate::domain::item::ItemId;
    use crate::domain::order::OrderLine;
    use crate::errors::PipelineError;

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|id| ItemId::from(*id)).collect()
    }

    fn all(raw: &[&str]) -> HashSet<ItemId> {
        ids(raw).into_iter().collect()
    }

    fn everything() -> HashSet<ItemId> {
        all(&["A", "B", "C", "D"])
    }

    fn open_config() -> EmbeddingConfig {
        EmbeddingConfig {
            min_score: None,
            relative_min: None,
            positive_only: true,
            k_min: 1,
            k_max: 10,
            min_pair_support: None,
            q_low: 0.0,
            q_high: 1.0,
            ..EmbeddingConfig::default()
        }
    }

    fn matrix() -> SimilarityMatrix {
        let values = array![
            [1.0, 0.9, 0.2, -0.5],
            [0.9, 1.0, 0.4, f64::NAN],
            [0.2, 0.4, 1.0, 0.3],
            [-0.5, f64::NAN, 0.3, 1.0],
        ];
        match SimilarityMatrix::new(ids(&["A", "B", "C", "D"]), values) {
            Ok(matrix) => matrix,
            Err(err) => panic!("fixture matrix is valid: {err}"),
        }
    }

    fn targets(table: &crate::table::RecommendationTable, source: &str) -> Vec<String> {
        table
            .get(&ItemId::from(source))
            .unwrap_or_default()
            .iter()
            .map(|edge| edge.target.to_string())
            .collect()
    }

    struct FixedMatrix(SimilarityMatrix);

    impl SimilarityCollaborator for FixedMatrix {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn similarity_matrix(
            &self,
            _log: &InteractionLog,
        ) -> Result<SimilarityMatrix, PipelineError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn non_square_matrix_is_a_config_error() {
        let result = SimilarityMatrix::new(ids(&["A", "B"]), array![[1.0, 0.5]]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        let result = SimilarityMatrix::new(ids(&["A"]), array![[1.0, 0.5], [0.5, 1.0]]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn diagonal_non_finite_and_negative_cells_are_ignored() {
        let adapter = EmbeddingNeighborAdapter::new(open_config(), Denylist::default());
        let (table, _) = adapter.rank(&matrix(), &PairStats::default(), &everything());

        assert_eq!(targets(&table, "A"), vec!["B", "C"]);
        assert_eq!(targets(&table, "B"), vec!["A", "C"]);
        assert!(table.edges().all(|edge| edge.source != edge.target));
        assert!(table.validate("embedding").is_ok());
    }

    #[test]
    fn negative_scores_survive_when_not_positive_only() {
        let config = EmbeddingConfig { positive_only: false, ..open_config() };
        let adapter = EmbeddingNeighborAdapter::new(config, Denylist::default());
        let (table, _) = adapter.rank(&matrix(), &PairStats::default(), &everything());
        assert_eq!(targets(&table, "A"), vec!["B", "C", "D"]);
    }

    #[test]
    fn absolute_and_relative_floors_apply() {
        let config = EmbeddingConfig { min_score: Some(0.25), ..open_config() };
        let adapter = EmbeddingNeighborAdapter::new(config, Denylist::default());
        let (table, _) = adapter.rank(&matrix(), &PairStats::default(), &everything());
        assert_eq!(targets(&table, "A"), vec!["B"]);

        let config = EmbeddingConfig { relative_min: Some(0.5), ..open_config() };
        let adapter = EmbeddingNeighborAdapter::new(config, Denylist::default());
        let (table, _) = adapter.rank(&matrix(), &PairStats::default(), &everything());
        // C's row max is 0.4; A sits exactly on the 0.2 floor and is kept
        assert_eq!(targets(&table, "C"), vec!["B", "D", "A"]);
        assert_eq!(targets(&table, "A"), vec!["B"]);
    }

    #[test]
    fn catalog_denylist_and_k_bounds_apply() {
        let config = EmbeddingConfig { k_min: 2, k_max: 2, ..open_config() };
        let adapter = EmbeddingNeighborAdapter::new(config, Denylist::new(["C"]));
        let (table, report) =
            adapter.rank(&matrix(), &PairStats::default(), &all(&["A", "B", "C"]));

        // C stays a source; A, B and D keep at most one target each
        assert_eq!(table.len(), 1);
        assert_eq!(targets(&table, "C"), vec!["B", "A"]);
        assert_eq!(report.rows_below_k_min, 3);
    }

    #[test]
    fn pair_support_gate_uses_basket_counts() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        let lines = vec![
            OrderLine::new("o1", "A", created),
            OrderLine::new("o1", "C", created),
        ];
        let baskets = BasketBuilder::default().build(&lines);
        let config = EmbeddingConfig { min_pair_support: Some(1), ..open_config() };
        let adapter = EmbeddingNeighborAdapter::new(config, Denylist::default());
        let (table, _) =
            adapter.rank(&matrix(), &baskets.pair_stats, &all(&["A", "B", "C", "D"]));

        assert_eq!(targets(&table, "A"), vec!["C"]);
        assert!(table.get(&ItemId::from("B")).is_none());
    }

    #[test]
    fn neighbors_runs_the_collaborator_end_to_end() -> Result<(), String> {
        let log = InteractionLog::from_pairs([("c1", "A"), ("c1", "B"), ("c2", "A"), ("c2", "B")]);
        let adapter = EmbeddingNeighborAdapter::new(open_config(), Denylist::default());
        let (table, report) = adapter
            .neighbors(&ItemCosine, &log, &PairStats::default(), &all(&["A", "B"]))
            .map_err(|err| err.to_string())?;

        assert_eq!(report.matrix_items, 2);
        assert_eq!(targets(&table, "A"), vec!["B"]);

        let fixed = FixedMatrix(matrix());
        let (table, _) = adapter
            .neighbors(&fixed, &log, &PairStats::default(), &all(&["A", "B", "C", "D"]))
            .map_err(|err| err.to_string())?;
        assert_eq!(table.len(), 4);
        Ok(())
    }
}

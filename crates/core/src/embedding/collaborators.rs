//! Built-in similarity collaborators.

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array2, Axis};

use super::interactions::InteractionLog;
use super::{SimilarityCollaborator, SimilarityMatrix};
use crate::domain::item::ItemId;
use crate::errors::{DataError, PipelineError};

/// Cosine similarity over the binary customer × item interaction matrix.
///
/// `cos(i, j) = shared customers / sqrt(customers(i) * customers(j))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ItemCosine;

impl SimilarityCollaborator for ItemCosine {
    fn name(&self) -> &'static str {
        "item_cosine"
    }

    fn similarity_matrix(&self, log: &InteractionLog) -> Result<SimilarityMatrix, PipelineError> {
        let item_ids = log.items();
        let index: HashMap<&ItemId, usize> =
            item_ids.iter().enumerate().map(|(position, item)| (item, position)).collect();

        let mut by_customer: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (customer, item) in log.iter() {
            if let Some(&position) = index.get(item) {
                by_customer.entry(customer).or_default().push(position);
            }
        }

        let n = item_ids.len();
        let mut counts = Array2::<f64>::zeros((n, n));
        for items in by_customer.values() {
            for (offset, &left) in items.iter().enumerate() {
                counts[[left, left]] += 1.0;
                for &right in &items[offset + 1..] {
                    counts[[left, right]] += 1.0;
                    counts[[right, left]] += 1.0;
                }
            }
        }

        let norms: Vec<f64> = counts.diag().iter().map(|count| count.sqrt()).collect();
        for ((row, col), value) in counts.indexed_iter_mut() {
            let denominator = norms[row] * norms[col];
            *value = if denominator > 0.0 { *value / denominator } else { 0.0 };
        }

        SimilarityMatrix::new(item_ids, counts).map_err(PipelineError::from)
    }
}

/// Cosine similarity over precomputed item embedding vectors.
#[derive(Clone, Debug)]
pub struct VectorCosine {
    item_ids: Vec<ItemId>,
    vectors: Array2<f64>,
}

impl VectorCosine {
    /// One row of `vectors` per entry of `item_ids`; ids must be unique.
    pub fn new(item_ids: Vec<ItemId>, vectors: Array2<f64>) -> Result<Self, DataError> {
        if item_ids.len() != vectors.nrows() {
            return Err(DataError::ShapeMismatch(format!(
                "{} embedding ids for {} vector rows",
                item_ids.len(),
                vectors.nrows()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = item_ids.iter().find(|item| !seen.insert(*item)) {
            return Err(DataError::DuplicateKey {
                table: "item_embeddings".to_owned(),
                key: duplicate.to_string(),
            });
        }
        Ok(Self { item_ids, vectors })
    }

    /// Keep only the rows whose item is in `allowed`, e.g. items above a price floor.
    pub fn restricted_to(self, allowed: &HashSet<ItemId>) -> Self {
        let keep: Vec<usize> = self
            .item_ids
            .iter()
            .enumerate()
            .filter(|(_, item)| allowed.contains(*item))
            .map(|(position, _)| position)
            .collect();
        let item_ids = keep.iter().map(|&position| self.item_ids[position].clone()).collect();
        let vectors = self.vectors.select(Axis(0), &keep);
        Self { item_ids, vectors }
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}

impl SimilarityCollaborator for VectorCosine {
    fn name(&self) -> &'static str {
        "vector_cosine"
    }

    fn similarity_matrix(&self, _log: &InteractionLog) -> Result<SimilarityMatrix, PipelineError> {
        let mut unit = self.vectors.clone();
        for mut row in unit.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row /= norm;
            }
        }
        let values = unit.dot(&unit.t());
        SimilarityMatrix::new(self.item_ids.clone(), values).map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use ndarray::array;

    use super::{ItemCosine, VectorCosine};
    use crate::domain::item::ItemId;
    use crate::embedding::interactions::InteractionLog;
    use crate::embedding::SimilarityCollaborator;
    use crate::errors::DataError;

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|id| ItemId::from(*id)).collect()
    }

    #[test]
    fn item_cosine_counts_shared_customers() -> Result<(), String> {
        let log = InteractionLog::from_pairs([
            ("c1", "A"),
            ("c1", "B"),
            ("c2", "A"),
            ("c2", "B"),
            ("c3", "A"),
            ("c3", "C"),
        ]);
        let matrix = ItemCosine.similarity_matrix(&log).map_err(|err| err.to_string())?;

        assert_eq!(matrix.item_ids, ids(&["A", "B", "C"]));
        // A: 3 customers, B: 2, shared 2
        assert!((matrix.values[[0, 1]] - 2.0 / 6.0_f64.sqrt()).abs() < 1e-12);
        assert!((matrix.values[[1, 0]] - matrix.values[[0, 1]]).abs() < 1e-12);
        assert_eq!(matrix.values[[1, 2]], 0.0);
        assert!((matrix.values[[2, 2]] - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn vector_cosine_normalizes_rows() -> Result<(), String> {
        let collaborator = VectorCosine::new(
            ids(&["A", "B", "C"]),
            array![[1.0, 0.0], [2.0, 0.0], [0.0, 3.0]],
        )
        .map_err(|err| err.to_string())?;
        let matrix = collaborator
            .similarity_matrix(&InteractionLog::default())
            .map_err(|err| err.to_string())?;

        assert!((matrix.values[[0, 1]] - 1.0).abs() < 1e-12);
        assert!(matrix.values[[0, 2]].abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn vector_cosine_rejects_mismatched_shapes() {
        let result = VectorCosine::new(ids(&["A"]), array![[1.0], [2.0]]);
        assert!(matches!(result, Err(DataError::ShapeMismatch(_))));
    }

    #[test]
    fn vector_cosine_rejects_duplicate_ids() {
        let result = VectorCosine::new(ids(&["A", "A"]), array![[1.0], [2.0]]);
        assert!(matches!(result, Err(DataError::DuplicateKey { .. })));
    }

    #[test]
    fn restriction_drops_rows_and_keeps_order() -> Result<(), String> {
        let collaborator =
            VectorCosine::new(ids(&["A", "B", "C"]), array![[1.0], [2.0], [3.0]])
                .map_err(|err| err.to_string())?;
        let allowed: HashSet<ItemId> = ids(&["C", "A"]).into_iter().collect();
        let restricted = collaborator.restricted_to(&allowed);

        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted.dimension(), 1);
        let matrix = restricted
            .similarity_matrix(&InteractionLog::default())
            .map_err(|err| err.to_string())?;
        assert_eq!(matrix.item_ids, ids(&["A", "C"]));
        Ok(())
    }
}

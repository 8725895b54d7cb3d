//! Distinct customer × item interactions fed to similarity collaborators.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::domain::item::ItemId;
use crate::domain::order::OrderLine;
use crate::stats::keys_in_band;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionLog {
    /// Sorted by (customer, item) and deduplicated.
    pairs: Vec<(String, ItemId)>,
}

impl InteractionLog {
    /// Lines without a customer id fall back to their order id as the customer key.
    pub fn from_lines(lines: &[OrderLine]) -> Self {
        let pairs: BTreeSet<(String, ItemId)> = lines
            .iter()
            .map(|line| (line.customer_key().to_owned(), line.item_id.clone()))
            .collect();
        Self { pairs: pairs.into_iter().collect() }
    }

    pub fn from_pairs<I, C, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, T)>,
        C: Into<String>,
        T: Into<ItemId>,
    {
        let pairs: BTreeSet<(String, ItemId)> =
            pairs.into_iter().map(|(customer, item)| (customer.into(), item.into())).collect();
        Self { pairs: pairs.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemId)> {
        self.pairs.iter().map(|(customer, item)| (customer.as_str(), item))
    }

    /// Distinct items, sorted.
    pub fn items(&self) -> Vec<ItemId> {
        let items: BTreeSet<&ItemId> = self.pairs.iter().map(|(_, item)| item).collect();
        items.into_iter().cloned().collect()
    }

    pub fn customer_count(&self) -> usize {
        let customers: HashSet<&str> =
            self.pairs.iter().map(|(customer, _)| customer.as_str()).collect();
        customers.len()
    }

    /// Keep items whose distinct-customer count lies in the inclusive `[q_low, q_high]` band.
    pub fn trim_to_band(&self, q_low: f64, q_high: f64) -> Self {
        let mut counts: HashMap<&ItemId, u32> = HashMap::new();
        for (_, item) in &self.pairs {
            *counts.entry(item).or_insert(0) += 1;
        }
        let kept: HashSet<&ItemId> = keys_in_band(&counts, q_low, q_high).into_iter().collect();

        let pairs: Vec<(String, ItemId)> =
            self.pairs.iter().filter(|(_, item)| kept.contains(item)).cloned().collect();

        debug!(
            event_name = "pipeline.embedding.log_trimmed",
            items_before = counts.len(),
            items_after = kept.len(),
            interactions = pairs.len(),
            "interaction log trimmed to quantile band"
        );

        Self { pairs }
    }
}

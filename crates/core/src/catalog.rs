//! Item reference data: the available-items catalog, collapsed attributes and the
//! per-item transaction aggregates consumed by brand matching.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Denylist;
use crate::domain::item::{Item, ItemId};
use crate::domain::order::OrderLine;
use crate::reduce::most_frequent_present;

/// One row of the attributes table. Items sold in several SKUs repeat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRow {
    pub item_id: ItemId,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub audience: Option<String>,
    pub price: Option<Decimal>,
}

impl AttributeRow {
    pub fn new(item_id: impl Into<ItemId>) -> Self {
        Self { item_id: item_id.into(), brand: None, category: None, audience: None, price: None }
    }
}

/// Collapse repeated attribute rows to one [`Item`] per id, field by field.
pub fn collapse_attributes(rows: &[AttributeRow]) -> BTreeMap<ItemId, Item> {
    let mut grouped: BTreeMap<&ItemId, Vec<&AttributeRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(&row.item_id).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(id, rows)| {
            let item = Item {
                id: id.clone(),
                brand: most_frequent_present(rows.iter().map(|row| row.brand.clone())),
                category: most_frequent_present(rows.iter().map(|row| row.category.clone())),
                audience: most_frequent_present(rows.iter().map(|row| row.audience.clone())),
                price: most_frequent_present(rows.iter().map(|row| row.price)),
            };
            (id.clone(), item)
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    available: HashSet<ItemId>,
    items: BTreeMap<ItemId, Item>,
}

impl Catalog {
    pub fn new<I>(available: I, attributes: &[AttributeRow]) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        let available: HashSet<ItemId> = available.into_iter().collect();
        let items = collapse_attributes(attributes);
        debug!(
            event_name = "pipeline.catalog.loaded",
            available = available.len(),
            attribute_rows = attributes.len(),
            items = items.len(),
            "catalog collapsed"
        );
        Self { available, items }
    }

    pub fn is_available(&self, item: &ItemId) -> bool {
        self.available.contains(item)
    }

    pub fn available(&self) -> &HashSet<ItemId> {
        &self.available
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Available items whose price is known and at least `min_price`.
    pub fn priced_at_least(&self, min_price: Decimal) -> HashSet<ItemId> {
        self.items
            .values()
            .filter(|item| self.available.contains(&item.id))
            .filter(|item| item.price.is_some_and(|price| price >= min_price))
            .map(|item| item.id.clone())
            .collect()
    }

    /// Lines for available, non-denylisted items only.
    pub fn restrict_lines(&self, lines: &[OrderLine], denylist: &Denylist) -> Vec<OrderLine> {
        lines
            .iter()
            .filter(|line| self.is_available(&line.item_id) && !denylist.contains(&line.item_id))
            .cloned()
            .collect()
    }
}

/// Per-item transaction count joined with catalog attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAggregate {
    pub item: ItemId,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub audience: Option<String>,
    pub transactions: u32,
}

/// Count transaction lines per item and attach catalog attributes.
///
/// Items that are unavailable, denylisted or missing from the attribute table are skipped.
pub fn item_aggregates(
    lines: &[OrderLine],
    catalog: &Catalog,
    denylist: &Denylist,
) -> Vec<ItemAggregate> {
    let mut counts: HashMap<&ItemId, u32> = HashMap::new();
    for line in lines {
        if catalog.is_available(&line.item_id) && !denylist.contains(&line.item_id) {
            *counts.entry(&line.item_id).or_insert(0) += 1;
        }
    }

    let mut aggregates: Vec<ItemAggregate> = counts
        .into_iter()
        .filter_map(|(id, transactions)| {
            let item = catalog.item(id)?;
            Some(ItemAggregate {
                item: id.clone(),
                brand: item.brand.clone(),
                category: item.category.clone(),
                audience: item.audience.clone(),
                transactions,
            })
        })
        .collect();
    aggregates.sort_by(|left, right| left.item.cmp(&right.item));
    aggregates
}

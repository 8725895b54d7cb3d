//! Order lines → baskets, plus item and pair basket counts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::{BasketConfig, Denylist};
use crate::domain::item::ItemId;
use crate::domain::order::{Basket, OrderLine};

/// Unordered item pair stored with the lexicographically smaller id first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemPair {
    first: ItemId,
    second: ItemId,
}

impl ItemPair {
    /// Returns `None` for a degenerate pair of one item with itself.
    pub fn new(a: ItemId, b: ItemId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &ItemId {
        &self.first
    }

    pub fn second(&self) -> &ItemId {
        &self.second
    }
}

/// Item → number of distinct baskets containing it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemStats(HashMap<ItemId, u32>);

impl ItemStats {
    pub fn get(&self, item: &ItemId) -> u32 {
        self.0.get(item).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u32)> {
        self.0.iter().map(|(item, &count)| (item, count))
    }

    pub fn as_map(&self) -> &HashMap<ItemId, u32> {
        &self.0
    }
}

/// Canonical pair → number of distinct baskets containing both items.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairStats(HashMap<ItemPair, u32>);

impl PairStats {
    pub fn get(&self, a: &ItemId, b: &ItemId) -> u32 {
        ItemPair::new(a.clone(), b.clone()).and_then(|pair| self.0.get(&pair).copied()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemPair, u32)> {
        self.0.iter().map(|(pair, &count)| (pair, count))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BasketReport {
    pub lines_read: usize,
    pub denylisted_lines: usize,
    pub baskets: usize,
    pub single_item_baskets: usize,
}

#[derive(Clone, Debug, Default)]
pub struct BasketSet {
    /// Sorted by order id.
    pub baskets: Vec<Basket>,
    pub item_stats: ItemStats,
    pub pair_stats: PairStats,
    pub report: BasketReport,
}

#[derive(Clone, Debug, Default)]
pub struct BasketBuilder {
    denylist: Denylist,
}

impl BasketBuilder {
    pub fn new(config: BasketConfig) -> Self {
        Self { denylist: config.denylist }
    }

    pub fn build(&self, lines: &[OrderLine]) -> BasketSet {
        let mut report = BasketReport { lines_read: lines.len(), ..BasketReport::default() };
        let mut grouped: BTreeMap<&str, (BTreeSet<ItemId>, DateTime<Utc>)> = BTreeMap::new();

        for line in lines {
            if self.denylist.contains(&line.item_id) {
                report.denylisted_lines += 1;
                continue;
            }
            let entry = grouped
                .entry(line.order_id.as_str())
                .or_insert_with(|| (BTreeSet::new(), line.created));
            entry.0.insert(line.item_id.clone());
            if line.created > entry.1 {
                entry.1 = line.created;
            }
        }

        let baskets: Vec<Basket> = grouped
            .into_iter()
            .map(|(order_id, (items, created))| Basket {
                order_id: order_id.to_owned(),
                created,
                items: items.into_iter().collect(),
            })
            .collect();

        report.baskets = baskets.len();
        report.single_item_baskets = baskets.iter().filter(|basket| basket.len() < 2).count();

        let item_stats = count_items(&baskets);
        let pair_stats = count_pairs(&baskets);

        debug!(
            event_name = "pipeline.basket.built",
            lines_read = report.lines_read,
            denylisted_lines = report.denylisted_lines,
            baskets = report.baskets,
            single_item_baskets = report.single_item_baskets,
            items = item_stats.len(),
            pairs = pair_stats.len(),
            "baskets built"
        );

        BasketSet { baskets, item_stats, pair_stats, report }
    }
}

fn count_items(baskets: &[Basket]) -> ItemStats {
    let mut counts: HashMap<ItemId, u32> = HashMap::new();
    for basket in baskets {
        for item in &basket.items {
            *counts.entry(item.clone()).or_insert(0) += 1;
        }
    }
    ItemStats(counts)
}

fn count_pairs(baskets: &[Basket]) -> PairStats {
    let counts = baskets
        .par_iter()
        .filter(|basket| basket.len() >= 2)
        .fold(HashMap::new, |mut acc: HashMap<ItemPair, u32>, basket| {
            // items are sorted, so (i, j) with i < j is already canonical
            for (index, first) in basket.items.iter().enumerate() {
                for second in &basket.items[index + 1..] {
                    let pair = ItemPair { first: first.clone(), second: second.clone() };
                    *acc.entry(pair).or_insert(0) += 1;
                }
            }
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (pair, count) in right {
                *left.entry(pair).or_insert(0) += count;
            }
            left
        });
    PairStats(counts)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{BasketBuilder, ItemPair};
    use crate::config::{BasketConfig, Denylist};
    use crate::domain::item::ItemId;
    use crate::domain::order::OrderLine;

    fn line(order: &str, item: &str, minute: u32) -> OrderLine {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).single().unwrap_or_default();
        OrderLine::new(order, item, created)
    }

    fn id(value: &str) -> ItemId {
        ItemId::from(value)
    }

    #[test]
    fn item_and_pair_counts_match_basket_membership() {
        let lines = vec![
            line("o1", "X", 0),
            line("o1", "Y", 1),
            line("o2", "X", 0),
            line("o2", "Y", 0),
            line("o2", "Y", 5),
            line("o3", "X", 0),
            line("o3", "Z", 0),
        ];
        let set = BasketBuilder::default().build(&lines);

        assert_eq!(set.item_stats.get(&id("X")), 3);
        assert_eq!(set.item_stats.get(&id("Y")), 2);
        assert_eq!(set.item_stats.get(&id("Z")), 1);
        assert_eq!(set.pair_stats.get(&id("X"), &id("Y")), 2);
        assert_eq!(set.pair_stats.get(&id("Y"), &id("X")), 2);
        assert_eq!(set.pair_stats.get(&id("X"), &id("Z")), 1);
        assert_eq!(set.pair_stats.get(&id("Y"), &id("Z")), 0);
        assert_eq!(set.pair_stats.len(), 2);
    }

    #[test]
    fn duplicate_lines_do_not_double_count() {
        let lines = vec![line("o1", "A", 0), line("o1", "A", 1), line("o1", "B", 2)];
        let set = BasketBuilder::default().build(&lines);

        assert_eq!(set.baskets.len(), 1);
        assert_eq!(set.baskets[0].items, vec![id("A"), id("B")]);
        assert_eq!(set.item_stats.get(&id("A")), 1);
        assert_eq!(set.pair_stats.get(&id("A"), &id("B")), 1);
    }

    #[test]
    fn basket_keeps_latest_created_timestamp() {
        let lines = vec![line("o1", "A", 10), line("o1", "B", 45), line("o1", "C", 5)];
        let set = BasketBuilder::default().build(&lines);
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 12, 45, 0).single();
        assert_eq!(Some(set.baskets[0].created), expected);
    }

    #[test]
    fn denylisted_items_are_dropped_before_grouping() {
        let builder =
            BasketBuilder::new(BasketConfig { denylist: Denylist::new(["970300"]) });
        let lines = vec![line("o1", "A", 0), line("o1", "970300", 0), line("o2", "970300", 0)];
        let set = builder.build(&lines);

        assert_eq!(set.report.denylisted_lines, 2);
        assert_eq!(set.baskets.len(), 1, "an order of only denylisted items disappears");
        assert_eq!(set.item_stats.get(&id("970300")), 0);
        assert!(set.pair_stats.is_empty(), "o1 is a single-item basket after filtering");
    }

    #[test]
    fn single_item_baskets_count_for_items_but_not_pairs() {
        let set = BasketBuilder::default().build(&[line("o1", "A", 0)]);
        assert_eq!(set.item_stats.get(&id("A")), 1);
        assert!(set.pair_stats.is_empty());
        assert_eq!(set.report.single_item_baskets, 1);
    }

    #[test]
    fn baskets_are_sorted_by_order_id() {
        let lines = vec![line("o9", "A", 0), line("o1", "B", 0), line("o5", "C", 0)];
        let set = BasketBuilder::default().build(&lines);
        let orders: Vec<_> = set.baskets.iter().map(|b| b.order_id.as_str()).collect();
        assert_eq!(orders, vec!["o1", "o5", "o9"]);
    }

    #[test]
    fn item_pair_is_canonical() {
        let forward = ItemPair::new(id("b"), id("a"));
        let backward = ItemPair::new(id("a"), id("b"));
        assert_eq!(forward, backward);
        assert_eq!(forward.as_ref().map(|pair| pair.first().as_str()), Some("a"));
        assert!(ItemPair::new(id("a"), id("a")).is_none());
    }
}

//! Association-rule neighbors: frequent itemsets over trimmed baskets, then A → B rules
//! ranked by confidence and lift.

pub mod apriori;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::basket::BasketSet;
use crate::config::RuleMinerConfig;
use crate::domain::item::ItemId;
use crate::stats::keys_in_band;
use crate::table::{RecommendationTable, TieOrder};

use self::apriori::{derive_rules, frequent_itemsets, Incidence};

/// A single-antecedent, single-consequent rule resolved to item ids.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PairRule {
    pub antecedent: ItemId,
    pub consequent: ItemId,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuleReport {
    pub items_in_band: usize,
    pub baskets_kept: usize,
    pub frequent_itemsets: usize,
    pub rules: usize,
    pub pair_rules: usize,
}

#[derive(Clone, Debug)]
pub struct RuleMiner {
    config: RuleMinerConfig,
}

impl RuleMiner {
    pub fn new(config: RuleMinerConfig) -> Self {
        Self { config }
    }

    pub fn mine(&self, baskets: &BasketSet) -> RecommendationTable {
        self.mine_with_report(baskets).0
    }

    pub fn mine_with_report(&self, baskets: &BasketSet) -> (RecommendationTable, RuleReport) {
        let (rules, report) = self.pair_rules(baskets);

        let mut by_antecedent: BTreeMap<ItemId, Vec<PairRule>> = BTreeMap::new();
        for rule in rules {
            by_antecedent.entry(rule.antecedent.clone()).or_default().push(rule);
        }

        let lists = by_antecedent.into_iter().map(|(antecedent, mut rules)| {
            rules.sort_by(|left, right| {
                right
                    .confidence
                    .total_cmp(&left.confidence)
                    .then_with(|| right.lift.total_cmp(&left.lift))
                    .then_with(|| left.consequent.cmp(&right.consequent))
            });
            let neighbors =
                rules.into_iter().map(|rule| (rule.consequent, rule.confidence)).collect();
            (antecedent, neighbors)
        });
        let table = RecommendationTable::from_ranked(self.config.top_k, lists)
            .with_tie_order(TieOrder::Scorer);

        info!(
            event_name = "pipeline.rules.mined",
            items_in_band = report.items_in_band,
            baskets_kept = report.baskets_kept,
            frequent_itemsets = report.frequent_itemsets,
            pair_rules = report.pair_rules,
            sources = table.len(),
            "association rules mined"
        );

        (table, report)
    }

    /// Every A → B rule passing the support and confidence floors, unranked.
    pub fn pair_rules(&self, baskets: &BasketSet) -> (Vec<PairRule>, RuleReport) {
        let mut report = RuleReport::default();

        let in_band: HashSet<ItemId> = keys_in_band(
            baskets.item_stats.as_map(),
            self.config.lower_q,
            self.config.upper_q,
        )
        .into_iter()
        .collect();
        report.items_in_band = in_band.len();

        let trimmed: Vec<Vec<ItemId>> = baskets
            .baskets
            .iter()
            .map(|basket| {
                basket.items.iter().filter(|item| in_band.contains(*item)).cloned().collect()
            })
            .filter(|items: &Vec<ItemId>| items.len() >= 2)
            .collect();
        report.baskets_kept = trimmed.len();

        if trimmed.is_empty() {
            debug!(event_name = "pipeline.rules.empty", "no baskets left after quantile trim");
            return (Vec::new(), report);
        }

        let incidence = Incidence::from_baskets(trimmed.iter().map(Vec::as_slice));
        let itemsets =
            frequent_itemsets(&incidence, self.config.min_support, self.config.max_itemset_len);
        report.frequent_itemsets = itemsets.len();

        let rules = derive_rules(&itemsets, self.config.min_confidence);
        report.rules = rules.len();

        let pair_rules: Vec<PairRule> = rules
            .into_iter()
            .filter(|rule| rule.antecedent.len() == 1)
            .map(|rule| PairRule {
                antecedent: incidence.item(rule.antecedent[0]).clone(),
                consequent: incidence.item(rule.consequent).clone(),
                support: rule.support,
                confidence: rule.confidence,
                lift: rule.lift,
            })
            .collect();
        report.pair_rules = pair_rules.len();

        (pair_rules, report)
    }
}

//! Level-wise frequent itemset mining over a column-wise incidence matrix.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;

use crate::domain::item::ItemId;

/// Boolean basket × item matrix stored as one sorted basket-index list per item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Incidence {
    items: Vec<ItemId>,
    columns: Vec<Vec<u32>>,
    baskets: usize,
}

impl Incidence {
    /// Each basket must already hold distinct items.
    pub fn from_baskets<'a, I>(baskets: I) -> Self
    where
        I: IntoIterator<Item = &'a [ItemId]>,
    {
        let mut columns: BTreeMap<&ItemId, Vec<u32>> = BTreeMap::new();
        let mut count = 0usize;
        for (index, basket) in baskets.into_iter().enumerate() {
            count += 1;
            for item in basket {
                columns.entry(item).or_default().push(index as u32);
            }
        }

        let (items, columns) =
            columns.into_iter().map(|(item, tids)| (item.clone(), tids)).unzip();
        Self { items, columns, baskets: count }
    }

    pub fn baskets(&self) -> usize {
        self.baskets
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Item at a column index; indices follow item id order.
    pub fn item(&self, index: usize) -> &ItemId {
        &self.items[index]
    }

    pub fn column(&self, index: usize) -> &[u32] {
        &self.columns[index]
    }
}

/// Sorted column indices plus the number of baskets containing all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequentItemset {
    pub items: Vec<usize>,
    pub count: usize,
    pub support: f64,
}

/// Mine every itemset of up to `max_len` items with relative support ≥ `min_support`.
pub fn frequent_itemsets(
    incidence: &Incidence,
    min_support: f64,
    max_len: usize,
) -> Vec<FrequentItemset> {
    let total = incidence.baskets();
    if total == 0 || max_len == 0 {
        return Vec::new();
    }
    let support_of = |count: usize| count as f64 / total as f64;

    // (itemset, basket indices) for the current level
    let mut level: Vec<(Vec<usize>, Vec<u32>)> = (0..incidence.item_count())
        .filter(|&index| support_of(incidence.column(index).len()) >= min_support)
        .map(|index| (vec![index], incidence.column(index).to_vec()))
        .collect();

    let mut frequent = Vec::new();
    let mut size = 1;
    loop {
        frequent.extend(level.iter().map(|(items, tids)| FrequentItemset {
            items: items.clone(),
            count: tids.len(),
            support: support_of(tids.len()),
        }));
        if size >= max_len || level.len() < 2 {
            break;
        }

        let known: HashSet<&[usize]> = level.iter().map(|(items, _)| items.as_slice()).collect();
        let candidates = join_candidates(&level, &known);

        let next: Vec<(Vec<usize>, Vec<u32>)> = candidates
            .into_par_iter()
            .filter_map(|(parent, extension)| {
                let (items, tids) = &level[parent];
                let tids = intersect(tids, incidence.column(extension));
                if support_of(tids.len()) < min_support {
                    return None;
                }
                let mut items = items.clone();
                items.push(extension);
                Some((items, tids))
            })
            .collect();

        level = next;
        size += 1;
    }

    frequent
}

/// Apriori join of sets sharing all but their last item, with the subset prune.
///
/// Returns (index of the parent set in `level`, column index appended to it).
fn join_candidates(
    level: &[(Vec<usize>, Vec<u32>)],
    known: &HashSet<&[usize]>,
) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for (left_index, (left, _)) in level.iter().enumerate() {
        let prefix = &left[..left.len() - 1];
        for (right, _) in &level[left_index + 1..] {
            if &right[..right.len() - 1] != prefix {
                // levels are sorted lexicographically, so no later set shares the prefix
                break;
            }
            let extension = right[right.len() - 1];
            let mut candidate = left.clone();
            candidate.push(extension);
            if all_subsets_known(&candidate, known) {
                candidates.push((left_index, extension));
            }
        }
    }
    candidates
}

fn all_subsets_known(candidate: &[usize], known: &HashSet<&[usize]>) -> bool {
    // dropping either of the last two items yields the two parents, already known
    (0..candidate.len().saturating_sub(2)).all(|skip| {
        let subset: Vec<usize> = candidate
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != skip)
            .map(|(_, &item)| item)
            .collect();
        known.contains(subset.as_slice())
    })
}

fn intersect(left: &[u32], right: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Association rule `antecedent → consequent` with a single consequent.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub antecedent: Vec<usize>,
    pub consequent: usize,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Derive every single-consequent rule at or above `min_confidence`.
pub fn derive_rules(itemsets: &[FrequentItemset], min_confidence: f64) -> Vec<Rule> {
    let support: HashMap<&[usize], f64> =
        itemsets.iter().map(|set| (set.items.as_slice(), set.support)).collect();

    itemsets
        .par_iter()
        .filter(|set| set.items.len() >= 2)
        .flat_map_iter(|set| {
            let support = &support;
            set.items.iter().enumerate().filter_map(move |(position, &consequent)| {
                let antecedent: Vec<usize> = set
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != position)
                    .map(|(_, &item)| item)
                    .collect();
                // every subset of a frequent itemset is frequent
                let antecedent_support = *support.get(antecedent.as_slice())?;
                let consequent_support = *support.get([consequent].as_slice())?;
                let confidence = set.support / antecedent_support;
                if confidence < min_confidence {
                    return None;
                }
                Some(Rule {
                    antecedent,
                    consequent,
                    support: set.support,
                    confidence,
                    lift: confidence / consequent_support,
                })
            })
        })
        .collect()
}

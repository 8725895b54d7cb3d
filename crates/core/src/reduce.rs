//! Deterministic reducers shared by catalog collapsing and aggregate building.

use std::collections::HashMap;
use std::hash::Hash;

/// Pick the most frequent value; ties go to the value seen first.
///
/// Returns `None` for empty input so callers must decide what "no value" means.
pub fn most_frequent<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    // value -> (count, first position)
    let mut tally: HashMap<T, (usize, usize)> = HashMap::new();
    for (position, value) in values.into_iter().enumerate() {
        tally.entry(value).and_modify(|entry| entry.0 += 1).or_insert((1, position));
    }

    tally
        .into_iter()
        .max_by(|(_, (left_count, left_pos)), (_, (right_count, right_pos))| {
            left_count.cmp(right_count).then_with(|| right_pos.cmp(left_pos))
        })
        .map(|(value, _)| value)
}

/// Like [`most_frequent`] but skips missing entries first.
pub fn most_frequent_present<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = Option<T>>,
{
    most_frequent(values.into_iter().flatten())
}

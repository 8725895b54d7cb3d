//! Small numeric helpers: quantiles with linear interpolation.

use std::collections::HashMap;
use std::hash::Hash;

/// Quantile of `values` at `q` using linear interpolation between closest ranks.
///
/// Matches the common "type 7" definition: position `q * (n - 1)` in the sorted sample.
/// Returns `None` for an empty sample.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Inclusive quantile band `[low, high]` computed over a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantileBand {
    pub low: f64,
    pub high: f64,
}

impl QuantileBand {
    pub fn from_sample(values: &[f64], q_low: f64, q_high: f64) -> Option<Self> {
        Some(Self { low: quantile(values, q_low)?, high: quantile(values, q_high)? })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Keep the keys whose count falls inside the `[q_low, q_high]` quantile band of all counts.
pub fn keys_in_band<K>(counts: &HashMap<K, u32>, q_low: f64, q_high: f64) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    let sample: Vec<f64> = counts.values().map(|&count| f64::from(count)).collect();
    let Some(band) = QuantileBand::from_sample(&sample, q_low, q_high) else {
        return Vec::new();
    };

    counts
        .iter()
        .filter(|(_, &count)| band.contains(f64::from(count)))
        .map(|(key, _)| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{keys_in_band, quantile, QuantileBand};

    #[test]
    fn quantile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        let q95 = quantile(&values, 0.95).unwrap_or_default();
        assert!((q95 - 3.85).abs() < 1e-12);
    }

    #[test]
    fn quantile_of_empty_sample_is_none() {
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn quantile_ignores_input_order() {
        assert_eq!(quantile(&[9.0, 1.0, 5.0], 0.5), Some(5.0));
    }

    #[test]
    fn band_is_inclusive_on_both_ends() {
        let band = QuantileBand { low: 2.0, high: 4.0 };
        assert!(band.contains(2.0));
        assert!(band.contains(4.0));
        assert!(!band.contains(4.5));
    }

    #[test]
    fn keys_in_band_drops_rare_and_ubiquitous() {
        let counts: HashMap<&str, u32> =
            [("rare", 1), ("mid_a", 5), ("mid_b", 6), ("everywhere", 100)].into_iter().collect();
        let mut kept = keys_in_band(&counts, 0.25, 0.75);
        kept.sort_unstable();
        assert_eq!(kept, vec!["mid_a", "mid_b"]);
    }
}

//! Per-clock summary statistics over many trials.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ft_types::ClockFrequencyMap;

/// Summary of one clock's achieved frequency across trials (MHz).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockStatistics {
    pub samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl ClockStatistics {
    /// Summarize a non-empty sample. Returns `None` for an empty one.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mid = n / 2;
        let median = if n % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };

        Some(Self {
            samples: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

/// Accumulates trial results in any order and summarizes per clock.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    samples: BTreeMap<String, Vec<f64>>,
    trials: usize,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one trial's frequencies.
    pub fn add(&mut self, freqs: &ClockFrequencyMap) {
        self.trials += 1;
        for (clock, freq) in freqs {
            self.samples.entry(clock.clone()).or_default().push(*freq);
        }
    }

    /// Number of trials merged so far.
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Statistics per clock, keyed (and therefore ordered) by clock name.
    pub fn summarize(&self) -> BTreeMap<String, ClockStatistics> {
        self.samples
            .iter()
            .filter_map(|(clock, samples)| {
                ClockStatistics::from_samples(samples).map(|s| (clock.clone(), s))
            })
            .collect()
    }
}

/// Aggregate a whole batch of trial results at once.
pub fn aggregate(maps: &[ClockFrequencyMap]) -> BTreeMap<String, ClockStatistics> {
    let mut aggregator = StatisticsAggregator::new();
    for map in maps {
        aggregator.add(map);
    }
    aggregator.summarize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(entries: &[(&str, f64)]) -> ClockFrequencyMap {
        entries.iter().map(|(c, f)| (c.to_string(), *f)).collect()
    }

    #[test]
    fn odd_sample_statistics() {
        let stats = ClockStatistics::from_samples(&[110.0, 100.0, 105.0]).unwrap();
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 110.0);
        assert_eq!(stats.mean, 105.0);
        assert_eq!(stats.median, 105.0);
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn even_sample_median_averages_middle_pair() {
        let stats = ClockStatistics::from_samples(&[120.0, 100.0, 110.0, 105.0]).unwrap();
        assert_eq!(stats.median, 107.5);
        assert_eq!(stats.mean, 108.75);
    }

    #[test]
    fn empty_sample_has_no_statistics() {
        assert!(ClockStatistics::from_samples(&[]).is_none());
    }

    #[test]
    fn clocks_missing_from_some_trials_use_only_their_samples() {
        let maps = vec![
            trial(&[("clk", 100.0), ("pix", 50.0)]),
            trial(&[("clk", 110.0)]),
            trial(&[("clk", 105.0), ("pix", 54.0)]),
        ];
        let stats = aggregate(&maps);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats["clk"].samples, 3);
        assert_eq!(stats["pix"].samples, 2);
        assert_eq!(stats["pix"].median, 52.0);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = trial(&[("clk", 100.0)]);
        let b = trial(&[("clk", 120.0), ("aux", 30.0)]);
        let c = trial(&[("clk", 110.0)]);

        let forward = aggregate(&[a.clone(), b.clone(), c.clone()]);
        let backward = aggregate(&[c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.keys().collect::<Vec<_>>(), vec!["aux", "clk"]);
    }
}

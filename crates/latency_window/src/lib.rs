use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use core_types::{LatencySummary, Sample};

/// Insertion-ordered window of recent samples, bounded by a retention
/// horizon rather than a count. Owned by the scheduler loop; pruned once
/// per control tick against a `now` captured at tick time.
#[derive(Debug)]
pub struct SlidingWindow {
    retention: Duration,
    samples: VecDeque<Sample>,
}

impl SlidingWindow {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
    }

    /// Drop every sample with `received_at <= now - retention`.
    ///
    /// Samples arrive in monotonic order, so pruning from the front is
    /// equivalent to filtering the whole window.
    pub fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return;
        };
        while let Some(front) = self.samples.front() {
            if front.received_at <= cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn latencies(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.latency_secs).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Order statistics over a latency sequence: min, lower quartile, median,
/// upper quartile, max, mean. Returns `None` on empty input; the caller
/// treats that as "no traffic", not an error.
pub fn summarize(values: &[f64]) -> Option<LatencySummary> {
    if values.is_empty() {
        return None;
    }
    if values.len() == 1 {
        let v = values[0];
        return Some(LatencySummary {
            min: v,
            lower_quartile: v,
            median: v,
            upper_quartile: v,
            max: v,
            mean: v,
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;

    Some(LatencySummary {
        min: sorted[0],
        lower_quartile: median_of(&sorted[..n / 2]),
        median: median_of(&sorted),
        upper_quartile: median_of(&sorted[n / 2..]),
        max: sorted[n - 1],
        mean,
    })
}

/// Median of a sorted, non-empty slice.
fn median_of(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn summary_of_five_known_values() {
        let s = summarize(&[0.1, 0.2, 0.3, 0.4, 0.5]).expect("non-empty");
        assert!((s.min - 0.1).abs() < EPS);
        assert!((s.lower_quartile - 0.15).abs() < EPS);
        assert!((s.median - 0.3).abs() < EPS);
        assert!((s.upper_quartile - 0.4).abs() < EPS);
        assert!((s.max - 0.5).abs() < EPS);
        assert!((s.mean - 0.3).abs() < EPS);
    }

    #[test]
    fn summary_handles_even_length_and_unsorted_input() {
        let s = summarize(&[0.4, 0.1, 0.3, 0.2]).expect("non-empty");
        assert!((s.min - 0.1).abs() < EPS);
        assert!((s.lower_quartile - 0.15).abs() < EPS);
        assert!((s.median - 0.25).abs() < EPS);
        assert!((s.upper_quartile - 0.35).abs() < EPS);
        assert!((s.max - 0.4).abs() < EPS);
        assert!((s.mean - 0.25).abs() < EPS);
    }

    #[test]
    fn empty_input_is_no_data_not_an_error() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn singleton_input_repeats_the_value_six_times() {
        let s = summarize(&[0.7]).expect("non-empty");
        for v in [
            s.min,
            s.lower_quartile,
            s.median,
            s.upper_quartile,
            s.max,
            s.mean,
        ] {
            assert!((v - 0.7).abs() < EPS);
        }
    }

    #[test]
    fn order_statistics_are_monotonic() {
        let cases: [&[f64]; 4] = [
            &[0.5],
            &[3.0, 1.0, 2.0],
            &[0.9, 0.1, 0.4, 0.4, 0.7, 0.2],
            &[10.0, 0.0, 5.0, 5.0, 5.0, 1.0, 9.0, 2.0, 8.0],
        ];
        for values in cases {
            let s = summarize(values).expect("non-empty");
            assert!(s.min <= s.lower_quartile);
            assert!(s.lower_quartile <= s.median);
            assert!(s.median <= s.upper_quartile);
            assert!(s.upper_quartile <= s.max);
        }
    }

    #[test]
    fn retention_boundary_is_exact() {
        let retention = Duration::from_secs(5);
        let epsilon = Duration::from_millis(1);
        let base = Instant::now();

        let mut window = SlidingWindow::new(retention);
        window.push(Sample::new(base, 0.25));

        window.prune(base + retention - epsilon);
        assert_eq!(window.len(), 1);

        window.prune(base + retention + epsilon);
        assert!(window.is_empty());
    }

    #[test]
    fn prune_keeps_newer_samples() {
        let retention = Duration::from_secs(5);
        let base = Instant::now();

        let mut window = SlidingWindow::new(retention);
        window.push(Sample::new(base, 0.1));
        window.push(Sample::new(base + Duration::from_secs(3), 0.2));
        window.push(Sample::new(base + Duration::from_secs(6), 0.3));

        window.prune(base + Duration::from_secs(7));
        assert_eq!(window.latencies(), vec![0.2, 0.3]);
    }
}

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One decoded latency observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic arrival time, captured when the datagram was decoded.
    pub received_at: Instant,
    /// Observed latency in seconds. Non-negative and finite by construction;
    /// the decoder rejects everything else before a Sample exists.
    pub latency_secs: f64,
}

impl Sample {
    pub fn new(received_at: Instant, latency_secs: f64) -> Self {
        Self {
            received_at,
            latency_secs,
        }
    }
}

/// Six-number summary of the latencies currently in the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
    pub mean: f64,
}

/// Controller state owned exclusively by the scheduler loop.
#[derive(Debug, Clone, Copy)]
pub struct ControllerState {
    /// Admission probability. Invariant: in [0,1] after every control tick.
    pub probability: f64,
    /// Cumulative count of successfully decoded samples.
    pub total_requests: u64,
    /// Monotonic time of the most recent control tick.
    pub last_tick_at: Instant,
}

impl ControllerState {
    pub fn new(initial_probability: f64, now: Instant) -> Self {
        Self {
            probability: initial_probability.clamp(0.0, 1.0),
            total_requests: 0,
            last_tick_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_probability_is_clamped() {
        let now = Instant::now();
        assert_eq!(ControllerState::new(1.7, now).probability, 1.0);
        assert_eq!(ControllerState::new(-0.3, now).probability, 0.0);
        assert_eq!(ControllerState::new(0.5, now).probability, 0.5);
    }
}

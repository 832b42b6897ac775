use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlLawConfig {
    /// Target latency in seconds the controller aims to hold.
    pub setpoint_secs: f64,
    /// Offset subtracted from the setpoint to bias toward slightly
    /// better-than-target latency.
    pub safety_margin_secs: f64,
    /// Discrete-time pole. Closer to 1 = slower, more damped response.
    pub pole: f64,
    /// Hysteretic backoff when the observed metric exceeds the setpoint.
    pub backoff_step: f64,
    /// Hysteretic recovery when the observed metric is at or below it.
    pub recovery_step: f64,
}

impl Default for ControlLawConfig {
    fn default() -> Self {
        Self {
            setpoint_secs: 0.5,
            safety_margin_secs: 0.01,
            pole: 0.9,
            backoff_step: 0.1,
            recovery_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    RateFeedback,
    HystereticStep,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::RateFeedback => "rate-feedback",
            Self::HystereticStep => "hysteretic-step",
        };
        f.write_str(value)
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rate-feedback" => Ok(Self::RateFeedback),
            "hysteretic-step" => Ok(Self::HystereticStep),
            other => Err(format!(
                "unknown strategy '{other}' (expected rate-feedback or hysteretic-step)"
            )),
        }
    }
}

/// One admission-control update law. Adding a strategy means adding a
/// variant here; the scheduler only ever calls `next_probability`.
#[derive(Debug, Clone)]
pub struct ControlLaw {
    kind: StrategyKind,
    cfg: ControlLawConfig,
}

impl ControlLaw {
    pub fn new(kind: StrategyKind, cfg: ControlLawConfig) -> Self {
        Self { kind, cfg }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn cfg(&self) -> &ControlLawConfig {
        &self.cfg
    }

    /// Map (previous probability, observed metric) to the next admission
    /// probability. `observed_secs` is the maximum latency currently in
    /// the window. The result is saturated to [0,1] regardless of
    /// strategy.
    pub fn next_probability(&self, previous: f64, observed_secs: f64) -> f64 {
        let updated = match self.kind {
            StrategyKind::RateFeedback => rate_feedback(previous, observed_secs, &self.cfg),
            StrategyKind::HystereticStep => hysteretic_step(previous, observed_secs, &self.cfg),
        };
        updated.clamp(0.0, 1.0)
    }
}

/// Pole-placement feedback with a throughput-scaled step.
///
/// `observed / previous` is a rough estimate of the request rate the
/// system sustains at the current admission probability; the corrective
/// step shrinks in proportion so high-throughput systems move gently.
/// A non-positive probability or metric makes that estimate meaningless,
/// so the update degrades to a no-op instead of dividing by zero.
fn rate_feedback(previous: f64, observed_secs: f64, cfg: &ControlLawConfig) -> f64 {
    if previous <= 0.0 || observed_secs <= 0.0 {
        return previous;
    }
    let estimated_capacity = observed_secs / previous;
    let error = (cfg.setpoint_secs - cfg.safety_margin_secs) - observed_secs;
    previous + (1.0 / estimated_capacity) * (1.0 - cfg.pole) * error
}

/// Fast backoff, slow recovery.
fn hysteretic_step(previous: f64, observed_secs: f64, cfg: &ControlLawConfig) -> f64 {
    if observed_secs > cfg.setpoint_secs {
        previous - cfg.backoff_step
    } else {
        previous + cfg.recovery_step
    }
}

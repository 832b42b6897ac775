use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use control_law::ControlLaw;
use core_types::{ControllerState, LatencySummary, Sample};
use feed_telemetry::{decode_latency, MAX_DATAGRAM_BYTES};
use latency_window::{summarize, SlidingWindow};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};
use valve_publisher::ValvePublisher;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub control_interval: Duration,
    pub measure_interval: Duration,
}

#[derive(Debug)]
pub(crate) struct TickOutcome {
    pub(crate) summary: Option<LatencySummary>,
    pub(crate) throughput_rps: f64,
}

/// The reactive loop. Each iteration waits for the lesser of "next
/// datagram" and "time remaining until the control deadline", then runs
/// the control step once the deadline has passed. One datagram per pass:
/// receive readiness cannot starve the deadline because the sleep arm is
/// re-armed with the remaining time every iteration.
pub async fn run(
    cfg: SchedulerConfig,
    socket: UdpSocket,
    publisher: ValvePublisher,
    law: ControlLaw,
    initial_probability: f64,
) -> Result<()> {
    let mut state = ControllerState::new(initial_probability, Instant::now());
    let mut window = SlidingWindow::new(cfg.measure_interval);
    let mut malformed_total: u64 = 0;
    let mut buf = [0u8; MAX_DATAGRAM_BYTES];

    loop {
        let deadline = state.last_tick_at + cfg.control_interval;
        tokio::select! {
            recv = socket.recv_from(&mut buf) => {
                let (amt, _src) = recv.context("udp recv_from failed")?;
                ingest_datagram(&buf[..amt], &mut window, &mut state, &mut malformed_total);
            }
            _ = tokio::time::sleep_until(deadline.into()) => {}
        }

        let now = Instant::now();
        if now.duration_since(state.last_tick_at) >= cfg.control_interval {
            let outcome = control_tick(&mut state, &mut window, &law, now);
            match outcome.summary {
                Some(summary) => {
                    info!(
                        "{}",
                        format_status_line(
                            &summary,
                            outcome.throughput_rps,
                            state.probability,
                            state.total_requests,
                        )
                    );
                    if let Err(err) = publisher.publish(state.probability) {
                        error!(%err, "valve publish failed; downstream reads stay stale until the next tick");
                    }
                }
                None => info!("No traffic since last control interval."),
            }
        }
    }
}

pub(crate) fn ingest_datagram(
    payload: &[u8],
    window: &mut SlidingWindow,
    state: &mut ControllerState,
    malformed_total: &mut u64,
) {
    match decode_latency(payload) {
        Ok(latency_secs) => {
            window.push(Sample::new(Instant::now(), latency_secs));
            state.total_requests += 1;
        }
        Err(err) => {
            *malformed_total += 1;
            debug!(%err, "dropping malformed telemetry datagram");
            if *malformed_total % 100 == 0 {
                warn!(
                    count = *malformed_total,
                    "malformed telemetry datagrams so far"
                );
            }
        }
    }
}

/// One control step: prune the window against a `now` captured once,
/// summarize, apply the law on the window maximum, reset the deadline.
/// An empty window holds the probability.
pub(crate) fn control_tick(
    state: &mut ControllerState,
    window: &mut SlidingWindow,
    law: &ControlLaw,
    now: Instant,
) -> TickOutcome {
    let elapsed = now.duration_since(state.last_tick_at);
    window.prune(now);
    let latencies = window.latencies();
    let summary = summarize(&latencies);
    if let Some(summary) = &summary {
        state.probability = law.next_probability(state.probability, summary.max);
    }
    let throughput_rps = if elapsed.as_secs_f64() > 0.0 {
        latencies.len() as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    state.last_tick_at = now;
    TickOutcome {
        summary,
        throughput_rps,
    }
}

/// De-facto wire format for the offline tooling: field order and labels
/// are load-bearing, latencies in whole milliseconds, probability as a
/// percentage.
pub(crate) fn format_status_line(
    summary: &LatencySummary,
    throughput_rps: f64,
    probability: f64,
    total_requests: u64,
) -> String {
    format!(
        "latency={:.0}:{:.0}:{:.0}:{:.0}:{:.0}:({:.0})ms throughput={:.0}rps rr={:.2}% total={}",
        summary.min * 1000.0,
        summary.lower_quartile * 1000.0,
        summary.median * 1000.0,
        summary.upper_quartile * 1000.0,
        summary.max * 1000.0,
        summary.mean * 1000.0,
        throughput_rps,
        probability * 100.0,
        total_requests
    )
}

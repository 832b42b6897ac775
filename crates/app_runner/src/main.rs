use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use control_law::{ControlLaw, ControlLawConfig, StrategyKind};
use feed_telemetry::{bind_telemetry_socket, IngestConfig};
use valve_publisher::ValvePublisher;

use crate::scheduler::SchedulerConfig;

mod scheduler;

#[derive(Parser, Debug)]
#[command(name = "latvalve", about = "Closed-loop latency admission controller", version)]
struct Cli {
    /// UDP address the telemetry listener binds.
    #[arg(long, env = "LATVALVE_BIND_ADDR", default_value = "127.0.0.1:2712")]
    bind_addr: SocketAddr,
    #[arg(long, env = "LATVALVE_CONTROL_INTERVAL_MS", default_value_t = 1_000)]
    control_interval_ms: u64,
    #[arg(long, env = "LATVALVE_MEASURE_INTERVAL_MS", default_value_t = 5_000)]
    measure_interval_ms: u64,
    /// Target latency the controller holds, in seconds.
    #[arg(long, env = "LATVALVE_SETPOINT_SECS", default_value_t = 0.5)]
    setpoint_secs: f64,
    #[arg(long, env = "LATVALVE_SAFETY_MARGIN_SECS", default_value_t = 0.01)]
    safety_margin_secs: f64,
    #[arg(long, env = "LATVALVE_POLE", default_value_t = 0.9)]
    pole: f64,
    #[arg(long, env = "LATVALVE_BACKOFF_STEP", default_value_t = 0.1)]
    backoff_step: f64,
    #[arg(long, env = "LATVALVE_RECOVERY_STEP", default_value_t = 0.01)]
    recovery_step: f64,
    /// Control strategy: rate-feedback or hysteretic-step.
    #[arg(long, env = "LATVALVE_STRATEGY", default_value = "rate-feedback")]
    strategy: StrategyKind,
    /// Path of the published admission-probability artifact.
    #[arg(long, env = "LATVALVE_VALVE_PATH", default_value = "recommenderValve")]
    valve_path: PathBuf,
    #[arg(long, env = "LATVALVE_INITIAL_PROBABILITY", default_value_t = 0.5)]
    initial_probability: f64,
    /// Optional SO_RCVBUF override for the telemetry socket.
    #[arg(long, env = "LATVALVE_RECV_BUFFER_BYTES")]
    recv_buffer_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = observability::init_tracing("latvalve");

    let law = ControlLaw::new(
        cli.strategy,
        ControlLawConfig {
            setpoint_secs: cli.setpoint_secs.max(0.0),
            safety_margin_secs: cli.safety_margin_secs.max(0.0),
            pole: cli.pole.clamp(0.0, 0.999),
            backoff_step: cli.backoff_step.max(0.0),
            recovery_step: cli.recovery_step.max(0.0),
        },
    );
    let cfg = SchedulerConfig {
        control_interval: Duration::from_millis(cli.control_interval_ms.max(10)),
        measure_interval: Duration::from_millis(cli.measure_interval_ms.max(10)),
    };

    let socket = bind_telemetry_socket(&IngestConfig {
        bind_addr: cli.bind_addr,
        recv_buffer_bytes: cli.recv_buffer_bytes,
    })?;
    let publisher = ValvePublisher::new(cli.valve_path);

    tracing::info!(
        strategy = %law.kind(),
        valve = %publisher.path().display(),
        control_interval_ms = cfg.control_interval.as_millis() as u64,
        measure_interval_ms = cfg.measure_interval.as_millis() as u64,
        "admission controller starting"
    );

    scheduler::run(cfg, socket, publisher, law, cli.initial_probability).await
}

//! beatle-node: run one dispatcher node.
//!
//! Loads the project configuration, picks a leadership source and runs the
//! dispatch loop until SIGINT/SIGTERM.
//!
//! A node started without peers (or whose only peer is itself) dispatches
//! unconditionally. In a cluster, the external consensus agent writes the
//! current leader's node id to `--leader-file`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use beatle_core::config::load_dotenv;
use beatle_core::{BeatleConfig, LogFormat, LoggingConfig};
use beatle_scheduler::{DispatchLoop, FileLeaderGate, LeaderGate, StandaloneGate};

// ── CLI ─────────────────────────────────────────────────────────────

/// Leader-gated cron dispatcher node.
#[derive(Parser, Debug)]
#[command(name = "beatle-node", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "BEATLE_CONFIG", default_value = "beatle.toml")]
    conf: String,

    /// This node's id: `host:port`, or a bare port on 127.0.0.1.
    #[arg(long, env = "BEATLE_NODE", default_value = "8000")]
    node: String,

    /// Cluster members, same format as `--node`.
    #[arg(long, env = "BEATLE_CLUSTER", num_args = 0.., value_delimiter = ' ')]
    cluster: Vec<String>,

    /// File holding the current leader's node id (required with peers).
    #[arg(long, env = "BEATLE_LEADER_FILE")]
    leader_file: Option<String>,

    /// Seconds in-flight cycles may run after a shutdown signal.
    #[arg(long, env = "BEATLE_SHUTDOWN_GRACE", default_value_t = 5)]
    shutdown_grace: u64,
}

/// `8001` → `127.0.0.1:8001`; anything else is kept as is.
fn node_address(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("127.0.0.1:{raw}")
    } else {
        raw.to_string()
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn leader_gate(cli: &Cli, node: &str) -> anyhow::Result<Arc<dyn LeaderGate>> {
    let peers: Vec<String> = cli
        .cluster
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| node_address(p))
        .filter(|p| p != node)
        .collect();

    if peers.is_empty() {
        info!(node = %node, "no peers configured, running standalone");
        return Ok(Arc::new(StandaloneGate));
    }

    let path = cli
        .leader_file
        .as_deref()
        .context("--leader-file is required when --cluster lists other nodes")?;
    info!(node = %node, peers = ?peers, leader_file = %path, "running in cluster mode");
    Ok(Arc::new(FileLeaderGate::new(path)))
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = BeatleConfig::from_file(&cli.conf)
        .with_context(|| format!("failed to load config from {}", cli.conf))?;

    init_tracing(&config.logging);
    config.log_summary();

    let node = node_address(&cli.node);
    info!(node = %node, "starting beatle node");

    let gate = leader_gate(&cli, &node)?;
    let dispatcher = DispatchLoop::new(node, &config, gate)?
        .shutdown_grace(Duration::from_secs(cli.shutdown_grace));

    dispatcher.run(os_signal()).await;
    info!("beatle node exited cleanly");
    Ok(())
}

//! QuoteSlot daemon
//!
//! Usage:
//!   quoteslot                      - run with `<exe dir>/config/config.toml`
//!   quoteslot --config <path>      - run with another config file
//!   quoteslot --debug --turbo      - local outcomes, fast animation
//!
//! Spins are triggered by `spin` lines on stdin or the TCP trigger.

mod source;
mod trigger;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use qs_machine::{MachineConfig, MachineRuntime, OutcomeResolver};

use crate::source::ConfigSource;
use crate::trigger::TriggerContext;

/// Grace period for in-flight I/O once the machine has stopped
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "quoteslot", version, about = "QuoteSlot spin machine")]
struct Cli {
    /// Config file (created with defaults when missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve outcomes locally instead of asking the oracle
    #[arg(long)]
    debug: bool,

    /// Use the turbo timing profile
    #[arg(long)]
    turbo: bool,

    /// TCP trigger address, overriding `[trigger] listen`
    #[arg(short, long)]
    listen: Option<String>,

    /// Ignore commands on stdin
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run(cli));

    // the stdin reader parks a blocking thread that never returns on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<()> {
    let source = ConfigSource::new(cli.config.unwrap_or_else(MachineConfig::default_path))
        .with_force_local(cli.debug)
        .with_turbo(cli.turbo);
    let config = source
        .load()
        .with_context(|| format!("Failed to load {}", source.path().display()))?;

    log::info!(
        "[Daemon] Starting QuoteSlot ({:?} mode, {:?} timing, config {})",
        config.mode(),
        config.timing.profile,
        source.path().display()
    );

    let handle = MachineRuntime::from_config(&config, Arc::new(OutcomeResolver::new()))
        .with_pipeline(qs_io::pipeline_for(&config))
        .with_cues(qs_io::cue_bus_for(&config))
        .spawn()
        .context("Failed to start the machine")?;

    let context = TriggerContext::new(handle.clone(), source, config.trigger.clone());

    if let Some(addr) = cli.listen.or_else(|| config.trigger.listen.clone()) {
        trigger::listen_tcp(context.clone(), &addr)
            .await
            .with_context(|| format!("Failed to bind trigger on {}", addr))?;
    }
    if config.trigger.stdin && !cli.no_stdin {
        trigger::spawn_stdin(context);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    log::info!("[Daemon] Shutting down");
    handle.shutdown().await;
    Ok(())
}

//! Scan Engine (scanfirm-engine) - Main entry point
//!
//! Runs one scan session against a scripted camera and prints every bus
//! event as a JSON line, or confirms a single manually entered code with
//! `--manual`. The scripted camera stands in for platform capture, which
//! lives outside this crate; the scan pipeline it drives is the real one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanfirm_common::events::ScanEvent;
use scanfirm_common::EventBus;
use scanfirm_engine::config::{Config, ConfigOverrides, LoggingConfig};
use scanfirm_engine::scan::sim::{parse_script, ScriptStep, ScriptedCamera, ScriptedDecoder};
use scanfirm_engine::scan::{confirm_manual_entry, Decoder, ScanSession};

/// Script used when no --script file is given: two clean reads of the
/// same EAN-13 with empty frames between them
const DEMO_SCRIPT: &str = "\
# Demo: noise, then the same code twice
-
-
4006381333931
-
4006381333931
";

/// Command-line arguments for scanfirm-engine
#[derive(Parser, Debug)]
#[command(name = "scanfirm-engine")]
#[command(about = "Barcode confirmation engine for Scanfirm")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "scanfirm.toml", env = "SCANFIRM_CONFIG")]
    config: PathBuf,

    /// Frame script driving the simulated camera (one line per frame:
    /// a candidate read, or ``-`` for a frame with nothing in it)
    #[arg(short, long, env = "SCANFIRM_SCRIPT")]
    script: Option<PathBuf>,

    /// Skip the hardware-assisted backend and force the software fallback
    #[arg(long)]
    software_only: bool,

    /// Confirm one manually entered code and exit
    #[arg(short, long)]
    manual: Option<String>,

    /// Override window_size from the config file
    #[arg(long)]
    window_size: Option<usize>,

    /// Override min_consensus from the config file
    #[arg(long)]
    min_consensus: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        window_size: args.window_size,
        min_consensus: args.min_consensus,
    };
    let config = Config::load(&args.config, overrides)
        .await
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting Scanfirm Engine v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Scan parameters: {:?}", config.scan);

    let bus = EventBus::new(config.scan.event_capacity);

    if let Some(code) = args.manual {
        return run_manual(&bus, &code);
    }

    let steps = match &args.script {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read script {:?}", path))?;
            parse_script(&text)
        }
        None => parse_script(DEMO_SCRIPT),
    };
    info!("Driving simulated camera with {} scripted frames", steps.len());

    run_session(steps, &config, args.software_only, bus).await
}

/// Initialize tracing from the logging config
///
/// RUST_LOG takes priority over the configured level. With a log file
/// configured, output goes there instead of stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "scanfirm_engine={level},scanfirm_common={level}",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

/// Manual entry path: no session, no camera, format gate only
fn run_manual(bus: &EventBus, code: &str) -> Result<()> {
    let mut rx = bus.subscribe();
    confirm_manual_entry(bus, code).context("Manual entry rejected")?;

    if let Ok(event) = rx.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

/// Run one scan session over the scripted frames, printing bus events
/// until the session ends or the process is signalled
async fn run_session(
    steps: Vec<ScriptStep>,
    config: &Config,
    software_only: bool,
    bus: EventBus,
) -> Result<()> {
    let mut rx = bus.subscribe();

    // Roughly a 30 fps camera; the feed closes when the script runs out
    let camera = ScriptedCamera::closing_after(steps, Duration::from_millis(33));
    let hardware: Box<dyn Decoder> = if software_only {
        Box::new(ScriptedDecoder::unavailable())
    } else {
        Box::new(ScriptedDecoder::available())
    };

    let session = ScanSession::start(
        &camera,
        hardware,
        Box::new(ScriptedDecoder::available()),
        config.scan.clone(),
        bus.clone(),
    )
    .await
    .context("Failed to start scan session")?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = rx.recv() => match event {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if matches!(
                        event,
                        ScanEvent::CodeConfirmed { .. } | ScanEvent::SessionError { .. }
                    ) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event consumer lagged, {} events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.stop().await;
    info!("Engine shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

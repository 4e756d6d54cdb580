//! `seatwatch-worker` binary.
//!
//! ```text
//! seatwatch-worker run --store gangnam [--channels 1,2,3]
//! ```
//!
//! Exit codes: `0` clean shutdown, `1` some requested channel could not be
//! configured, `2` startup failure.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use seatwatch_core::store::StateStore;
use seatwatch_core::types::ChannelId;
use seatwatch_db::PgStateStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seatwatch_worker::config::MonitorConfig;
use seatwatch_worker::detector::HttpDetector;
use seatwatch_worker::source::FfmpegFrameSource;
use seatwatch_worker::supervisor::Supervisor;
use seatwatch_worker::worker::WorkerDeps;

const STARTUP_FAILURE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "seatwatch-worker", version, about = "Zone occupancy monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor the channels of one store until interrupted.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Store to monitor.
    #[arg(long, env = "STORE_ID")]
    store: String,

    /// Comma-separated channel numbers; defaults to every active channel
    /// that has zones.
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<ChannelId>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(%error, "Startup failed");
            ExitCode::from(STARTUP_FAILURE)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "seatwatch_worker=info,seatwatch_db=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(args: RunArgs) -> anyhow::Result<u8> {
    // --- Configuration ---
    let config = MonitorConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        store_id = %args.store,
        interval_secs = config.engine.interval_secs,
        detector = %config.detector.url,
        "Loaded monitor configuration"
    );

    // --- Database ---
    let pool = seatwatch_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    seatwatch_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    seatwatch_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Collaborators ---
    let worker_config = config.worker();
    let store: Arc<dyn StateStore> = Arc::new(PgStateStore::new(pool));
    let deps = WorkerDeps {
        store,
        source: Arc::new(FfmpegFrameSource::new(
            config.ffmpeg.clone(),
            worker_config.sampling_interval(),
        )),
        detector: Arc::new(
            HttpDetector::new(&config.detector).context("Failed to build detector client")?,
        ),
    };

    // --- Workers ---
    let mut supervisor = Supervisor::new(
        deps,
        worker_config,
        config.rtsp.clone(),
        config.supervisor.clone(),
    );
    let started = tokio::select! {
        started = supervisor.start(&args.store, args.channels.as_deref()) => Some(started),
        _ = shutdown_signal() => None,
    };
    match started {
        Some(started) => {
            let started = started.context("Failed to start monitoring")?;
            tracing::info!(channels = ?started, "Monitoring started");
        }
        None => {
            tracing::info!("Shutdown requested during startup");
            supervisor.stop().await;
            return Ok(supervisor.report().exit_code());
        }
    }

    let report = supervisor.wait(shutdown_signal()).await;
    for (channel_id, outcome) in &report.outcomes {
        tracing::info!(channel_id, ?outcome, "Channel finished");
    }
    Ok(report.exit_code())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

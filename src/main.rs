use clap::{Parser, Subcommand};
use ridesync::{Config, DrainOutcome, OfflineRuntime};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ridesync")]
#[command(about = "Offline queue, location buffer and sync engine for the ride app", long_about = None)]
struct Args {
    /// Directory holding ridesync.toml and an optional .env
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print health and sync state as JSON
    Status,

    /// Probe the backend and drain pending actions once
    Drain,

    /// Inspect the persisted location buffer
    Locations {
        #[command(subcommand)]
        action: LocationsCommand,
    },

    /// Keep probing connectivity and draining until interrupted
    Run,
}

#[derive(Subcommand, Debug)]
enum LocationsCommand {
    /// Print buffered samples as JSON
    Dump,
    /// Drop every buffered sample
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridesync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(&args.config_dir)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let mut runtime = OfflineRuntime::open(config)?;

    match args.command {
        Command::Status => {
            let report = runtime.health_report().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Drain => match runtime.drain_once().await {
            DrainOutcome::Completed(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            DrainOutcome::AlreadySyncing => println!("A drain is already running"),
            DrainOutcome::Offline => {
                let pending = runtime.sync_engine().queue().len().await;
                println!("Backend unreachable, {} actions still pending", pending);
            }
        },
        Command::Locations { action } => match action {
            LocationsCommand::Dump => {
                let samples = runtime.locations().read_all().await;
                println!("{}", serde_json::to_string_pretty(&samples)?);
            }
            LocationsCommand::Clear => {
                let dropped = runtime.locations().len().await;
                if runtime.locations().clear().await {
                    println!("Cleared {} buffered samples", dropped);
                } else {
                    anyhow::bail!("Failed to clear the location buffer");
                }
            }
        },
        Command::Run => {
            let online = runtime.start().await;
            tracing::info!(
                "Runtime started ({}), probing every {:?}",
                if online { "online" } else { "offline" },
                runtime.probe_interval()
            );
            shutdown_signal().await;
        }
    }

    runtime.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

//! unistate: per-connection tagged message router over WebSocket
//!
//! Every browser (or other client) that connects to `/ws` gets its own
//! router with its own state. Messages are JSON objects with a `tag` naming
//! the operation to run; replies are independent tagged messages.
//!
//! Usage:
//!   unistate                                # 0.0.0.0:8001
//!   unistate --port 9000 --hostname 127.0.0.1
//!   unistate --notify-unknown               # report unknown tags to clients
//!   unistate --log-file                     # log to ~/.unistate/logs/unistate.log

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use unistate_router::{OperationRegistry, RouterConfig, RouterService, UnknownTagPolicy};
use unistate_transport::{TransportConfig, TransportServer};

#[derive(Parser, Debug)]
#[command(name = "unistate", about = "unistate: per-connection tagged message router")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8001")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "0.0.0.0")]
    hostname: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// Send an error message to the client when a tag matches no operation
    #[arg(long)]
    notify_unknown: bool,

    /// Allow cross-origin requests
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.unistate/logs/unistate.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn resolve_log_path(arg: &str) -> PathBuf {
    if arg == "DEFAULT" {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".unistate/logs/unistate.log")
    } else {
        PathBuf::from(arg)
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_file_arg) = cli.log_file {
        let log_path = resolve_log_path(log_file_arg);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let registry = OperationRegistry::with_builtins();
    info!("Operations: {}", registry.tags().join(", "));

    let router_config = RouterConfig {
        unknown_tags: if cli.notify_unknown {
            UnknownTagPolicy::Notify
        } else {
            UnknownTagPolicy::Silent
        },
    };
    let service = RouterService::new(registry, router_config);

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        enable_cors: cli.cors,
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };

    let mut transport = match TransportServer::start(transport_config, service).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    info!("Serving ws://{}/ws (Ctrl+C to stop)", transport.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down...");
    transport.stop().await;
    Ok(())
}

//! Palisade Agent CLI Entry Point
//!
//! This is the main entry point for the Palisade Agent binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use palisade_agent::agent::supervisor::AgentSupervisor;
use palisade_agent::cli::config::Config;

#[derive(Parser)]
#[command(name = "palisade-agent")]
#[command(author, version, about = "Palisade Agent - Host agent for the Palisade control plane")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "agent_config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Write a template configuration file
    Init,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Start { foreground } => {
            start_agent(&cli.config, foreground).await?;
        }
        Commands::Init => {
            init_config(&cli.config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

async fn start_agent(config_path: &PathBuf, foreground: bool) -> Result<()> {
    info!("Starting Palisade Agent...");

    // Load configuration; failure here is fatal and exits non-zero
    let config = Config::load(config_path)?;
    info!(
        agent_name = %config.agent_name,
        server_url = %config.server_url,
        "Configuration loaded"
    );

    if !foreground {
        info!("Running in foreground mode (daemon mode not yet implemented)");
    }

    let supervisor = Arc::new(AgentSupervisor::new(Arc::new(config))?);

    // SIGINT raises the shared cancellation signal; cancellation is
    // idempotent so repeated signals are harmless
    let ctrl_c_supervisor = supervisor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, initiating graceful shutdown");
            ctrl_c_supervisor.stop();
        }
    });

    #[cfg(unix)]
    {
        let sigterm_supervisor = supervisor.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("SIGTERM received, initiating graceful shutdown");
                    sigterm_supervisor.stop();
                }
                Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
            }
        });
    }

    supervisor.run().await
}

fn init_config(path: &PathBuf) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Refusing to overwrite existing config at {}", path.display());
    }

    Config::template().save(path)?;
    println!("Template configuration written to {}", path.display());
    println!("Edit the file and replace the CHANGE_ME values before starting the agent.");
    Ok(())
}

fn show_version() {
    println!("palisade-agent {}", env!("CARGO_PKG_VERSION"));
    println!("Host agent for the Palisade control plane");
    println!();
    println!("Features:");
    println!("  - HMAC-signed control plane communication");
    println!("  - Heartbeat and job polling");
    println!("  - Integrity-verified self-update with rollback");
}

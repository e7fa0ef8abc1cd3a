//! Rust IRC Client - Main binary

use clap::{Parser, Subcommand};
use rustirc_core::{commands, Client};
use rustirc_modules::{simple_client, BotConfig};
use std::path::PathBuf;
use tracing::{info, warn};

/// Rust IRC Client - A modular IRC client engine
#[derive(Parser)]
#[command(name = "rustirc")]
#[command(about = "A modular IRC client (bot) implementation in Rust")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "rustirc.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Check configuration and exit
    #[arg(long)]
    check: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "rustirc.toml")]
        output: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::Config { output } => {
                generate_config(&output)?;
                return Ok(());
            }
            Commands::Version => {
                show_version();
                return Ok(());
            }
        }
    }

    // Load configuration
    let config = if cli.config.exists() {
        info!("Loading configuration from {:?}", cli.config);
        BotConfig::from_file(&cli.config)?
    } else {
        info!("Configuration file not found, using defaults");
        BotConfig::default()
    };

    config.validate()?;
    if cli.check {
        info!("Configuration is valid");
        return Ok(());
    }

    let client = simple_client(&config)?;
    info!(
        "Starting Rust IRC Client as {} on {}:{}",
        config.identity.nick, config.client.connection.host, config.client.connection.port
    );
    client.start().await;

    run_until_done(&client).await;
    Ok(())
}

/// Wait for the client to finish; the first Ctrl-C quits gracefully, the
/// second shuts down immediately
async fn run_until_done(client: &Client) {
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = client.join() => break,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Unable to listen for Ctrl-C: {}", e);
                    client.join().await;
                    break;
                }
                if interrupted {
                    info!("Interrupted again, shutting down");
                    client.shutdown();
                } else {
                    info!("Interrupted, sending QUIT (Ctrl-C again to force)");
                    interrupted = true;
                    match commands::quit("Keyboard interrupt.") {
                        Ok(quit) => client.send(quit),
                        Err(_) => client.shutdown(),
                    }
                }
            }
        }
    }
}

/// Initialize logging
fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &PathBuf) -> anyhow::Result<()> {
    let config = BotConfig::default();
    config.to_file(output)?;
    println!("Generated default configuration file: {:?}", output);
    Ok(())
}

/// Show version information
fn show_version() {
    println!("rustirc {}", env!("CARGO_PKG_VERSION"));
}

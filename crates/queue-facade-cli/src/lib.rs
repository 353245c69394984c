//! # Queue Facade CLI
//!
//! Command-line interface for exercising the queue facade against the
//! in-memory provider.
//!
//! This module provides CLI commands for:
//! - Sending demo messages and reporting their delivery
//! - Validating and printing the resolved configuration

use clap::{Parser, Subcommand};
use queue_facade::providers::{InMemoryBroker, InMemoryNamespaceManager};
use queue_facade::{
    ConfigurationError, FacadeConfig, JsonSerializationProvider, QueueClient, QueueError,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue Facade CLI - typed queue client playground
#[derive(Parser)]
#[command(name = "queue-facade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send and receive typed messages through the queue facade")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_FACADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overrides the configured level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Send demo messages through an in-memory queue and wait for delivery
    Send {
        /// Number of messages to send
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Delay delivery by this many seconds
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        schedule_secs: i64,

        /// Payload text carried by every message
        #[arg(short, long, default_value = "hello")]
        payload: String,

        /// Milliseconds to wait for delivery beyond the schedule
        #[arg(long, default_value = "2000")]
        timeout_ms: u64,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration(_) => 1,
            CliError::Queue(_) => 2,
            CliError::CommandFailed { .. } => 3,
            CliError::InvalidArgument { .. } => 4,
        }
    }
}

// ============================================================================
// Demo Entity
// ============================================================================

/// Entity carried by the `send` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoMessage {
    pub sequence: u32,
    pub payload: String,
    pub sent_at: Timestamp,
}

/// Outcome of the `send` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub sent: u32,
    pub delivered: u32,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_ref())?;
    initialize_logging(&cli, &config)?;
    info!(queue = %config.queue_name, "Configuration loaded");

    match cli.command {
        Commands::Send {
            count,
            schedule_secs,
            payload,
            timeout_ms,
        } => {
            let report = execute_send_command(
                &config,
                count,
                schedule_secs,
                &payload,
                Duration::from_millis(timeout_ms),
            )
            .await?;
            println!("Sent {} message(s), delivered {}", report.sent, report.delivered);
            Ok(())
        }
        Commands::Config { show, format } => {
            if show {
                println!("{}", render_config(&config, &format)?);
            } else {
                println!("Configuration is valid");
            }
            Ok(())
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging from CLI flags, falling back to configuration
fn initialize_logging(cli: &Cli, config: &FacadeConfig) -> Result<(), CliError> {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if cli.json_logs || config.logging.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("failed to initialize logging: {}", e),
    })
}

/// Load configuration from file, environment and defaults
pub fn load_configuration(config_path: Option<&PathBuf>) -> Result<FacadeConfig, CliError> {
    Ok(FacadeConfig::load(config_path.map(PathBuf::as_path))?)
}

/// Send `count` messages through an in-memory queue and wait until all of
/// them have been delivered to the registered callback
pub async fn execute_send_command(
    config: &FacadeConfig,
    count: u32,
    schedule_secs: i64,
    payload: &str,
    timeout: Duration,
) -> Result<SendReport, CliError> {
    if count == 0 {
        return Err(CliError::InvalidArgument {
            arg: "count".to_string(),
            message: "must send at least one message".to_string(),
        });
    }

    let broker = InMemoryBroker::new(config.in_memory.clone());
    let manager = InMemoryNamespaceManager::new(broker, config.queue_name()?);
    let client = QueueClient::<DemoMessage, _, _>::new(
        manager,
        JsonSerializationProvider,
        config.extensions(),
    );

    let delivered = Arc::new(AtomicU32::new(0));
    let all_delivered = Arc::new(Notify::new());
    let counter = Arc::clone(&delivered);
    let done = Arc::clone(&all_delivered);
    let subscription = client.register_callback(move |message: &DemoMessage| {
        if message.payload.is_empty() {
            anyhow::bail!("message {} carries no payload", message.sequence);
        }
        println!(
            "Received #{} '{}' (sent {})",
            message.sequence, message.payload, message.sent_at
        );
        if counter.fetch_add(1, Ordering::SeqCst) + 1 == count {
            done.notify_one();
        }
        Ok(())
    });
    subscription.wait().await?;

    let schedule = chrono::Duration::seconds(schedule_secs);
    for sequence in 1..=count {
        let message = DemoMessage {
            sequence,
            payload: payload.to_string(),
            sent_at: Timestamp::now(),
        };
        if let Err(e) = client.send(&message, schedule).await {
            client.dispose().await?;
            return Err(e.into());
        }
    }

    let deadline = Duration::from_secs(schedule_secs.max(0).unsigned_abs()) + timeout;
    if tokio::time::timeout(deadline, all_delivered.notified())
        .await
        .is_err()
    {
        warn!(
            expected = count,
            delivered = delivered.load(Ordering::SeqCst),
            "Timed out waiting for delivery"
        );
    }

    client.dispose().await?;

    let report = SendReport {
        sent: count,
        delivered: delivered.load(Ordering::SeqCst),
    };
    if report.delivered < report.sent {
        error!(sent = report.sent, delivered = report.delivered, "Messages were lost");
        return Err(CliError::CommandFailed {
            message: format!(
                "only {} of {} messages were delivered",
                report.delivered, report.sent
            ),
        });
    }

    info!(sent = report.sent, "All messages delivered");
    Ok(report)
}

/// Render the resolved configuration
pub fn render_config(config: &FacadeConfig, format: &ConfigFormat) -> Result<String, CliError> {
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
    };

    rendered.map_err(|message| CliError::CommandFailed { message })
}

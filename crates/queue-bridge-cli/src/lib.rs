//! # Queue-Bridge CLI
//!
//! Command-line interface for the queue bridge.
//!
//! This module provides CLI commands for:
//! - Sending a single event to the configured queue
//! - Consuming the queue with the log-only handler
//! - Forwarding consumed events to a topic
//! - Validating and printing the resolved configuration

use clap::{Parser, Subcommand};
use queue_bridge_core::{
    BridgeConfig, ConsumptionLoop, DeadLetterSink, Event, EventHandler, EventProducer,
    LogOnlyHandler, LoggingConfig, LoggingDeadLetterSink, ProducerError, ProviderKind,
    QueueDeadLetterSink, TopicForwarder,
};
use queue_bridge_runtime::{
    AwsAuthConfig, InMemoryTopic, InMemoryTransport, QueueTransport, SnsPublisher, SqsTransport,
    TopicPublisher, TransportError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// System-wide configuration file, extension chosen by the `config` crate
pub const SYSTEM_CONFIG_FILE: &str = "/etc/queue-bridge/bridge";

/// Deployment-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "config/bridge";

/// Prefix for configuration environment variables, e.g. `QB__QUEUE__URL`
pub const ENV_PREFIX: &str = "QB";

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue-Bridge CLI - queue producer, consumer and topic forwarder
#[derive(Parser)]
#[command(name = "queue-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send, consume and forward events through a message queue")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overrides `logging.level`
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
    /// Send one event to the queue
    Send {
        /// Event identifier, also used as the routing key
        #[arg(long)]
        id: String,

        /// Event payload as JSON
        #[arg(long, default_value = "null")]
        data: String,
    },

    /// Consume the queue, logging each event, until interrupted
    Consume,

    /// Consume the queue and forward each event to the configured topic
    Forward,

    /// Validate configuration
    Config {
        /// Print the resolved configuration as JSON
        #[arg(short, long)]
        show: bool,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Send failed: {0}")]
    Producer(#[from] ProducerError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0}")]
    Invalid(#[from] queue_bridge_core::ConfigError),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Logging settings come from the configuration, so load it first and
    // report a broken configuration after logging is up
    let config = load_configuration(cli.config.as_deref());
    let logging = match &config {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    initialize_logging(&cli, &logging)?;
    let config = config?;

    match cli.command {
        Commands::Send { id, data } => execute_send_command(&config, id, &data).await,
        Commands::Consume => execute_consume_command(&config).await,
        Commands::Forward => execute_forward_command(&config).await,
        Commands::Config { show } => execute_config_command(&config, show),
    }
}

/// Initialize logging: `RUST_LOG` wins, then `--log-level`, then `logging.level`
pub fn initialize_logging(cli: &Cli, logging: &LoggingConfig) -> Result<(), CliError> {
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
            CliError::InvalidArgument {
                arg: "log-level".to_string(),
                message: e.to_string(),
            }
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs || logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("failed to initialize logging: {}", e),
    })
}

/// Load configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/queue-bridge/bridge.{toml,json,yaml}` (optional)
///  2. `./config/bridge.{toml,json,yaml}` (optional)
///  3. The explicit `path` (required when given)
///  4. Environment variables prefixed `QB__`, e.g. `QB__QUEUE__URL`
pub fn load_configuration(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name(SYSTEM_CONFIG_FILE).required(false))
        .add_source(config::File::with_name(LOCAL_CONFIG_FILE).required(false));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config: BridgeConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

// ============================================================================
// Transport Construction
// ============================================================================

fn build_queue(config: &BridgeConfig) -> Result<Arc<dyn QueueTransport>, CliError> {
    match config.provider {
        ProviderKind::Sqs => Ok(Arc::new(SqsTransport::new(config.queue.to_sqs_config())?)),
        ProviderKind::Memory => {
            warn!("In-memory provider: messages exist only for the life of this process");
            Ok(Arc::new(InMemoryTransport::new(config.memory.clone())))
        }
    }
}

fn build_topic(config: &BridgeConfig) -> Result<Arc<dyn TopicPublisher>, CliError> {
    let topic = config.topic.as_ref().ok_or_else(|| {
        ConfigError::Invalid(queue_bridge_core::ConfigError::MissingRequired {
            key: "topic.arn".to_string(),
        })
    })?;

    match config.provider {
        ProviderKind::Sqs => Ok(Arc::new(SnsPublisher::new(
            topic.to_sns_config(&config.queue),
        )?)),
        ProviderKind::Memory => Ok(Arc::new(InMemoryTopic::new())),
    }
}

/// Queue that receives dead letters, if any. The in-memory provider has no
/// queue another process could read, so its dead letters are only logged.
fn dead_letter_queue_url(config: &BridgeConfig) -> Option<&str> {
    match config.provider {
        ProviderKind::Sqs => config.dead_letter.queue_url.as_deref(),
        ProviderKind::Memory => {
            if config.dead_letter.queue_url.is_some() {
                warn!("dead_letter.queue_url is ignored by the in-memory provider");
            }
            None
        }
    }
}

fn build_dead_letter_sink(config: &BridgeConfig) -> Result<Arc<dyn DeadLetterSink>, CliError> {
    match dead_letter_queue_url(config) {
        Some(queue_url) => {
            let transport = SqsTransport::new(config.queue.sqs_config_for(queue_url))?;
            Ok(Arc::new(QueueDeadLetterSink::new(Arc::new(transport))))
        }
        None => Ok(Arc::new(LoggingDeadLetterSink)),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Parse the `--data` argument of `send`
pub fn parse_event(id: String, data: &str) -> Result<Event, CliError> {
    let data = serde_json::from_str(data).map_err(|e| CliError::InvalidArgument {
        arg: "data".to_string(),
        message: e.to_string(),
    })?;
    Ok(Event::new(id, data))
}

async fn execute_send_command(config: &BridgeConfig, id: String, data: &str) -> Result<(), CliError> {
    let event = parse_event(id, data)?;
    let producer = EventProducer::new(build_queue(config)?);

    let message_id = producer.send(&event).await?;
    println!("{}", message_id);
    Ok(())
}

async fn execute_consume_command(config: &BridgeConfig) -> Result<(), CliError> {
    run_consumer(config, Arc::new(LogOnlyHandler)).await
}

async fn execute_forward_command(config: &BridgeConfig) -> Result<(), CliError> {
    config
        .validate_for_forwarding()
        .map_err(ConfigError::Invalid)?;
    let forwarder = TopicForwarder::new(build_topic(config)?);
    run_consumer(config, Arc::new(forwarder)).await
}

async fn run_consumer(config: &BridgeConfig, handler: Arc<dyn EventHandler>) -> Result<(), CliError> {
    let consumer = ConsumptionLoop::new(
        build_queue(config)?,
        handler,
        build_dead_letter_sink(config)?,
        config.consumer.clone(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    info!(queue = %config.queue.url, "Starting consumer");
    let stats = consumer.run(cancel).await;
    info!(
        received = stats.received,
        succeeded = stats.succeeded,
        dead_lettered = stats.dead_lettered,
        "Consumer stopped"
    );
    Ok(())
}

fn execute_config_command(config: &BridgeConfig, show: bool) -> Result<(), CliError> {
    if show {
        let rendered = serde_json::to_string_pretty(&redacted(config)).map_err(|e| {
            CliError::CommandFailed {
                message: e.to_string(),
            }
        })?;
        println!("{}", rendered);
    } else {
        println!("Configuration is valid");
    }
    Ok(())
}

/// Copy of `config` safe to print: secrets replaced, key ids kept
pub fn redacted(config: &BridgeConfig) -> BridgeConfig {
    let mut config = config.clone();
    redact_credentials(&mut config.queue.credentials);
    if let Some(credentials) = config
        .topic
        .as_mut()
        .and_then(|topic| topic.credentials.as_mut())
    {
        redact_credentials(credentials);
    }
    config
}

fn redact_credentials(credentials: &mut AwsAuthConfig) {
    for secret in [
        &mut credentials.secret_access_key,
        &mut credentials.session_token,
    ] {
        if secret.is_some() {
            *secret = Some("<redacted>".to_string());
        }
    }
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C signal handler");
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
                warn!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), finishing in-flight messages"),
        _ = terminate => info!("Received SIGTERM, finishing in-flight messages"),
    }
    token.cancel();
}

//! CLI entry point for pubsub-relay

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use pubsub_relay_broker::connect;
use pubsub_relay_channels::PublishGateway;
use pubsub_relay_core::config::{validate_run_config, Config, ConfigLoader, RunMode, DEFAULT_PORT};
use pubsub_relay_core::logging::init_logging;
use pubsub_relay_manager::{HttpServer, Orchestrator, Outcome};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Parser)]
#[command(name = "pubsub-relay")]
#[command(about = "Relay messages between a Pub/Sub topic and HTTP clients")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment file loaded before the configuration (default: .env)
    #[arg(short, long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay
    Run {
        /// Ingestion mode (legacy, pull, push, both)
        #[arg(short, long)]
        mode: Option<RunMode>,
        /// HTTP port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Publish a single message to the configured topic
    Publish {
        /// Message to publish
        #[arg(short, long)]
        message: String,
    },
    /// Show the resolved configuration
    Status,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Outcome of loading the environment file
enum EnvFile {
    Loaded(PathBuf),
    MissingDefault,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };

    if let Commands::Init { force } = cli.command {
        init_fallback_logging();
        if let Err(e) = run_init(&loader, force) {
            error!("{:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let env_file = match load_env_file(cli.env_file.as_deref()) {
        Ok(env_file) => env_file,
        Err(e) => fatal_before_logging(e),
    };
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => fatal_before_logging(anyhow::Error::new(e).context("failed to load configuration")),
    };

    let guard = init_logging(&config.logging);
    match env_file {
        EnvFile::Loaded(path) => info!("Loaded environment from {}", path.display()),
        EnvFile::MissingDefault => warn!("No {} file found, using process environment", DEFAULT_ENV_FILE),
    }

    let result = match cli.command {
        Commands::Run { mode, port } => run_relay(config, mode, port).await,
        Commands::Publish { message } => run_publish(&config, message).await,
        Commands::Status => run_status(&loader, &config),
        Commands::Init { .. } => Ok(()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        drop(guard);
        std::process::exit(1);
    }
}

/// Stderr-only logging for failures that happen before the configuration is known
fn init_fallback_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}

fn fatal_before_logging(e: anyhow::Error) -> ! {
    init_fallback_logging();
    error!("{:#}", e);
    std::process::exit(1);
}

/// Load variables from the environment file into the process environment
///
/// A missing default file is tolerated; a missing explicit file is not.
fn load_env_file(explicit: Option<&Path>) -> Result<EnvFile> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_ENV_FILE));
    if explicit.is_none() && !path.exists() {
        return Ok(EnvFile::MissingDefault);
    }

    dotenv::from_path(path)
        .with_context(|| format!("Loading env error: {}", path.display()))?;
    Ok(EnvFile::Loaded(path.to_path_buf()))
}

async fn run_relay(mut config: Config, mode: Option<RunMode>, port: Option<u16>) -> Result<()> {
    if let Some(mode) = mode {
        config.ingest.mode = mode;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    validate_run_config(&config).context("invalid configuration")?;

    let port_from_env = std::env::var("SERVER_PORT")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if port.is_none() && !port_from_env && config.server.port == DEFAULT_PORT {
        info!("Defaulting to port {}", DEFAULT_PORT);
    }

    let client = connect(&config.pubsub).context("failed to create broker client")?;
    let server = HttpServer::new(config.server.bind_addr());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let outcome = Orchestrator::new(config, client, server)
        .with_shutdown(shutdown)
        .run()
        .await?;

    match outcome {
        Outcome::PullCompleted(report) => {
            info!("Pull run finished after {} messages", report.received)
        }
        Outcome::Served => info!("Server stopped"),
    }
    Ok(())
}

async fn run_publish(config: &Config, message: String) -> Result<()> {
    let client = connect(&config.pubsub).context("failed to create broker client")?;
    let gateway = PublishGateway::new(client.topic(config.pubsub.topic.clone()));
    let id = gateway.publish(message).await?;

    println!(
        "{} message {} to {}",
        style("Published").green(),
        id,
        gateway.topic_name()
    );
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) -> Result<()> {
    println!("{}", style("pubsub-relay status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Environment: {}", config.environment);
    println!();

    println!("{}", style("Broker:").bold());
    println!("  Project: {}", config.pubsub.project_id);
    println!("  Topic: {}", config.pubsub.topic);
    let subscription = if config.pubsub.subscription.is_empty() {
        style("not configured".to_string()).dim()
    } else {
        style(config.pubsub.subscription.clone())
    };
    println!("  Subscription: {}", subscription);
    println!("  Backend: {:?}", config.pubsub.backend);
    println!("  Endpoint: {}", config.pubsub.base_url());
    let token = if config.pubsub.access_token.is_some() {
        style("configured").green()
    } else {
        style("not configured").dim()
    };
    println!("  Access token: {}", token);
    println!();

    println!("{}", style("Ingestion:").bold());
    println!("  Mode: {}", config.ingest.mode);
    println!("  Log capacity: {}", config.ingest.log_capacity);
    println!("  Listen address: {}", config.server.bind_addr());

    Ok(())
}

fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let config_path = loader.config_dir().join("config.json");
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    loader
        .save(&Config::default())
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    println!(
        "{} {}",
        style("Wrote default configuration to").green(),
        config_path.display()
    );
    println!("Set pubsub.project_id and pubsub.topic before running the relay.");
    Ok(())
}

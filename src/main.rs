// Container Stats Exporter - Prometheus exporter for Docker containers
//
// Serves per-container resource metrics (memory, CPU, network, block I/O,
// processes, lifecycle state) and daemon-level counts over HTTP. Metrics are
// collected on demand, one collection cycle per scrape.
//
// # Usage
// container-stats-exporter [--config <file>] [--server.port <port>] ...
//
// Example:
// container-stats-exporter --config /etc/exporter/config.yaml --logging.level debug

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use container_stats_exporter::cache::StatsCache;
use container_stats_exporter::collector::{ContainerCollector, Registry, SystemCollector};
use container_stats_exporter::config::{ExporterConfig, LoggingConfig};
use container_stats_exporter::filter::Filter;
use container_stats_exporter::metrics::MetricCatalog;
use container_stats_exporter::runtime::docker::DockerClient;
use container_stats_exporter::runtime::RuntimeClient;
use container_stats_exporter::server::{self, AppState};

/// Command-line flags. Each one overrides the matching config key.
#[derive(Parser, Debug)]
#[command(name = "container-stats-exporter")]
#[command(version, about = "Prometheus exporter for Docker container stats", long_about = None)]
struct Args {
    /// Config file (YAML, TOML or JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// HTTP port
    #[arg(long = "server.port")]
    server_port: Option<String>,

    /// HTTP bind address
    #[arg(long = "server.address")]
    server_address: Option<String>,

    /// Docker daemon endpoint (unix://, tcp:// or http://)
    #[arg(long = "docker.host")]
    docker_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "logging.level")]
    logging_level: Option<String>,

    /// Log format (json, text)
    #[arg(long = "logging.format")]
    logging_format: Option<String>,
}

impl Args {
    /// Flags that were given, as `(config key, value)` pairs.
    fn overrides(&self) -> Vec<(&'static str, String)> {
        [
            ("server.port", &self.server_port),
            ("server.address", &self.server_address),
            ("docker.host", &self.docker_host),
            ("logging.level", &self.logging_level),
            ("logging.format", &self.logging_format),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

/// Application entry point
///
/// This function:
/// 1. Parses command-line arguments and loads configuration
/// 2. Initializes logging
/// 3. Connects to Docker and compiles the container filter
/// 4. Registers the enabled collectors
/// 5. Serves HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ExporterConfig::load(args.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    info!("=== Container Stats Exporter Starting ===");
    info!(version = env!("CARGO_PKG_VERSION"), "Build info");

    let docker = DockerClient::connect(&config.docker, config.performance.max_concurrent)
        .context("Failed to create Docker client")?;
    let client: Arc<dyn RuntimeClient> = Arc::new(docker);

    match client.ping().await {
        Ok(()) => info!(host = %config.docker.host, "Connected to Docker daemon"),
        Err(e) => warn!(
            host = %config.docker.host,
            error = %e,
            "Docker daemon not reachable yet, scrapes will report errors until it is"
        ),
    }

    let filter = Arc::new(
        Filter::compile(&config.collection.filters).context("Invalid container filter")?,
    );
    let catalog = Arc::new(MetricCatalog::new());
    let cache = Arc::new(StatsCache::new(
        config.metrics.cache.ttl,
        config.metrics.cache.enabled,
    ));

    let mut registry = Registry::new();

    if config.collection.collectors.container {
        registry.register(Arc::new(ContainerCollector::new(
            Arc::clone(&client),
            filter,
            cache,
            Arc::clone(&catalog),
            config.collection.timeout,
            config.performance.max_concurrent,
        )));
    }

    if config.collection.collectors.system {
        registry.register(Arc::new(SystemCollector::new(
            Arc::clone(&client),
            Arc::clone(&catalog),
            config.collection.timeout,
        )));
    }

    if registry.is_empty() {
        warn!("All collectors are disabled, scrapes will be empty");
    }

    info!(
        collectors = registry.len(),
        max_concurrent = config.performance.max_concurrent,
        cache_enabled = config.metrics.cache.enabled,
        "=== Container Stats Exporter Started Successfully ==="
    );

    let state = Arc::new(AppState::new(registry, client));
    server::serve(&config.server, state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("=== Container Stats Exporter Stopped ===");
    Ok(())
}

/// Initializes the logging subsystem
///
/// `RUST_LOG` takes precedence over the configured level. Format is JSON
/// (for log shippers) or human-readable text; output goes to stdout or
/// stderr.
///
/// # Examples
/// ```bash
/// RUST_LOG=debug container-stats-exporter   # Enable debug logging
/// LOG_FORMAT=text container-stats-exporter  # Human-readable output
/// ```
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level {:?}", config.level))?,
    };

    let writer = match config.output.as_str() {
        "stderr" => BoxMakeWriter::new(std::io::stderr),
        _ => BoxMakeWriter::new(std::io::stdout),
    };

    let layer = fmt::layer().with_writer(writer).with_target(true);

    let result = if config.format == "text" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_ansi(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
    };

    result.context("Failed to initialize logging")
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

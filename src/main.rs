//! choice-balancer
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────┐    ┌──────────────────────────────┐
//!     ───────────────────▶│   http   │───▶│          Balancer            │
//!                         │  server  │    │  lock: registry + random     │
//!                         └──────────┘    │  strategy: p2c / jsq / rand  │
//!                                         └──────────────┬───────────────┘
//!                                                        │ acquire
//!                                                        ▼
//!     Client Response     ┌──────────┐    ┌──────────────────────────────┐
//!     ◀───────────────────│ response │◀───│  HyperForwarder (no lock)    │◀──── Backend
//!                         └──────────┘    └──────────────────────────────┘
//!                                                        │ release (guard drop)
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use choice_balancer::config::validation::validate_config;
use choice_balancer::config::watcher::ConfigWatcher;
use choice_balancer::config::{load_config, ConfigError, ProxyConfig, StrategyKind};
use choice_balancer::lifecycle::{signals, Shutdown};
use choice_balancer::observability::{logging, metrics};
use choice_balancer::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "choice-balancer")]
#[command(about = "HTTP load balancer with power-of-k-choices backend selection", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener bind address (overrides config).
    #[arg(short, long)]
    listen: Option<String>,

    /// Backend address; repeat for several (replaces configured backends).
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Selection strategy: power_of_choices, join_shortest_queue or random.
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    /// Sample size k for power_of_choices.
    #[arg(short = 'k', long)]
    choices: Option<usize>,

    /// Track high watermark and lifetime counts per backend.
    #[arg(long)]
    diagnostics: bool,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if !self.backends.is_empty() {
            config.balancer.backends = self.backends.clone();
        }
        if let Some(strategy) = self.strategy {
            config.balancer.strategy = strategy;
        }
        if let Some(choices) = self.choices {
            config.balancer.choices = choices;
        }
        if self.diagnostics {
            config.balancer.diagnostics = true;
        }
    }

    /// File to watch for backend list changes. `--backend` pins the list,
    /// so no watching happens then.
    fn reload_path(&self, config: &ProxyConfig) -> Option<&Path> {
        if !config.reload.enabled || !self.backends.is_empty() {
            return None;
        }
        self.config.as_deref()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability)?;
    tracing::info!("choice-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        strategy = %config.balancer.strategy,
        choices = config.balancer.choices,
        backends = config.balancer.backends.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    if config.reload.enabled && !cli.backends.is_empty() {
        tracing::warn!("Backends given on the command line; config reload disabled");
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, updates) = match cli.reload_path(&config) {
        Some(path) => {
            let poll = Duration::from_secs(config.reload.poll_interval_secs);
            let (watcher, updates) =
                ConfigWatcher::new(path, poll, config.balancer.backends.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

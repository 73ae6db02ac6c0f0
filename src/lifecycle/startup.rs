//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command-line overrides
//! - Initialize logging and the metrics exporter
//! - Start the config watcher
//! - Bind the selected hosts and begin accepting traffic
//!
//! # Design Decisions
//! - A bad config file is fatal; auxiliary failures (metrics, watcher) are
//!   recorded as startup errors and reported by diagnostics
//! - Hosts bind last, so traffic only arrives once the app host is ready

use notify::RecommendedWatcher;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, ConfigError, HostConfig};
use crate::host::{AppHost, HostError, ListenerHost, PipelineHost};
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Which native hosts to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HostMode {
    Pipeline,
    Listener,
    Both,
}

impl HostMode {
    fn pipeline(self) -> bool {
        matches!(self, HostMode::Pipeline | HostMode::Both)
    }

    fn listener(self) -> bool {
        matches!(self, HostMode::Listener | HostMode::Both)
    }
}

/// Load the config file, or defaults when none is given.
pub fn load(path: Option<&Path>, force_debug: bool) -> Result<HostConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };
    config.debug_mode |= force_debug;
    Ok(config)
}

/// Start the metrics exporter if enabled.
pub fn init_metrics(host: &AppHost) {
    let config = host.config();
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(e) => host.record_startup_error(
            "InvalidMetricsAddress",
            format!("{}: {}", config.observability.metrics_address, e),
        ),
    }
}

/// Watch `path` and apply every valid update to `host`.
///
/// The returned watcher must be kept alive.
pub fn watch_config(host: &Arc<AppHost>, path: &Path, force_debug: bool) -> Option<RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            host.record_startup_error("ConfigWatcherFailed", e.to_string());
            return None;
        }
    };

    let host = host.clone();
    tokio::spawn(async move {
        while let Some(mut config) = updates.recv().await {
            config.debug_mode |= force_debug;
            host.apply_config(config);
        }
    });
    Some(watcher)
}

/// Handles to the hosts that are serving.
pub struct RunningHosts {
    pub pipeline_addr: Option<SocketAddr>,
    pub listener_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<Result<(), HostError>>>,
}

impl RunningHosts {
    /// Wait for every host to stop.
    pub async fn join(self) -> Result<(), HostError> {
        for task in self.tasks {
            match task.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "Host task failed"),
            }
        }
        Ok(())
    }
}

/// Bind and start the hosts selected by `mode`.
pub async fn start_hosts(
    host: Arc<AppHost>,
    mode: HostMode,
    shutdown: &Shutdown,
) -> Result<RunningHosts, HostError> {
    let config = host.config();
    let mut running = RunningHosts {
        pipeline_addr: None,
        listener_addr: None,
        tasks: Vec::new(),
    };

    if mode.pipeline() {
        let addr: SocketAddr = config
            .pipeline
            .bind_address
            .parse()
            .map_err(|source| ListenerError::Address {
                address: config.pipeline.bind_address.clone(),
                source,
            })?;
        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        running.pipeline_addr = Some(listener.local_addr()?);
        let pipeline = PipelineHost::new(host.clone());
        let shutdown = shutdown.clone();
        running.tasks.push(tokio::spawn(async move {
            pipeline.run(listener, shutdown).await.map_err(HostError::from)
        }));
    }

    if mode.listener() {
        let listener = Listener::bind(&config.listener).await?;
        running.listener_addr = Some(listener.local_addr()?);
        let standalone = ListenerHost::new(host.clone());
        let shutdown = shutdown.clone();
        running
            .tasks
            .push(tokio::spawn(async move { standalone.run(listener, shutdown).await }));
    }

    tracing::info!(
        service = %config.service_name,
        pipeline = ?running.pipeline_addr,
        listener = ?running.listener_addr,
        debug_mode = config.debug_mode,
        "Hosts started"
    );
    Ok(running)
}

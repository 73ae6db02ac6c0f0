//! dispatch-host
//!
//! Serves a small set of demo handlers through the managed pipeline, the
//! standalone listener, or both.
//!
//! ```text
//!     Client ──▶ pipeline (axum) ──┐
//!                                  ├──▶ HandlerFactory ──▶ AsyncTaskDispatcher ──▶ handler
//!     Client ──▶ listener (hyper) ─┘
//! ```

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use dispatch_host::dispatch::{ExecutionMode, HandlerError};
use dispatch_host::http::{NormalizedRequest, NormalizedResponse};
use dispatch_host::lifecycle::{signals, startup, HostMode};
use dispatch_host::observability::logging;
use dispatch_host::{AppHost, Shutdown, TaskHandler};

#[derive(Parser)]
#[command(name = "dispatch-host")]
#[command(about = "Async request dispatch host", long_about = None)]
struct Cli {
    /// TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = HostMode::Both)]
    mode: HostMode,

    /// Force debug mode on, regardless of the config file.
    #[arg(long)]
    debug: bool,
}

/// `GET /Hello?name=x` → `{"Result":"Hello, x!"}`
struct Hello;

impl TaskHandler for Hello {
    fn process_request(
        &self,
        request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        let name = request.query.get("name").unwrap_or("world");
        response.set_content_type("application/json");
        response.write(serde_json::to_vec(&json!({ "Result": format!("Hello, {name}!") }))?);
        Ok(())
    }
}

/// Native async handler; waits briefly before answering.
struct Ping;

#[async_trait]
impl TaskHandler for Ping {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::NativeAsync
    }

    async fn process_request_async(
        &self,
        _request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        response.set_content_type("text/plain");
        response.write("pong");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::load(cli.config.as_deref(), cli.debug)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service_name,
        mode = ?cli.mode,
        "dispatch-host starting"
    );

    let host = AppHost::builder(config)
        .handler("Hello", Hello)
        .handler("Ping", Ping)
        .build()?;

    startup::init_metrics(&host);
    let _watcher = cli
        .config
        .as_deref()
        .and_then(|path| startup::watch_config(&host, path, cli.debug));

    let shutdown = Shutdown::new();
    let running = startup::start_hosts(host, cli.mode, &shutdown).await?;
    signals::forward_to(shutdown);
    running.join().await?;

    tracing::info!("dispatch-host stopped");
    Ok(())
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Service name reported in diagnostics.
    pub service_name: String,

    /// Enables last-request recording and the `requestinfo` endpoint.
    pub debug_mode: bool,

    /// Path segment the dispatch layer is mounted under (empty for root).
    pub handler_factory_path: String,

    /// Overrides the host environment name reported in diagnostics.
    pub host_environment: Option<String>,

    /// Feature names reported as enabled.
    pub enable_features: Vec<String>,

    /// Headers added to every response not terminated with headers suppressed.
    pub global_response_headers: BTreeMap<String, String>,

    /// Managed pipeline (axum) host.
    pub pipeline: PipelineConfig,

    /// Standalone listener (raw hyper) host.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            service_name: "dispatch-host".to_string(),
            debug_mode: false,
            handler_factory_path: String::new(),
            host_environment: None,
            enable_features: vec!["json".to_string(), "metadata".to_string()],
            global_response_headers: BTreeMap::from([(
                "x-powered-by".to_string(),
                format!("dispatch-host/{}", env!("CARGO_PKG_VERSION")),
            )]),
            pipeline: PipelineConfig::default(),
            listener: ListenerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Managed pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Run every request through the synchronous bridge on a blocking thread
    /// instead of the begin/end callback bridge.
    pub force_synchronous: bool,

    /// Path the application is mounted under.
    pub application_path: String,

    /// Virtual path of the application root.
    pub application_virtual_path: String,

    /// Request timeout in seconds (host-layer policy).
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            force_synchronous: false,
            application_path: "/".to_string(),
            application_virtual_path: "/".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Standalone listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8090").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Seconds to wait for open connections on shutdown.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024,
            drain_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Prometheus scrape endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "dispatch_host=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

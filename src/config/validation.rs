//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::HostConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut push = |field, message: String| errors.push(ValidationError { field, message });

    if config.service_name.trim().is_empty() {
        push("service_name", "must not be empty".into());
    }
    if config.handler_factory_path.contains(['?', '#', ' ']) {
        push("handler_factory_path", "must be a plain path segment".into());
    }
    if config.pipeline.bind_address.parse::<SocketAddr>().is_err() {
        push("pipeline.bind_address", format!("invalid socket address '{}'", config.pipeline.bind_address));
    }
    if config.pipeline.request_timeout_secs == 0 {
        push("pipeline.request_timeout_secs", "must be greater than zero".into());
    }
    if !config.pipeline.application_virtual_path.starts_with('/') {
        push("pipeline.application_virtual_path", "must start with '/'".into());
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        push("listener.bind_address", format!("invalid socket address '{}'", config.listener.bind_address));
    }
    if config.listener.max_connections == 0 {
        push("listener.max_connections", "must be greater than zero".into());
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        push(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

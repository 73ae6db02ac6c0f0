//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, hosts, config watcher produce:
//!     → logging.rs (structured tracing events, one span per dispatch)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for production)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID and operation name are span fields, so every event inside a
//!   dispatch carries them
//! - Metric updates go through the `metrics` facade; without an installed
//!   recorder they are no-ops

pub mod logging;
pub mod metrics;

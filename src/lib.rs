//! Async request dispatch host library.
//!
//! Adapts application handlers, synchronous or natively async, to two
//! native hosting APIs: a managed axum pipeline and a standalone hyper
//! listener. In debug mode it also serves a diagnostic snapshot of the
//! live host at `/requestinfo`.

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::HostConfig;
pub use dispatch::{AsyncTaskDispatcher, TaskHandler};
pub use host::AppHost;
pub use lifecycle::Shutdown;

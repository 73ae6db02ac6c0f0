//! Hosting subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline.rs (axum)          listener.rs (raw hyper over net::Listener)
//!        │                              │
//!        └──▶ context.rs (NativeContext) ◀┘
//!                      │
//!                factory.rs (handler selection)
//!                      │
//!              dispatch::AsyncTaskDispatcher
//!                      │
//!              app_host.rs (config, registries, hooks)
//! ```

pub mod app_host;
pub mod context;
pub mod factory;
pub mod listener;
pub mod pipeline;
pub mod registries;

pub use app_host::{
    write_error_response, AppHost, AppHostBuilder, DefaultHandledPredicate, HostError, ResponseStatus,
    UncaughtExceptionHook,
};
pub use context::NativeContext;
pub use factory::{HandlerFactory, NotFoundHandler};
pub use listener::ListenerHost;
pub use pipeline::PipelineHost;
pub use registries::{Registries, RegistryKind};

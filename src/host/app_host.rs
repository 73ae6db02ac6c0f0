//! Application host.
//!
//! Process-wide state shared by both native hosts: live configuration,
//! registered handlers, registries, hooks and the last-request slot.

use arc_swap::{ArcSwap, ArcSwapOption};
use axum::http::StatusCode;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::HostConfig;
use crate::diagnostics::{LastRequestMemory, REQUEST_INFO_OPERATION};
use crate::dispatch::error::{HandlerError, HandlerPanic, NotImplemented};
use crate::dispatch::{LastSegmentResolver, OperationResolver, TaskHandler};
use crate::host::context::NativeContext;
use crate::host::registries::{Registries, RegistryKind};
use crate::http::{HostKind, NormalizedRequest, NormalizedResponse};

/// Writes an error response for a failed handler. May itself fail.
pub type UncaughtExceptionHook = Arc<
    dyn Fn(&NormalizedRequest, &NormalizedResponse, &str, &HandlerError) -> Result<(), HandlerError>
        + Send
        + Sync,
>;

/// Claims a request as already served by the hosting layer.
pub type DefaultHandledPredicate = Arc<dyn Fn(&NativeContext) -> bool + Send + Sync>;

/// Error descriptor, used for startup errors and error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseStatus {
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse<'a> {
    response_status: &'a ResponseStatus,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("app host must be built inside a Tokio runtime")]
    NoRuntime,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listener error: {0}")]
    Listener(#[from] crate::net::ListenerError),
}

pub struct AppHost {
    config: ArcSwap<HostConfig>,
    registries: Registries,
    handlers: DashMap<String, Arc<dyn TaskHandler>>,
    resolver: Arc<dyn OperationResolver>,
    default_handled: DefaultHandledPredicate,
    uncaught_exception: UncaughtExceptionHook,
    last_request: Arc<LastRequestMemory>,
    startup_errors: Mutex<Vec<ResponseStatus>>,
    handler_factory_args: ArcSwapOption<String>,
    runtime: Handle,
}

impl AppHost {
    pub fn builder(config: HostConfig) -> AppHostBuilder {
        AppHostBuilder::new(config)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<HostConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration.
    pub fn apply_config(&self, config: HostConfig) {
        tracing::info!(debug_mode = config.debug_mode, "Applying configuration");
        self.config.store(Arc::new(config));
    }

    pub fn debug_mode(&self) -> bool {
        self.config.load().debug_mode
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn last_request(&self) -> &LastRequestMemory {
        &self.last_request
    }

    /// Register a handler under an operation name.
    pub fn register_handler(&self, operation_name: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let operation_name = operation_name.into();
        self.registries.register(RegistryKind::RequestTypes, operation_name.clone());
        self.registries.register(RegistryKind::ServiceTypes, handler.handler_type());
        self.registries.register(RegistryKind::RestPaths, format!("/{operation_name}"));
        let response_name = response_name_of(&operation_name, handler.as_ref());
        self.registries.register(RegistryKind::ResponseTypes, response_name);
        self.handlers.insert(operation_name, handler);
    }

    pub fn handler(&self, operation_name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(operation_name).map(|h| h.value().clone())
    }

    /// Registered operation names, sorted.
    pub fn operation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Every operation the factory can answer, including the diagnostic
    /// endpoint while debug mode is on.
    pub fn all_operation_names(&self) -> Vec<String> {
        let mut names = self.operation_names();
        if self.debug_mode() {
            names.push(REQUEST_INFO_OPERATION.to_string());
            names.sort();
            names.dedup();
        }
        names
    }

    /// Operation name to response type name.
    pub fn request_response_map(&self) -> BTreeMap<String, String> {
        self.handlers
            .iter()
            .map(|e| (e.key().clone(), response_name_of(e.key(), e.value().as_ref())))
            .collect()
    }

    pub fn resolve_operation(&self, request: &NormalizedRequest) -> String {
        self.resolver.resolve(request)
    }

    pub fn is_default_handled(&self, ctx: &NativeContext) -> bool {
        (self.default_handled)(ctx)
    }

    pub fn raise_uncaught_exception(
        &self,
        request: &NormalizedRequest,
        response: &NormalizedResponse,
        operation_name: &str,
        error: &HandlerError,
    ) -> Result<(), HandlerError> {
        (self.uncaught_exception)(request, response, operation_name, error)
    }

    pub fn record_startup_error(&self, error_code: impl Into<String>, message: impl Into<String>) {
        let status = ResponseStatus {
            error_code: error_code.into(),
            message: message.into(),
        };
        tracing::warn!(error_code = %status.error_code, message = %status.message, "Startup error recorded");
        self.startup_errors.lock().push(status);
    }

    pub fn startup_errors(&self) -> Vec<ResponseStatus> {
        self.startup_errors.lock().clone()
    }

    pub fn set_handler_factory_args(&self, args: String) {
        self.handler_factory_args.store(Some(Arc::new(args)));
    }

    pub fn handler_factory_args(&self) -> Option<String> {
        self.handler_factory_args.load_full().map(|a| (*a).clone())
    }

    /// Host environment name reported in diagnostics.
    pub fn host_environment(&self, kind: HostKind) -> String {
        self.config
            .load()
            .host_environment
            .clone()
            .unwrap_or_else(|| kind.environment().to_string())
    }

    /// Resolve an app-relative (`~/...`) path against the request's base URL.
    pub fn resolve_absolute_url(&self, virtual_path: &str, request: &NormalizedRequest) -> String {
        let base = match request.origin.pipeline() {
            Some(origin) => format!(
                "{}{}",
                origin.left_part,
                with_trailing_slash(&origin.application_path)
            ),
            None => {
                let authority_end = request
                    .absolute_uri
                    .find("://")
                    .and_then(|i| request.absolute_uri[i + 3..].find('/').map(|j| i + 3 + j))
                    .unwrap_or(request.absolute_uri.len());
                format!("{}/", &request.absolute_uri[..authority_end])
            }
        };
        match virtual_path.strip_prefix("~/") {
            Some(rest) => format!("{base}{rest}"),
            None => virtual_path.to_string(),
        }
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn response_name_of(operation_name: &str, handler: &dyn TaskHandler) -> String {
    match handler.response_name() {
        Some(name) => name.to_string(),
        None => format!("{operation_name}Response"),
    }
}

/// Default uncaught-exception hook: a 500 JSON error document.
///
/// Fails if the response was already terminated.
pub fn write_error_response(
    _request: &NormalizedRequest,
    response: &NormalizedResponse,
    _operation_name: &str,
    error: &HandlerError,
) -> Result<(), HandlerError> {
    if response.is_ended() {
        return Err("response already terminated".into());
    }
    let status = ResponseStatus {
        error_code: error_code(error).to_string(),
        message: error.to_string(),
    };
    let body = serde_json::to_vec(&ErrorResponse { response_status: &status })?;
    response.clear();
    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.set_content_type("application/json");
    response.write(body);
    Ok(())
}

fn error_code(error: &HandlerError) -> &'static str {
    if error.downcast_ref::<NotImplemented>().is_some() {
        "NotImplemented"
    } else if error.downcast_ref::<HandlerPanic>().is_some() {
        "HandlerPanic"
    } else {
        "InternalServerError"
    }
}

pub struct AppHostBuilder {
    config: HostConfig,
    handlers: Vec<(String, Arc<dyn TaskHandler>)>,
    resolver: Arc<dyn OperationResolver>,
    default_handled: DefaultHandledPredicate,
    uncaught_exception: UncaughtExceptionHook,
    last_request: Option<Arc<LastRequestMemory>>,
    runtime: Option<Handle>,
}

impl AppHostBuilder {
    fn new(config: HostConfig) -> Self {
        Self {
            config,
            handlers: Vec::new(),
            resolver: Arc::new(LastSegmentResolver),
            default_handled: Arc::new(|_: &NativeContext| false),
            uncaught_exception: Arc::new(write_error_response),
            last_request: None,
            runtime: None,
        }
    }

    pub fn handler(mut self, operation_name: impl Into<String>, handler: impl TaskHandler) -> Self {
        self.handlers.push((operation_name.into(), Arc::new(handler)));
        self
    }

    pub fn resolver(mut self, resolver: impl OperationResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn default_handled<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NativeContext) -> bool + Send + Sync + 'static,
    {
        self.default_handled = Arc::new(predicate);
        self
    }

    pub fn uncaught_exception_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NormalizedRequest, &NormalizedResponse, &str, &HandlerError) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.uncaught_exception = Arc::new(hook);
        self
    }

    /// Use a private last-request slot instead of the process-wide one.
    pub fn last_request_memory(mut self, memory: Arc<LastRequestMemory>) -> Self {
        self.last_request = Some(memory);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Arc<AppHost>, HostError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| HostError::NoRuntime)?,
        };

        let registries = Registries::new();
        registries.register(RegistryKind::ContentTypes, "application/json");
        registries.register(RegistryKind::ContentTypes, "text/plain");
        for feature in &self.config.enable_features {
            registries.register(RegistryKind::Plugins, feature.clone());
        }

        let host = Arc::new(AppHost {
            config: ArcSwap::from_pointee(self.config),
            registries,
            handlers: DashMap::new(),
            resolver: self.resolver,
            default_handled: self.default_handled,
            uncaught_exception: self.uncaught_exception,
            last_request: self.last_request.unwrap_or_else(LastRequestMemory::process),
            startup_errors: Mutex::new(Vec::new()),
            handler_factory_args: ArcSwapOption::empty(),
            runtime,
        });
        for (name, handler) in self.handlers {
            host.register_handler(name, handler);
        }
        Ok(host)
    }
}

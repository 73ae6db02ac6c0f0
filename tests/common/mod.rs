//! Shared handlers, hooks and fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatch_host::config::HostConfig;
use dispatch_host::diagnostics::LastRequestMemory;
use dispatch_host::dispatch::{ExecutionMode, HandlerError};
use dispatch_host::host::{AppHostBuilder, NativeContext};
use dispatch_host::http::{NormalizedRequest, NormalizedResponse};
use dispatch_host::{AppHost, TaskHandler};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Boom(pub String);

/// Writes the operation name and counts invocations.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub calls: Arc<AtomicUsize>,
}

impl RecordingHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TaskHandler for RecordingHandler {
    fn process_request(
        &self,
        _request: &NormalizedRequest,
        response: &NormalizedResponse,
        operation_name: &str,
    ) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        response.set_content_type("text/plain");
        response.write(operation_name);
        Ok(())
    }
}

/// Native-async variant of [`RecordingHandler`].
#[derive(Clone, Default)]
pub struct AsyncRecordingHandler {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskHandler for AsyncRecordingHandler {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::NativeAsync
    }

    async fn process_request_async(
        &self,
        _request: &NormalizedRequest,
        response: &NormalizedResponse,
        operation_name: &str,
    ) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        response.write(format!("async:{operation_name}"));
        Ok(())
    }
}

/// Always fails with [`Boom`].
pub struct FailingHandler;

impl TaskHandler for FailingHandler {
    fn process_request(
        &self,
        _request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        response.write("partial output");
        Err(Box::new(Boom("boom".into())))
    }
}

pub struct PanickingHandler;

impl TaskHandler for PanickingHandler {
    fn process_request(
        &self,
        _request: &NormalizedRequest,
        _response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        panic!("handler exploded")
    }
}

/// Native-async variant of [`FailingHandler`].
pub struct AsyncFailingHandler;

#[async_trait]
impl TaskHandler for AsyncFailingHandler {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::NativeAsync
    }

    async fn process_request_async(
        &self,
        _request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        response.write("partial output");
        Err(Box::new(Boom("boom".into())))
    }
}

pub struct AsyncPanickingHandler;

#[async_trait]
impl TaskHandler for AsyncPanickingHandler {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::NativeAsync
    }

    async fn process_request_async(
        &self,
        _request: &NormalizedRequest,
        _response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        panic!("async handler exploded")
    }
}

/// Records every uncaught-exception hook invocation.
#[derive(Clone, Default)]
pub struct HookRecorder {
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl HookRecorder {
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    /// A hook that records the error, then succeeds or fails.
    pub fn hook(
        &self,
        fail: bool,
    ) -> impl Fn(&NormalizedRequest, &NormalizedResponse, &str, &HandlerError) -> Result<(), HandlerError>
           + Send
           + Sync
           + 'static {
        let messages = self.messages.clone();
        move |_request: &NormalizedRequest,
              response: &NormalizedResponse,
              _operation_name: &str,
              error: &HandlerError| {
            messages.lock().push(error.to_string());
            if fail {
                return Err("hook could not write".into());
            }
            response.write("handled");
            Ok(())
        }
    }
}

pub fn debug_config() -> HostConfig {
    let mut config = HostConfig::default();
    config.debug_mode = true;
    config
}

/// A builder with a private last-request slot.
pub fn builder(config: HostConfig) -> AppHostBuilder {
    AppHost::builder(config).last_request_memory(Arc::new(LastRequestMemory::new()))
}

pub fn listener_context(path: &str) -> NativeContext {
    let (parts, _) = axum::http::Request::get(path)
        .header("host", "localhost")
        .body(())
        .unwrap()
        .into_parts();
    NativeContext::listener(&HostConfig::default(), &parts, Default::default(), None)
}

pub fn pipeline_context(path: &str) -> NativeContext {
    let (parts, _) = axum::http::Request::get(path)
        .header("host", "localhost")
        .body(())
        .unwrap()
        .into_parts();
    NativeContext::pipeline(&HostConfig::default(), &parts, Default::default(), None)
}

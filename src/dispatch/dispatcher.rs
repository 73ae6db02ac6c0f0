//! Async task dispatcher.
//!
//! One entry point per native completion contract, all converging on
//! [`AsyncTaskDispatcher::process_request_async`]:
//!
//! ```text
//! begin_process_request ─┐
//! process_request_blocking ┼─▶ process_request_async ─▶ PendingWork
//! process_listener_request ┘        │
//!                                   ├─ resolve operation name
//!                                   ├─ short-circuit (empty name / default handled)
//!                                   ├─ remember last request (debug mode)
//!                                   └─ Synchronous → deferred body
//!                                      NativeAsync → spawned future
//! ```
//!
//! Every executed call ends its response exactly once, on success, handler
//! fault and hook fault alike.

use futures_util::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::diagnostics::LastRequestRecord;
use crate::dispatch::error::{DispatchError, HandlerError, HandlerPanic, Outcome};
use crate::dispatch::handler::{ExecutionMode, TaskHandler};
use crate::dispatch::operation::OperationDescriptor;
use crate::dispatch::pending::{CompletionCallback, PendingWork};
use crate::host::{AppHost, NativeContext};
use crate::http::{NormalizedRequest, NormalizedResponse};
use crate::observability::metrics;

/// Dispatches one handler against native host contexts.
#[derive(Clone)]
pub struct AsyncTaskDispatcher {
    host: Arc<AppHost>,
    handler: Arc<dyn TaskHandler>,
}

impl AsyncTaskDispatcher {
    pub fn new(host: Arc<AppHost>, handler: Arc<dyn TaskHandler>) -> Self {
        Self { host, handler }
    }

    pub fn handler(&self) -> &Arc<dyn TaskHandler> {
        &self.handler
    }

    /// Resolve the operation name and apply the short-circuit checks.
    pub fn resolve(&self, ctx: &NativeContext) -> OperationDescriptor {
        let name = match self.handler.request_name() {
            Some(name) => name.to_string(),
            None => self.host.resolve_operation(ctx.request()),
        };
        let descriptor = OperationDescriptor::new(name);
        if !descriptor.handled_by_default && self.host.is_default_handled(ctx) {
            return descriptor.pre_handled();
        }
        descriptor
    }

    /// Build the unit of work for a call.
    ///
    /// Synchronous handlers yield a deferred unit the caller must start or
    /// run; native-async handlers yield a unit that is already running.
    pub fn process_request_async(&self, ctx: NativeContext) -> PendingWork {
        let descriptor = self.resolve(&ctx);
        if descriptor.handled_by_default {
            tracing::debug!(
                request_id = %ctx.request().request_id,
                path = %ctx.request().path_info,
                operation = %descriptor.operation_name,
                "Request already handled"
            );
            metrics::record_short_circuit(ctx.kind());
            return PendingWork::completed();
        }

        self.remember_last_request(&descriptor.operation_name, &ctx.request().path_info);

        let (mut request, response) = ctx.into_parts();
        request.operation_name = descriptor.operation_name.clone();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %request.request_id,
            operation = %descriptor.operation_name,
            handler = self.handler.handler_type(),
        );
        let call = DispatchCall {
            host: self.host.clone(),
            handler: self.handler.clone(),
            request: Arc::new(request),
            response,
            operation_name: descriptor.operation_name,
        };

        match self.handler.execution_mode() {
            ExecutionMode::NativeAsync => {
                PendingWork::spawn(self.host.runtime(), call.run_async().instrument(span))
            }
            ExecutionMode::Synchronous => PendingWork::deferred(move || {
                let _entered = span.enter();
                call.run_blocking()
            }),
        }
    }

    /// Callback contract: start the unit of work and invoke `callback`
    /// exactly once when it completes. The returned handle is the async
    /// result token to pass to [`end_process_request`](Self::end_process_request).
    pub fn begin_process_request(
        &self,
        ctx: NativeContext,
        callback: Option<CompletionCallback>,
    ) -> Result<PendingWork, DispatchError> {
        let callback = callback.ok_or(DispatchError::InvalidCallback)?;
        let work = self.process_request_async(ctx);
        work.on_complete(callback);
        work.start(self.host.runtime());
        Ok(work)
    }

    /// Callback contract: block until the unit of work finishes and surface
    /// its fault, if any.
    pub fn end_process_request(&self, work: &PendingWork) -> Outcome {
        work.wait()
    }

    /// Synchronous pipeline contract: run a deferred unit on this thread, or
    /// wait for one that is already scheduled elsewhere.
    pub fn process_request_blocking(&self, ctx: NativeContext) -> Outcome {
        let work = self.process_request_async(ctx);
        if !work.is_started() {
            work.run_synchronously();
        }
        work.wait()
    }

    /// Standalone listener contract: a blocking call that raises on fault.
    pub fn process_listener_request(&self, ctx: NativeContext) -> Outcome {
        self.process_request_blocking(ctx)
    }

    fn remember_last_request(&self, operation_name: &str, path_info: &str) {
        if self.host.debug_mode() {
            self.host.last_request().remember(LastRequestRecord {
                handler_type: self.handler.handler_type().to_string(),
                operation_name: operation_name.to_string(),
                path_info: path_info.to_string(),
            });
        }
    }
}

/// Terminates the response when dropped.
struct EndRequestGuard(NormalizedResponse);

impl Drop for EndRequestGuard {
    fn drop(&mut self) {
        self.0.end_request(true);
    }
}

/// Everything one executing call owns.
struct DispatchCall {
    host: Arc<AppHost>,
    handler: Arc<dyn TaskHandler>,
    request: Arc<NormalizedRequest>,
    response: NormalizedResponse,
    operation_name: String,
}

impl DispatchCall {
    fn run_blocking(self) -> Outcome {
        let _finalizer = EndRequestGuard(self.response.clone());
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler
                .process_request(&self.request, &self.response, &self.operation_name)
        }))
        .unwrap_or_else(|payload| Err(Box::new(HandlerPanic::from_payload(payload)) as HandlerError));
        self.finish(result, started)
    }

    async fn run_async(self) -> Outcome {
        let _finalizer = EndRequestGuard(self.response.clone());
        let started = Instant::now();
        let result = AssertUnwindSafe(self.handler.process_request_async(
            &self.request,
            &self.response,
            &self.operation_name,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Box::new(HandlerPanic::from_payload(payload)) as HandlerError));
        self.finish(result, started)
    }

    fn finish(&self, result: Result<(), HandlerError>, started: Instant) -> Outcome {
        let (outcome, label) = match result {
            Ok(()) => (Ok(()), "completed"),
            Err(error) => match self.handle_exception(error) {
                Ok(()) => (Ok(()), "handled_fault"),
                Err(e) => (Err(e), "faulted"),
            },
        };
        metrics::record_dispatch(&self.operation_name, label, started);
        outcome
    }

    /// Hand the fault to the uncaught-exception hook. A hook failure is
    /// logged; the original error is what propagates.
    fn handle_exception(&self, error: HandlerError) -> Outcome {
        tracing::error!(
            operation = %self.operation_name,
            error = %error,
            "Error occurred while processing request: {}",
            error
        );

        match self.host.raise_uncaught_exception(
            &self.request,
            &self.response,
            &self.operation_name,
            &error,
        ) {
            Ok(()) => Ok(()),
            Err(write_error) => {
                tracing::info!(
                    operation = %self.operation_name,
                    error = %write_error,
                    "Failed to write error to response"
                );
                metrics::record_hook_failure(&self.operation_name);
                Err(DispatchError::Handler(Arc::new(error)))
            }
        }
    }
}

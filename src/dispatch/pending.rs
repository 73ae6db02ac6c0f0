//! Pending unit of work.
//!
//! One value type bridges both native completion models:
//! - callback hosts call [`PendingWork::start`] then [`PendingWork::on_complete`]
//! - blocking hosts call [`PendingWork::run_synchronously`] or [`PendingWork::wait`]
//! - async callers await [`PendingWork::join`]
//!
//! # States
//! ```text
//! Created ──start / run_synchronously──▶ Running ──▶ Completed | Faulted
//! ```
//! A unit of work completes at most once. Continuations registered before
//! completion run exactly once on the completing thread; continuations
//! registered afterwards run immediately on the caller's thread.
//!
//! There is no dispose step. Dropping the last handle to a running unit of
//! work does not cancel it; the runtime owns the scheduled task.

use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::dispatch::error::{DispatchError, HandlerError, HandlerPanic, Outcome};

type DeferredBody = Box<dyn FnOnce() -> Outcome + Send + 'static>;

/// Continuation invoked once the unit of work completes.
pub type CompletionCallback = Box<dyn FnOnce(&PendingWork) + Send + 'static>;

/// Observable status of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Deferred, not yet started.
    Created,
    /// Scheduled or executing.
    Running,
    /// Finished without fault.
    Completed,
    /// Finished with a fault.
    Faulted,
}

enum Stage {
    Deferred(DeferredBody),
    Running,
    Done(Outcome),
}

struct State {
    stage: Stage,
    continuations: Vec<CompletionCallback>,
}

struct Shared {
    state: Mutex<State>,
    done: Condvar,
}

/// A cloneable handle to a deferred or scheduled computation.
#[derive(Clone)]
pub struct PendingWork {
    shared: Arc<Shared>,
}

impl PendingWork {
    fn with_stage(stage: Stage) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    stage,
                    continuations: Vec::new(),
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// An already-completed unit of work with an empty result.
    pub fn completed() -> Self {
        Self::with_stage(Stage::Done(Ok(())))
    }

    /// An already-faulted unit of work.
    pub fn faulted(error: DispatchError) -> Self {
        Self::with_stage(Stage::Done(Err(error)))
    }

    /// A lazy unit of work. The body does not run until the caller decides
    /// how: [`start`](Self::start) or [`run_synchronously`](Self::run_synchronously).
    pub fn deferred<F>(body: F) -> Self
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        Self::with_stage(Stage::Deferred(Box::new(body)))
    }

    /// A unit of work that is already running as a task on `runtime`.
    pub fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let work = Self::with_stage(Stage::Running);
        let task = runtime.spawn(future);
        let completion = work.clone();
        runtime.spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(panic_fault(e.into_panic())),
                Err(_) => Err(DispatchError::Cancelled),
            };
            completion.complete(outcome);
        });
        work
    }

    pub fn status(&self) -> WorkStatus {
        match &self.shared.state.lock().stage {
            Stage::Deferred(_) => WorkStatus::Created,
            Stage::Running => WorkStatus::Running,
            Stage::Done(Ok(())) => WorkStatus::Completed,
            Stage::Done(Err(_)) => WorkStatus::Faulted,
        }
    }

    pub fn is_started(&self) -> bool {
        self.status() != WorkStatus::Created
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status(), WorkStatus::Completed | WorkStatus::Faulted)
    }

    /// The outcome, if the unit of work has finished.
    pub fn outcome(&self) -> Option<Outcome> {
        match &self.shared.state.lock().stage {
            Stage::Done(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    /// Schedule a deferred body on the runtime's blocking pool.
    ///
    /// Returns `false` if the unit of work was already started.
    pub fn start(&self, runtime: &Handle) -> bool {
        let Some(body) = self.take_deferred() else {
            return false;
        };
        let work = self.clone();
        runtime.spawn_blocking(move || work.complete(run_body(body)));
        true
    }

    /// Run a deferred body to completion on the calling thread.
    ///
    /// Returns `false` if the unit of work was already started.
    pub fn run_synchronously(&self) -> bool {
        let Some(body) = self.take_deferred() else {
            return false;
        };
        self.complete(run_body(body));
        true
    }

    /// Attach a continuation. It runs exactly once.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&PendingWork) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if matches!(state.stage, Stage::Done(_)) {
            drop(state);
            continuation(self);
            return;
        }
        state.continuations.push(Box::new(continuation));
    }

    /// Block the calling thread until the unit of work finishes.
    ///
    /// A unit of work that was never started runs on the calling thread.
    /// Must not be called from an async task that the unit of work depends on.
    pub fn wait(&self) -> Outcome {
        self.run_synchronously();
        let mut state = self.shared.state.lock();
        loop {
            if let Stage::Done(outcome) = &state.stage {
                return outcome.clone();
            }
            self.shared.done.wait(&mut state);
        }
    }

    /// Await completion without blocking a runtime thread.
    ///
    /// The unit of work must already be started.
    pub async fn join(&self) -> Outcome {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.on_complete(move |work| {
            let _ = tx.send(work.outcome());
        });
        match rx.await {
            Ok(Some(outcome)) => outcome,
            _ => Err(DispatchError::Cancelled),
        }
    }

    fn take_deferred(&self) -> Option<DeferredBody> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut state.stage, Stage::Running) {
            Stage::Deferred(body) => Some(body),
            other => {
                state.stage = other;
                None
            }
        }
    }

    fn complete(&self, outcome: Outcome) {
        let continuations = {
            let mut state = self.shared.state.lock();
            if matches!(state.stage, Stage::Done(_)) {
                return;
            }
            state.stage = Stage::Done(outcome);
            self.shared.done.notify_all();
            std::mem::take(&mut state.continuations)
        };
        for continuation in continuations {
            continuation(self);
        }
    }
}

impl std::fmt::Debug for PendingWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWork")
            .field("status", &self.status())
            .finish()
    }
}

fn run_body(body: DeferredBody) -> Outcome {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| Err(panic_fault(payload)))
}

fn panic_fault(payload: Box<dyn std::any::Any + Send>) -> DispatchError {
    let error: HandlerError = Box::new(HandlerPanic::from_payload(payload));
    DispatchError::Handler(Arc::new(error))
}

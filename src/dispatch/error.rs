//! Dispatch error taxonomy.
//!
//! An empty operation name is not an error; the dispatcher completes such
//! calls with an empty result. Everything else that can go wrong between the
//! host boundary and the handler body is represented here.

use std::sync::Arc;
use thiserror::Error;

/// Error raised by a handler body.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Final result of a unit of work.
pub type Outcome = Result<(), DispatchError>;

/// Errors surfaced to the native host's fault channel.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The handler body failed and the uncaught-exception hook could not
    /// write an error response. Carries the original error.
    #[error("{0}")]
    Handler(Arc<HandlerError>),

    /// The legacy-callback bridge was invoked without a completion callback.
    #[error("completion callback is required")]
    InvalidCallback,

    /// The unit of work was dropped by the runtime before it completed.
    #[error("unit of work was cancelled before completion")]
    Cancelled,
}

impl DispatchError {
    /// The original handler error, if this is a handler fault.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            DispatchError::Handler(err) => Some(err),
            _ => None,
        }
    }

    /// Downcast the original handler error to a concrete type.
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.handler_error().and_then(|err| err.downcast_ref::<T>())
    }
}

/// Raised by the default synchronous entry point of a handler that only
/// implements the async one.
#[derive(Debug, Error)]
#[error("{handler} does not implement a synchronous entry point")]
pub struct NotImplemented {
    pub handler: String,
}

/// A panic inside a handler body, converted so it takes the fault path.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

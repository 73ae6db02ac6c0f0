//! Dispatch core.
//!
//! # Data Flow
//! ```text
//! native host event
//!     → host adapter builds NativeContext (normalized request + response sink)
//!     → dispatcher.rs resolves the operation name (operation.rs)
//!     → dispatcher.rs records the last request (debug mode)
//!     → handler.rs body runs inside a pending.rs unit of work
//!     → outcome / fault flows back to the native completion contract
//! ```
//!
//! # Design Decisions
//! - One internal contract (`PendingWork`) behind both native completion
//!   models; each host translates only at its own boundary
//! - Handler faults are caught once, at the dispatch boundary
//! - Response termination is tied to a drop guard, never to a code path

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod operation;
pub mod pending;

pub use dispatcher::AsyncTaskDispatcher;
pub use error::{DispatchError, HandlerError, Outcome};
pub use handler::{ExecutionMode, TaskHandler};
pub use operation::{LastSegmentResolver, OperationDescriptor, OperationResolver};
pub use pending::{CompletionCallback, PendingWork, WorkStatus};

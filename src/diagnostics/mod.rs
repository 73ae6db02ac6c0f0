//! Diagnostics subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (debug mode) → last_request.rs (single overwrite-only slot)
//!
//! GET /requestinfo (debug mode)
//!     → handler.rs (RequestInfoHandler)
//!     → snapshot.rs (reads AppHost, registries, last request, startup errors)
//!     → JSON document
//! ```

pub mod handler;
pub mod last_request;
pub mod snapshot;

pub use handler::{RequestInfoHandler, REQUEST_INFO_OPERATION, REQUEST_INFO_PATH};
pub use last_request::{LastRequestMemory, LastRequestRecord};
pub use snapshot::{DiagnosticSnapshot, SnapshotAssembler, CONTENT_TYPE};

//! Host-agnostic request/response abstraction.
//!
//! # Data Flow
//! ```text
//! axum Request<Body> ─┐
//!                     ├─▶ request.rs (NormalizedRequest)
//! hyper Request ──────┘        │
//!                              ▼
//!                       dispatcher + handler
//!                              │
//!                              ▼
//!                  response.rs (NormalizedResponse sink)
//!                              │
//!                              ▼
//!                  native Response<Body> for either host
//! ```

pub mod request;
pub mod response;

pub use request::{HostKind, HostOrigin, NameValueMap, NormalizedRequest, PipelineOrigin, X_REQUEST_ID};
pub use response::NormalizedResponse;

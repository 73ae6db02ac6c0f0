//! Normalized response sink.
//!
//! # Responsibilities
//! - Collect status, content type, headers and body written by handlers
//! - Terminate the request exactly once (`end_request`)
//! - Convert the collected state into a native HTTP response
//!
//! # Design Decisions
//! - The sink is a cheap cloneable handle; the host keeps one clone and
//!   reads it back after the unit of work completes
//! - Writes after termination are dropped
//! - `end_request(skip_headers = true)` suppresses the host's global
//!   response headers

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    ended: bool,
    skip_headers: bool,
    end_calls: usize,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
            ended: false,
            skip_headers: false,
            end_calls: 0,
        }
    }
}

/// Writable response sink shared between a host and the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    state: Arc<Mutex<ResponseState>>,
}

impl NormalizedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.state.lock().status
    }

    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if !state.ended {
            state.status = status;
        }
    }

    pub fn content_type(&self) -> Option<String> {
        self.state.lock().content_type.clone()
    }

    pub fn set_content_type(&self, content_type: impl Into<String>) {
        let mut state = self.state.lock();
        if !state.ended {
            state.content_type = Some(content_type.into());
        }
    }

    pub fn add_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut state = self.state.lock();
        if !state.ended {
            state.headers.push((name.into(), value.into()));
        }
    }

    /// Append to the body.
    pub fn write(&self, chunk: impl AsRef<[u8]>) {
        let mut state = self.state.lock();
        if !state.ended {
            state.body.extend_from_slice(chunk.as_ref());
        }
    }

    /// Discard anything written so far.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if !state.ended {
            state.body.clear();
            state.headers.clear();
        }
    }

    pub fn body(&self) -> Bytes {
        Bytes::from(self.state.lock().body.clone())
    }

    /// Terminate the response. Only the first call takes effect.
    pub fn end_request(&self, skip_headers: bool) {
        let mut state = self.state.lock();
        state.end_calls += 1;
        if state.ended {
            return;
        }
        state.ended = true;
        state.skip_headers = skip_headers;
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// How many times `end_request` was invoked.
    pub fn end_calls(&self) -> usize {
        self.state.lock().end_calls
    }

    /// Build the native response. `global_headers` are applied unless the
    /// request was terminated with headers suppressed.
    pub fn to_http(&self, global_headers: &BTreeMap<String, String>) -> Response<Body> {
        let state = self.state.lock();
        let mut response = Response::new(Body::from(state.body.clone()));
        *response.status_mut() = state.status;

        let headers = response.headers_mut();
        if let Some(ct) = state.content_type.as_deref().and_then(|ct| HeaderValue::from_str(ct).ok()) {
            headers.insert(header::CONTENT_TYPE, ct);
        }

        let global = global_headers
            .iter()
            .filter(|_| !state.skip_headers)
            .map(|(k, v)| (k.as_str(), v.as_str()));
        let own = state.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        for (name, value) in global.chain(own) {
            match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

//! Normalized request.
//!
//! # Responsibilities
//! - Flatten a native request (axum pipeline or raw hyper listener) into one
//!   host-agnostic shape
//! - Carry a request ID (taken from `x-request-id` when present)
//! - Keep an opaque origin record for host-specific diagnostics
//!
//! # Design Decisions
//! - Header names are case-insensitive; duplicates are last-write-wins but
//!   keep the position of the first occurrence
//! - Form data is parsed only for `application/x-www-form-urlencoded` bodies
//! - The request is immutable once the operation name is assigned

use axum::body::Bytes;
use axum::http::{header, request::Parts, Method};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Ordered name/value collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameValueMap {
    entries: Vec<(String, String)>,
    case_insensitive: bool,
}

impl NameValueMap {
    /// Collection with exact-match keys (query string, form data).
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection with case-insensitive keys (headers).
    pub fn case_insensitive() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: true,
        }
    }

    fn same_key(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| self.same_key(k, &key)) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| self.same_key(k, key))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flatten to a string map for diagnostics.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    fn from_urlencoded(input: &[u8]) -> Self {
        let mut map = Self::new();
        for (k, v) in url::form_urlencoded::parse(input) {
            map.set(k, v);
        }
        map
    }
}

/// Which native hosting API produced a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// The managed axum pipeline.
    Pipeline,
    /// The raw hyper listener.
    Listener,
}

impl HostKind {
    /// Default host environment name reported in diagnostics.
    pub fn environment(&self) -> &'static str {
        match self {
            HostKind::Pipeline => "axum-pipeline",
            HostKind::Listener => "hyper-listener",
        }
    }
}

/// Facts only the managed pipeline knows about its hosting environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOrigin {
    /// Scheme and authority, e.g. `http://localhost:8080`.
    pub left_part: String,
    /// Full request path before the handler prefix is stripped.
    pub path: String,
    /// Path the application is mounted under.
    pub application_path: String,
    /// Virtual path of the application root.
    pub application_virtual_path: String,
}

/// Opaque reference back to the native request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOrigin {
    Pipeline(PipelineOrigin),
    Listener,
}

impl HostOrigin {
    pub fn kind(&self) -> HostKind {
        match self {
            HostOrigin::Pipeline(_) => HostKind::Pipeline,
            HostOrigin::Listener => HostKind::Listener,
        }
    }

    pub fn pipeline(&self) -> Option<&PipelineOrigin> {
        match self {
            HostOrigin::Pipeline(origin) => Some(origin),
            HostOrigin::Listener => None,
        }
    }
}

/// Host-agnostic view of an inbound request.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub request_id: Uuid,
    pub verb: Method,
    /// Path relative to the handler prefix, always starting with `/`.
    pub path_info: String,
    /// Path and query as received.
    pub raw_url: String,
    pub absolute_uri: String,
    pub headers: NameValueMap,
    pub query: NameValueMap,
    pub form: NameValueMap,
    pub accept_types: Vec<String>,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub user_host_address: Option<String>,
    /// Assigned by the dispatcher once resolved.
    pub operation_name: String,
    pub body: Bytes,
    pub origin: HostOrigin,
}

impl NormalizedRequest {
    /// Build from `http` request parts.
    ///
    /// `handler_prefix` is the path segment the dispatch layer is mounted
    /// under (empty for root).
    pub fn from_parts(
        parts: &Parts,
        body: Bytes,
        peer: Option<SocketAddr>,
        handler_prefix: &str,
        origin: HostOrigin,
    ) -> Self {
        let mut headers = NameValueMap::case_insensitive();
        for (name, value) in parts.headers.iter() {
            headers.set(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let raw_url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let path = parts.uri.path();
        let query = parts
            .uri
            .query()
            .map(|q| NameValueMap::from_urlencoded(q.as_bytes()))
            .unwrap_or_default();

        let content_type = headers.get(header::CONTENT_TYPE.as_str()).map(str::to_string);
        let form = match &content_type {
            Some(ct) if ct.starts_with(FORM_URLENCODED) => NameValueMap::from_urlencoded(&body),
            _ => NameValueMap::new(),
        };
        let content_length = headers
            .get(header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(body.len() as u64);

        let accept_types = headers
            .get(header::ACCEPT.as_str())
            .map(parse_accept)
            .unwrap_or_default();

        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);

        let authority = parts
            .uri
            .authority()
            .map(|a| a.to_string())
            .or_else(|| headers.get(header::HOST.as_str()).map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        let scheme = parts.uri.scheme_str().unwrap_or("http");

        Self {
            request_id,
            verb: parts.method.clone(),
            path_info: strip_prefix(path, handler_prefix),
            absolute_uri: format!("{scheme}://{authority}{raw_url}"),
            raw_url,
            headers,
            query,
            form,
            accept_types,
            content_type,
            content_length,
            user_host_address: peer.map(|p| p.ip().to_string()),
            operation_name: String::new(),
            body,
            origin,
        }
    }

    /// Preferred response content type, from the first acceptable type.
    pub fn response_content_type(&self) -> &str {
        self.accept_types
            .iter()
            .map(String::as_str)
            .find(|t| *t != "*/*")
            .unwrap_or("application/json")
    }

    pub fn host_kind(&self) -> HostKind {
        self.origin.kind()
    }
}

fn parse_accept(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.split(';').next().unwrap_or_default().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip_prefix(path: &str, prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    let mount = format!("/{prefix}");
    match path.strip_prefix(&mount) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

//! Operation-name resolution.

use crate::http::NormalizedRequest;

/// Maps a normalized request to an operation name. An empty name means the
/// request was already handled and no handler body should run.
pub trait OperationResolver: Send + Sync + 'static {
    fn resolve(&self, request: &NormalizedRequest) -> String;
}

impl<F> OperationResolver for F
where
    F: Fn(&NormalizedRequest) -> String + Send + Sync + 'static,
{
    fn resolve(&self, request: &NormalizedRequest) -> String {
        self(request)
    }
}

/// Uses the last non-empty path segment of the path info.
///
/// `/json/reply/GetFoo` → `GetFoo`, `/` → `""`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastSegmentResolver;

impl LastSegmentResolver {
    pub fn operation_from_path(path_info: &str) -> &str {
        let path = path_info.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default()
    }
}

impl OperationResolver for LastSegmentResolver {
    fn resolve(&self, request: &NormalizedRequest) -> String {
        Self::operation_from_path(&request.path_info).to_string()
    }
}

/// Result of resolution for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub operation_name: String,
    /// The request was fully served before reaching application logic.
    pub handled_by_default: bool,
}

impl OperationDescriptor {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        Self {
            handled_by_default: operation_name.is_empty(),
            operation_name,
        }
    }

    pub fn pre_handled(mut self) -> Self {
        self.handled_by_default = true;
        self
    }
}

//! The `requestinfo` diagnostic endpoint.

use std::sync::Arc;

use crate::diagnostics::snapshot::{DiagnosticSnapshot, SnapshotAssembler};
use crate::dispatch::{HandlerError, TaskHandler};
use crate::host::AppHost;
use crate::http::{NormalizedRequest, NormalizedResponse};

/// Path segment that routes to [`RequestInfoHandler`] in debug mode.
pub const REQUEST_INFO_PATH: &str = "requestinfo";

/// Operation name the diagnostic handler reports for itself.
pub const REQUEST_INFO_OPERATION: &str = "RequestInfoHandler";

/// Writes a [`DiagnosticSnapshot`](crate::diagnostics::DiagnosticSnapshot)
/// of the live host for the current request.
///
/// A preset document, when given, replaces the request-derived part of the
/// snapshot. Factory args, the debug string and pipeline facts are always
/// refreshed from the live request.
pub struct RequestInfoHandler {
    host: Arc<AppHost>,
    request_info: Option<DiagnosticSnapshot>,
}

impl RequestInfoHandler {
    pub fn new(host: Arc<AppHost>) -> Self {
        Self { host, request_info: None }
    }

    pub fn with_request_info(mut self, request_info: DiagnosticSnapshot) -> Self {
        self.request_info = Some(request_info);
        self
    }
}

impl TaskHandler for RequestInfoHandler {
    fn request_name(&self) -> Option<&str> {
        Some(REQUEST_INFO_OPERATION)
    }

    fn process_request(
        &self,
        request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        let assembler = SnapshotAssembler::new(&self.host);
        let snapshot = match &self.request_info {
            Some(preset) => {
                let mut snapshot = preset.clone();
                assembler.apply_host_facts(&mut snapshot, request);
                snapshot
            }
            None => assembler.assemble(request, response),
        };
        snapshot.write_to(response)?;
        Ok(())
    }
}

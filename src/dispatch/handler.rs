//! Handler capability contract.

use async_trait::async_trait;

use crate::dispatch::error::{HandlerError, NotImplemented};
use crate::http::{NormalizedRequest, NormalizedResponse};

/// How a handler body executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Ordinary blocking call, wrapped in a lazy unit of work.
    Synchronous,
    /// The async entry point is the unit of work.
    NativeAsync,
}

/// An application-supplied request handler.
///
/// Implementors provide at least one entry point. The async entry point
/// defaults to calling the synchronous one.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Short type name, recorded in the last-request memory.
    fn handler_type(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Explicit operation name. Wins over resolution from the request.
    fn request_name(&self) -> Option<&str> {
        None
    }

    /// Name of the response type this handler produces, if it declares one.
    fn response_name(&self) -> Option<&str> {
        None
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Synchronous
    }

    fn process_request(
        &self,
        _request: &NormalizedRequest,
        _response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        Err(Box::new(NotImplemented {
            handler: self.handler_type().to_string(),
        }))
    }

    async fn process_request_async(
        &self,
        request: &NormalizedRequest,
        response: &NormalizedResponse,
        operation_name: &str,
    ) -> Result<(), HandlerError> {
        self.process_request(request, response, operation_name)
    }
}

/// `my_crate::module::Handler<T>` → `Handler<T>`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl TaskHandler for Plain {}

    #[test]
    fn type_names_are_shortened() {
        assert_eq!(short_type_name("a::b::GetFoo"), "GetFoo");
        assert_eq!(short_type_name("a::Wrap<b::Inner>"), "Wrap<b::Inner>");
        assert_eq!(short_type_name("Bare"), "Bare");
        assert_eq!(Plain.handler_type(), "Plain");
    }

    #[test]
    fn missing_sync_entry_point_is_an_error() {
        let req = crate::http::NormalizedRequest::from_parts(
            &axum::http::Request::get("/x").body(()).unwrap().into_parts().0,
            Default::default(),
            None,
            "",
            crate::http::HostOrigin::Listener,
        );
        let err = Plain
            .process_request(&req, &NormalizedResponse::new(), "x")
            .unwrap_err();
        assert_eq!(err.to_string(), "Plain does not implement a synchronous entry point");
    }
}

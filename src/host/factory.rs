//! Handler selection per request.
//!
//! ```text
//! debug mode + last segment "requestinfo" → RequestInfoHandler
//! registered operation name               → that handler
//! anything else                           → NotFoundHandler (404)
//! ```

use axum::http::StatusCode;
use std::sync::Arc;

use crate::diagnostics::{RequestInfoHandler, REQUEST_INFO_PATH};
use crate::dispatch::{AsyncTaskDispatcher, HandlerError, LastSegmentResolver, TaskHandler};
use crate::host::{AppHost, NativeContext};
use crate::http::{NormalizedRequest, NormalizedResponse};

/// Picks the handler for a request and wraps it in a dispatcher.
pub struct HandlerFactory {
    host: Arc<AppHost>,
}

impl HandlerFactory {
    pub fn new(host: Arc<AppHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<AppHost> {
        &self.host
    }

    pub fn get_handler(&self, ctx: &NativeContext) -> Arc<dyn TaskHandler> {
        let request = ctx.request();
        self.host
            .set_handler_factory_args(format!("{} {}", request.verb, request.raw_url));

        let last_segment = LastSegmentResolver::operation_from_path(&request.path_info);
        if self.host.debug_mode() && last_segment.eq_ignore_ascii_case(REQUEST_INFO_PATH) {
            return Arc::new(RequestInfoHandler::new(self.host.clone()));
        }

        let operation_name = self.host.resolve_operation(request);
        match self.host.handler(&operation_name) {
            Some(handler) => handler,
            None => Arc::new(NotFoundHandler),
        }
    }

    pub fn dispatcher_for(&self, ctx: &NativeContext) -> AsyncTaskDispatcher {
        AsyncTaskDispatcher::new(self.host.clone(), self.get_handler(ctx))
    }
}

/// Answers unknown operations with a plain-text 404.
pub struct NotFoundHandler;

impl TaskHandler for NotFoundHandler {
    fn process_request(
        &self,
        request: &NormalizedRequest,
        response: &NormalizedResponse,
        _operation_name: &str,
    ) -> Result<(), HandlerError> {
        response.set_status(StatusCode::NOT_FOUND);
        response.set_content_type("text/plain");
        response.write(format!(
            "Handler for Request not found: {} {}",
            request.verb, request.path_info
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::diagnostics::LastRequestMemory;

    struct Echo;
    impl TaskHandler for Echo {}

    fn ctx(path: &str) -> NativeContext {
        let (parts, _) = axum::http::Request::get(path).body(()).unwrap().into_parts();
        NativeContext::listener(&HostConfig::default(), &parts, Default::default(), None)
    }

    async fn factory(debug_mode: bool) -> HandlerFactory {
        let mut config = HostConfig::default();
        config.debug_mode = debug_mode;
        let host = AppHost::builder(config)
            .handler("GetFoo", Echo)
            .last_request_memory(Arc::new(LastRequestMemory::new()))
            .build()
            .unwrap();
        HandlerFactory::new(host)
    }

    #[tokio::test]
    async fn selects_by_operation_name() {
        let factory = factory(false).await;
        assert_eq!(factory.get_handler(&ctx("/GetFoo")).handler_type(), "Echo");
        assert_eq!(factory.get_handler(&ctx("/Missing")).handler_type(), "NotFoundHandler");
        assert_eq!(factory.host().handler_factory_args().as_deref(), Some("GET /Missing"));
    }

    #[tokio::test]
    async fn requestinfo_only_in_debug_mode() {
        let factory = factory(false).await;
        assert_eq!(factory.get_handler(&ctx("/requestinfo")).handler_type(), "NotFoundHandler");
        let factory = self::factory(true).await;
        assert_eq!(factory.get_handler(&ctx("/requestinfo")).handler_type(), "RequestInfoHandler");
    }
}

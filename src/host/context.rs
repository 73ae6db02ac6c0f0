//! Native host context.
//!
//! What a native host hands to the dispatcher: the normalized request and
//! the response sink the host will read back once the unit of work ends.

use axum::body::Bytes;
use axum::http::request::Parts;
use std::net::SocketAddr;

use crate::config::HostConfig;
use crate::http::{HostKind, HostOrigin, NormalizedRequest, NormalizedResponse, PipelineOrigin};

#[derive(Debug)]
pub struct NativeContext {
    request: NormalizedRequest,
    response: NormalizedResponse,
}

impl NativeContext {
    /// Context for a request arriving through the managed pipeline.
    pub fn pipeline(config: &HostConfig, parts: &Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let authority = parts
            .uri
            .authority()
            .map(|a| a.to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(axum::http::header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "localhost".to_string());
        let origin = HostOrigin::Pipeline(PipelineOrigin {
            left_part: format!("{}://{}", parts.uri.scheme_str().unwrap_or("http"), authority),
            path: parts.uri.path().to_string(),
            application_path: config.pipeline.application_path.clone(),
            application_virtual_path: config.pipeline.application_virtual_path.clone(),
        });
        let request = NormalizedRequest::from_parts(parts, body, peer, &config.handler_factory_path, origin);
        Self::from_request(request)
    }

    /// Context for a request arriving through the standalone listener.
    pub fn listener(config: &HostConfig, parts: &Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let request = NormalizedRequest::from_parts(
            parts,
            body,
            peer,
            &config.handler_factory_path,
            HostOrigin::Listener,
        );
        Self::from_request(request)
    }

    pub fn from_request(request: NormalizedRequest) -> Self {
        Self {
            request,
            response: NormalizedResponse::new(),
        }
    }

    pub fn kind(&self) -> HostKind {
        self.request.host_kind()
    }

    pub fn request(&self) -> &NormalizedRequest {
        &self.request
    }

    pub fn response(&self) -> &NormalizedResponse {
        &self.response
    }

    pub fn into_parts(self) -> (NormalizedRequest, NormalizedResponse) {
        (self.request, self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn pipeline_context_carries_origin() {
        let mut config = HostConfig::default();
        config.handler_factory_path = "api".into();
        config.pipeline.application_virtual_path = "/shop".into();
        let (parts, _) = Request::get("/api/GetFoo")
            .header("host", "example.com:8080")
            .body(())
            .unwrap()
            .into_parts();

        let ctx = NativeContext::pipeline(&config, &parts, Bytes::new(), None);
        assert_eq!(ctx.kind(), HostKind::Pipeline);
        assert_eq!(ctx.request().path_info, "/GetFoo");
        let origin = ctx.request().origin.pipeline().unwrap();
        assert_eq!(origin.left_part, "http://example.com:8080");
        assert_eq!(origin.path, "/api/GetFoo");
        assert_eq!(origin.application_virtual_path, "/shop");
    }

    #[test]
    fn listener_context_has_no_pipeline_origin() {
        let (parts, _) = Request::get("/GetFoo").body(()).unwrap().into_parts();
        let ctx = NativeContext::listener(&HostConfig::default(), &parts, Bytes::new(), None);
        assert_eq!(ctx.kind(), HostKind::Listener);
        assert!(ctx.request().origin.pipeline().is_none());
    }
}

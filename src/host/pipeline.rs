//! Managed pipeline host.
//!
//! # Responsibilities
//! - Serve every path through one axum router
//! - Normalize requests into a [`NativeContext`] carrying pipeline facts
//! - Drive the dispatcher through the callback bridge, or through the
//!   blocking bridge when `force_synchronous` is set
//!
//! # Design Decisions
//! - Request IDs are assigned at the edge and echoed back
//! - Faults surface as a 500 page; the dispatcher has already logged them

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::dispatch::{CompletionCallback, DispatchError, Outcome, PendingWork};
use crate::host::factory::HandlerFactory;
use crate::host::{AppHost, NativeContext};
use crate::lifecycle::Shutdown;

/// The axum-based host.
pub struct PipelineHost {
    router: Router,
}

impl PipelineHost {
    pub fn new(host: Arc<AppHost>) -> Self {
        let router = Self::build_router(host);
        Self { router }
    }

    #[allow(deprecated)]
    fn build_router(host: Arc<AppHost>) -> Router {
        let timeout = Duration::from_secs(host.config().pipeline.request_timeout_secs);
        let factory = Arc::new(HandlerFactory::new(host));
        Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(factory)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Pipeline host starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("Pipeline host stopped");
        Ok(())
    }
}

async fn dispatch_handler(State(factory): State<Arc<HandlerFactory>>, request: Request) -> Response {
    let config = factory.host().config();
    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let body = match axum::body::to_bytes(body, config.pipeline.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let ctx = NativeContext::pipeline(&config, &parts, body, peer);
    let response = ctx.response().clone();
    let dispatcher = factory.dispatcher_for(&ctx);

    let outcome: Outcome = if config.pipeline.force_synchronous {
        tokio::task::spawn_blocking(move || dispatcher.process_request_blocking(ctx))
            .await
            .unwrap_or(Err(DispatchError::Cancelled))
    } else {
        let (tx, rx) = oneshot::channel();
        let callback: CompletionCallback = Box::new(move |_: &PendingWork| {
            let _ = tx.send(());
        });
        match dispatcher.begin_process_request(ctx, Some(callback)) {
            Ok(work) => {
                let _ = rx.await;
                dispatcher.end_process_request(&work)
            }
            Err(e) => Err(e),
        }
    };

    match outcome {
        Ok(()) => response.to_http(&config.global_response_headers),
        Err(e) => fault_response(&e),
    }
}

/// The native fault page.
pub(crate) fn fault_response(error: &DispatchError) -> Response<Body> {
    tracing::warn!(error = %error, "Request faulted");
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
}

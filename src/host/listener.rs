//! Standalone listener host.
//!
//! Raw HTTP/1 over the bounded [`Listener`]. Every request is handed to the
//! dispatcher's blocking listener contract on the blocking pool.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::DispatchError;
use crate::host::factory::HandlerFactory;
use crate::host::pipeline::fault_response;
use crate::host::{AppHost, HostError, NativeContext};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener};

pub struct ListenerHost {
    factory: Arc<HandlerFactory>,
    tracker: ConnectionTracker,
}

impl ListenerHost {
    pub fn new(host: Arc<AppHost>) -> Self {
        Self {
            factory: Arc::new(HandlerFactory::new(host)),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept until shutdown, then drain open connections.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), HostError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Listener host starting");
        let mut stop = shutdown.subscribe();

        loop {
            let accepted = tokio::select! {
                _ = stop.recv() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let guard = self.tracker.track();
            let factory = self.factory.clone();
            let mut conn_stop = shutdown.subscribe();
            tokio::spawn(async move {
                let _permit = permit;
                let service = service_fn(move |request| serve_request(factory.clone(), peer, request));
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = conn_stop.recv() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), error = %e, "Connection error");
                }
            });
        }

        let drain = Duration::from_secs(self.factory.host().config().listener.drain_timeout_secs);
        if !self.tracker.wait_idle(drain).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        tracing::info!("Listener host stopped");
        Ok(())
    }
}

async fn serve_request(
    factory: Arc<HandlerFactory>,
    peer: SocketAddr,
    request: Request<Incoming>,
) -> Result<Response<Body>, Infallible> {
    let config = factory.host().config();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(Body::new(body), config.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            return Ok((StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response());
        }
    };

    let ctx = NativeContext::listener(&config, &parts, body, Some(peer));
    let response = ctx.response().clone();
    let dispatcher = factory.dispatcher_for(&ctx);
    let outcome = tokio::task::spawn_blocking(move || dispatcher.process_listener_request(ctx))
        .await
        .unwrap_or(Err(DispatchError::Cancelled));

    Ok(match outcome {
        Ok(()) => response.to_http(&config.global_response_headers),
        Err(e) => fault_response(&e),
    })
}

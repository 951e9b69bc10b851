//! HTTP server.
//!
//! # Responsibilities
//! - Accept connections through the bounded `Listener`
//! - Serve HTTP/1.1 and HTTP/2 on each connection (hyper auto builder)
//! - Wrap the dispatcher in the edge layers: trace span, request deadline,
//!   body size cap, remote address
//! - Drain in-flight connections on shutdown, up to the grace period, then
//!   abort whatever is left
//!
//! # Design Decisions
//! - One tower stack per connection; the dispatcher itself is an `Arc` clone
//! - The body cap is applied lazily (`Limited`), so handlers that never read
//!   the body pay nothing for it

use std::time::Duration;

use http_body_util::Limited;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::http::body;
use crate::http::request::RemoteAddr;
use crate::lifecycle::TaskSet;
use crate::net::{ConnectionTracker, Listener, ListenerError};

/// Error type for the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server serving one [`Dispatcher`].
pub struct HttpServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl HttpServer {
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let listener = Listener::bind(&self.config.listener).await?;
        self.run(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.router().table().len(),
            "HTTP server starting"
        );

        let tasks = TaskSet::new();
        let builder = auto::Builder::new(tasks.clone());
        let graceful = GracefulShutdown::new();
        let tracker = ConnectionTracker::new();
        let request_timeout = Duration::from_secs(self.config.timeouts.request_secs);
        let max_body_bytes = self.config.limits.max_body_bytes;

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(ListenerError::Accept(e)) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting");
                    break;
                }
            };

            let guard = tracker.open(peer);

            let service = ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    http::StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .map_request(move |mut req: http::Request<Incoming>| {
                    req.extensions_mut().insert(RemoteAddr(peer));
                    req.map(|incoming| body::boxed(Limited::new(incoming, max_body_bytes)))
                })
                .service(self.dispatcher.clone());

            let conn = builder
                .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                .into_owned();
            // Erase the connection future's type here, where lifetimes are
            // concrete; proving `Send` inside the spawned block trips a
            // higher-ranked lifetime limitation in rustc.
            let conn: std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<(), crate::error::BoxError>> + Send>,
            > = Box::pin(graceful.watch(conn));

            tasks.spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %guard.peer(),
                        error = %e,
                        "Connection ended with error"
                    );
                }
                drop(guard);
                drop(permit);
            });
        }

        drop(listener);

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tokio::select! {
            _ = graceful.shutdown() => tracing::info!("All connections drained"),
            _ = tokio::time::sleep(grace) => tracing::warn!(
                remaining = tracker.open_count(),
                "Grace period elapsed, aborting open connections"
            ),
        }

        let aborted = tasks.abort_all().await;
        if aborted > 0 {
            tracing::debug!(aborted, "Aborted connection tasks");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

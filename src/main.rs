//! switchboard demo server.
//!
//! Serves a small router over the full stack: request ids, access logging,
//! optional rate limiting, metrics and graceful shutdown.

use std::path::PathBuf;

use clap::Parser;
use http::StatusCode;

use switchboard::config::{load_config, ServerConfig};
use switchboard::dispatch::{Dispatcher, Router};
use switchboard::error::Error;
use switchboard::http::{body, HttpServer, Request, RequestExt};
use switchboard::lifecycle::{wait_for_signal, Shutdown};
use switchboard::middleware::{AccessLog, RateLimit, RequestIdMiddleware};
use switchboard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "HTTP request router with middleware chaining", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_bytes = config.limits.max_body_bytes,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = demo_router(&config)?;
    let server = HttpServer::new(config, Dispatcher::new(router));

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.serve(receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_router(config: &ServerConfig) -> Result<Router, switchboard::RouteError> {
    let max_body_bytes = config.limits.max_body_bytes;

    let mut builder = Router::builder()
        .routing_config(&config.routing)
        .middleware(RequestIdMiddleware::new())
        .middleware(AccessLog::new());
    if config.rate_limit.enabled {
        builder = builder.middleware(RateLimit::new(&config.rate_limit));
    }

    builder
        .get("/health", health)
        .get("/users/{id}", user)
        .get("/files/{*path}", file)
        .post("/echo", move |req: Request| echo(req, max_body_bytes))
        .build()
}

async fn health(_req: Request) -> Result<&'static str, Error> {
    Ok("ok")
}

async fn user(req: Request) -> Result<String, Error> {
    let id = req.param("id").unwrap_or_default();
    Ok(format!("user {id}"))
}

async fn file(req: Request) -> Result<String, Error> {
    let path = req.param("path").unwrap_or_default();
    Ok(format!("file {path}"))
}

async fn echo(req: Request, limit: usize) -> Result<(StatusCode, bytes::Bytes), Error> {
    let bytes = body::to_bytes(req.into_body(), limit).await?;
    Ok((StatusCode::OK, bytes))
}

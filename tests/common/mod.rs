//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use bytes::Bytes;
use http::Method;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;

use switchboard::config::{ListenerConfig, ServerConfig};
use switchboard::dispatch::{Dispatcher, Router};
use switchboard::error::Error;
use switchboard::http::{HttpServer, Request, Response, ServerError};
use switchboard::lifecycle::Shutdown;
use switchboard::net::Listener;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.handle.await.expect("server task panicked")
    }
}

/// Start `router` behind a real `HttpServer` on `127.0.0.1:0`.
///
/// The listener is bound before this returns, so requests can be sent
/// immediately.
pub async fn start_server(config: ServerConfig, router: Router) -> TestServer {
    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_connections: config.listener.max_connections,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let server = HttpServer::new(config, Dispatcher::new(router));
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Build an in-process request with a string body.
pub fn request(method: Method, uri: &str) -> http::Request<String> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

pub async fn body_bytes(res: Response) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_string(res: Response) -> String {
    String::from_utf8(body_bytes(res).await.to_vec()).unwrap()
}

pub async fn ok(_req: Request) -> Result<&'static str, Error> {
    Ok("ok")
}

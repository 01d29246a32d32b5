//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use region_router::discovery::{DiscoveryError, DiscoveryFuture, DiscoverySource, ServerDefinition, WatchBatch};
use region_router::{HttpServer, RouterConfig, RoutingTable, Shutdown};

/// Canned HTTP response for a mock backend.
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// The handler receives the request line (`"GET /path?query HTTP/1.1"`).
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head);
                let request_line = head.lines().next().unwrap_or_default().to_string();

                let response = f(request_line).await;
                let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
                for (name, value) in &response.headers {
                    out.push_str(&format!("{}: {}\r\n", name, value));
                }
                out.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.body.len(),
                    response.body
                ));
                let _ = socket.write_all(out.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Run the router on an ephemeral port until the returned `Shutdown` fires.
pub async fn start_router(config: RouterConfig, table: Arc<RoutingTable>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, table);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (addr, shutdown)
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// In-memory discovery source whose server list tests can swap.
#[derive(Default)]
pub struct StaticSource {
    servers: Mutex<Vec<ServerDefinition>>,
    failing: Mutex<bool>,
}

impl StaticSource {
    pub fn new(servers: Vec<ServerDefinition>) -> Self {
        Self {
            servers: Mutex::new(servers),
            failing: Mutex::new(false),
        }
    }

    pub fn set(&self, servers: Vec<ServerDefinition>) {
        *self.servers.lock().unwrap() = servers;
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

impl DiscoverySource for StaticSource {
    fn poll(&self) -> DiscoveryFuture<'_, Vec<ServerDefinition>> {
        let result = if *self.failing.lock().unwrap() {
            Err(DiscoveryError::Request("source offline".into()))
        } else {
            Ok(self.servers.lock().unwrap().clone())
        };
        Box::pin(async move { result })
    }

    fn watch(&self, _last_index: u64) -> DiscoveryFuture<'_, WatchBatch> {
        Box::pin(std::future::pending())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

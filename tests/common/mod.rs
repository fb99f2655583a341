//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};

use choice_balancer::{Balancer, Forwarder, HttpServer, ProxyConfig, Shutdown};

/// Read until the end of the request head so closing the socket does not reset it.
async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    let mut seen = Vec::new();
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                seen.extend_from_slice(&buf[..n]);
                if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A running proxy and the handles to drive it.
pub struct ProxyHandle {
    pub addr: SocketAddr,
    pub balancer: Arc<Balancer>,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    pub shutdown: Shutdown,
}

impl ProxyHandle {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(mut config: ProxyConfig) -> ProxyHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = HttpServer::new(config).unwrap();
    let balancer = server.balancer();
    let shutdown = Shutdown::new();
    let (updates, rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx, server_shutdown).await;
    });

    ProxyHandle {
        addr,
        balancer,
        updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Simulates backends with fixed service times: a=10ms, b=100ms, c=300ms.
#[derive(Debug, Default)]
pub struct LatencyForwarder {
    pub calls: AtomicUsize,
}

impl LatencyForwarder {
    pub fn latency(host: &str) -> Duration {
        match host {
            "a" => Duration::from_millis(10),
            "b" => Duration::from_millis(100),
            "c" => Duration::from_millis(300),
            _ => Duration::ZERO,
        }
    }
}

impl Forwarder for LatencyForwarder {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let host = request.uri().host().unwrap_or_default().to_string();
        Box::pin(async move {
            tokio::time::sleep(LatencyForwarder::latency(&host)).await;
            Response::new(Body::from(host))
        })
    }
}

/// Holds every request until permits are added to `gate`.
#[derive(Debug)]
pub struct GatedForwarder {
    pub gate: Arc<Semaphore>,
}

impl GatedForwarder {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
        }
    }
}

impl Forwarder for GatedForwarder {
    fn forward(&self, _request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        let gate = self.gate.clone();
        Box::pin(async move {
            match gate.acquire_owned().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Response::new(Body::from("gate closed")),
            }
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        })
    }
}

/// Never completes; used to exercise cancellation.
#[derive(Debug, Default)]
pub struct PendingForwarder;

impl Forwarder for PendingForwarder {
    fn forward(&self, _request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        Box::pin(std::future::pending())
    }
}

pub fn request() -> Request<Body> {
    Request::builder().uri("/asdf").body(Body::empty()).unwrap()
}

/// Wait for every response body to finish releasing its slot. The server
/// drops a body just after its last bytes are written, which can trail the
/// client by a moment.
pub async fn wait_drained(balancer: &Balancer) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while balancer.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

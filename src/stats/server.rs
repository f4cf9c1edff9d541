//! HTTP stats endpoint.

use super::error::{StatsError, StatsResult};
use crate::balancer::Pool;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// JSON payload for `/stats`.
#[derive(Debug, Serialize)]
struct StatsResponse {
    uptime_seconds: u64,
    total_backends: usize,
    healthy_backends: usize,
    backends: Vec<BackendStatsResponse>,
}

/// Per-backend entry in the `/stats` payload.
#[derive(Debug, Serialize)]
struct BackendStatsResponse {
    address: String,
    alive: bool,
    active_connections: usize,
    total_connections: u64,
}

/// JSON payload for `/health`.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Read-only HTTP server exposing pool statistics.
#[derive(Debug)]
pub struct StatsServer {
    /// The observed pool.
    pool: Arc<Pool>,
    /// Address to bind.
    listen_addr: String,
    /// Process start reference for uptime.
    started_at: Instant,
    /// Shutdown sender, present while running.
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl StatsServer {
    /// Create a new stats server over the given pool.
    #[must_use]
    pub fn new(pool: Arc<Pool>, listen_addr: impl Into<String>) -> Self {
        Self {
            pool,
            listen_addr: listen_addr.into(),
            started_at: Instant::now(),
            shutdown_tx: None,
        }
    }

    /// Bind and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if already running or the listener cannot bind.
    pub async fn start(&mut self) -> StatsResult<()> {
        if self.shutdown_tx.is_some() {
            return Err(StatsError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| StatsError::BindError(format!("{}: {e}", self.listen_addr)))?;

        info!(address = %self.listen_addr, "Stats server listening");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let pool = Arc::clone(&self.pool);
        let started_at = self.started_at;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, remote_addr)) => {
                                debug!(%remote_addr, "New stats connection");

                                let pool = Arc::clone(&pool);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);

                                    let service = service_fn(move |req| {
                                        let pool = Arc::clone(&pool);
                                        async move { handle_request(req, &pool, started_at) }
                                    });

                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Stats connection error: {e}");
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Stats accept error: {e}");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Stats server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not running.
    pub async fn stop(&mut self) -> StatsResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
            Ok(())
        } else {
            Err(StatsError::NotRunning)
        }
    }

    /// Check if the server is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

/// Route a stats request.
fn handle_request(
    req: Request<Incoming>,
    pool: &Pool,
    started_at: Instant,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::new(Bytes::from("Method not allowed")))
            .expect("response build failed"));
    }

    match req.uri().path() {
        "/stats" => {
            let backends: Vec<BackendStatsResponse> = pool
                .all_stats()
                .into_iter()
                .map(|s| BackendStatsResponse {
                    address: s.address,
                    alive: s.alive,
                    active_connections: s.active_connections,
                    total_connections: s.total_connections,
                })
                .collect();

            let healthy_backends = backends.iter().filter(|b| b.alive).count();
            let payload = StatsResponse {
                uptime_seconds: started_at.elapsed().as_secs(),
                total_backends: backends.len(),
                healthy_backends,
                backends,
            };

            Ok(json_response(StatusCode::OK, &payload))
        }
        "/health" => {
            if pool.healthy_count() > 0 {
                Ok(json_response(
                    StatusCode::OK,
                    &HealthResponse { status: "healthy" },
                ))
            } else {
                Ok(json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &HealthResponse {
                        status: "unhealthy",
                    },
                ))
            }
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("response build failed")),
    }
}

/// Build a JSON response.
fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(payload).expect("stats serialization failed");
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("response build failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::Backend;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn http_get(addr: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn started_server(pool: Arc<Pool>) -> (StatsServer, String) {
        // Bind to a free port first so the test knows the address.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = probe.local_addr().unwrap().to_string();
        drop(probe);

        let mut server = StatsServer::new(pool, addr.clone());
        server.start().await.unwrap();
        (server, addr)
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let pool = Arc::new(Pool::new());
        pool.add(Arc::new(Backend::new("127.0.0.1:9001")));
        pool.add(Arc::new(Backend::new("127.0.0.1:9002")));
        pool.lookup("127.0.0.1:9002").unwrap().set_alive(false);

        let (mut server, addr) = started_server(Arc::clone(&pool)).await;

        let response = http_get(&addr, "/stats").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["total_backends"], 2);
        assert_eq!(parsed["healthy_backends"], 1);
        assert_eq!(parsed["backends"][0]["address"], "127.0.0.1:9001");
        assert_eq!(parsed["backends"][1]["alive"], false);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let pool = Arc::new(Pool::new());
        pool.add(Arc::new(Backend::new("127.0.0.1:9001")));

        let (mut server, addr) = started_server(Arc::clone(&pool)).await;

        let response = http_get(&addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("healthy"));

        pool.lookup("127.0.0.1:9001").unwrap().set_alive(false);
        let response = http_get(&addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 503"));
        assert!(response.contains("unhealthy"));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found_and_method() {
        let pool = Arc::new(Pool::new());
        let (mut server, addr) = started_server(pool).await;

        let response = http_get(&addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream
            .write_all(b"POST /stats HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 405"));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let pool = Arc::new(Pool::new());
        let (mut server, _addr) = started_server(pool).await;

        assert!(server.is_running());
        assert!(matches!(
            server.start().await,
            Err(StatsError::AlreadyRunning)
        ));

        server.stop().await.unwrap();
        assert!(!server.is_running());
        assert!(matches!(server.stop().await, Err(StatsError::NotRunning)));
    }
}

//! Echo server for local demonstration.

use crate::balancer::Backend;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// A simple line-echo server standing in for a real upstream.
///
/// Each client gets a greeting naming the server, then every line comes
/// back tagged. When bound to a [`Backend`], the acceptor parks while that
/// backend is not alive so a simulated outage stops new sessions too.
pub struct EchoServer {
    /// Address to listen on.
    address: String,
    /// Balancer-side view of this server, for outage parking.
    backend: Option<Arc<Backend>>,
}

impl EchoServer {
    /// Create an echo server.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            backend: None,
        }
    }

    /// Couple the acceptor to a backend's liveness.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run(self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.address).await?;
        info!(address = %self.address, "Echo backend listening");

        loop {
            if let Some(backend) = &self.backend {
                backend.wait_until_alive().await;
            }

            match listener.accept().await {
                Ok((stream, peer)) => {
                    let tag = self.address.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, peer, &tag).await {
                            debug!(peer = %peer, error = %e, "Echo session ended");
                        }
                    });
                }
                Err(e) => {
                    warn!(address = %self.address, error = %e, "Echo accept error");
                }
            }
        }
    }
}

/// Greet, then echo back every line with the server tag.
async fn handle_client(stream: TcpStream, peer: SocketAddr, tag: &str) -> io::Result<()> {
    debug!(peer = %peer, server = %tag, "Echo client connected");

    let (read_half, mut write_half) = stream.into_split();

    write_half
        .write_all(format!("Connected to backend {tag}\n").as_bytes())
        .await?;

    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        write_half
            .write_all(format!("[{tag}] Echo: {line}\n").as_bytes())
            .await?;
    }

    debug!(peer = %peer, server = %tag, "Echo client disconnected");
    Ok(())
}

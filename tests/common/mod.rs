//! Shared helpers for the end-to-end tests.
#![allow(dead_code)]

use flowline::balancer::BalancerResult;
use flowline::config::{BackendEntry, BalancerConfig};
use flowline::LoadBalancer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// An upstream that greets each client with `tag:<addr>` and then echoes.
pub async fn tag_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(tag_serve(listener));
    (addr, handle)
}

/// Same as [`tag_server`], bound to a specific address.
pub async fn tag_server_at(addr: SocketAddr) -> JoinHandle<()> {
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(tag_serve(listener))
}

async fn tag_serve(listener: TcpListener) {
    let addr = listener.local_addr().unwrap();
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            break;
        };
        tokio::spawn(async move {
            if stream
                .write_all(format!("tag:{addr}\n").as_bytes())
                .await
                .is_err()
            {
                return;
            }
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stream.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// An address nothing is listening on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Balancer configuration over the given backends.
pub fn config_for(backends: &[(SocketAddr, u32)], health_check_interval: Duration) -> BalancerConfig {
    BalancerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        backends: backends
            .iter()
            .map(|(addr, weight)| BackendEntry::new(addr.to_string(), *weight))
            .collect(),
        health_check_interval,
        connect_timeout: Duration::from_millis(500),
        ..BalancerConfig::default()
    }
}

/// Start a balancer and wait for its listener to come up.
pub async fn start_balancer(
    config: BalancerConfig,
) -> (Arc<LoadBalancer>, SocketAddr, JoinHandle<BalancerResult<()>>) {
    let balancer = Arc::new(LoadBalancer::new(config));

    let runner = {
        let balancer = Arc::clone(&balancer);
        tokio::spawn(async move { balancer.start().await })
    };

    let addr = loop {
        if let Some(addr) = balancer.local_addr() {
            break addr;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    (balancer, addr, runner)
}

/// Connect through the balancer and read the upstream's greeting line.
pub async fn connect_and_read_tag(addr: SocketAddr) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut greeting = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.unwrap();
        if byte[0] == b'\n' {
            break;
        }
        greeting.push(byte[0]);
    }

    let tag = String::from_utf8(greeting).unwrap();
    (stream, tag.strip_prefix("tag:").unwrap().to_string())
}

/// Poll until `predicate` holds or the deadline passes.
pub async fn wait_for(mut predicate: impl FnMut() -> bool, deadline: Duration) {
    let start = tokio::time::Instant::now();
    while !predicate() {
        assert!(
            start.elapsed() < deadline,
            "condition not reached within {deadline:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//! End-to-end failure handling: passive marking, recovery, shutdown.

mod common;

use common::{
    config_for, connect_and_read_tag, dead_addr, start_balancer, tag_server, tag_server_at,
    wait_for,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const NO_HEALTH_CHECKS: Duration = Duration::from_secs(600);

#[tokio::test]
async fn failover_marks_dead_backend_and_retries() {
    let a = dead_addr().await;
    let (b, _b_task) = tag_server().await;

    let (balancer, addr, _runner) =
        start_balancer(config_for(&[(a, 1), (b, 1)], NO_HEALTH_CHECKS)).await;

    // Round-robin picks the dead backend first; the dial failure marks it
    // down and the retry lands on the live one.
    let (stream, tag) = connect_and_read_tag(addr).await;
    assert_eq!(tag, b.to_string());
    drop(stream);

    assert!(!balancer.pool().lookup(&a.to_string()).unwrap().is_alive());
    assert!(balancer.pool().lookup(&b.to_string()).unwrap().is_alive());

    // Subsequent clients skip the dead backend entirely.
    let (stream, tag) = connect_and_read_tag(addr).await;
    assert_eq!(tag, b.to_string());
    drop(stream);

    balancer.stop();
}

#[tokio::test]
async fn all_backends_down_closes_client_silently() {
    let a = dead_addr().await;
    let b = dead_addr().await;

    let (balancer, addr, _runner) =
        start_balancer(config_for(&[(a, 1), (b, 1)], NO_HEALTH_CHECKS)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();
    assert!(received.is_empty());

    assert!(!balancer.pool().lookup(&a.to_string()).unwrap().is_alive());
    assert!(!balancer.pool().lookup(&b.to_string()).unwrap().is_alive());

    balancer.stop();
}

#[tokio::test]
async fn active_probe_recovers_backend() {
    let a = dead_addr().await;

    let (balancer, addr, _runner) =
        start_balancer(config_for(&[(a, 1)], Duration::from_millis(100))).await;

    let backend = balancer.pool().lookup(&a.to_string()).unwrap();
    wait_for(|| !backend.is_alive(), Duration::from_secs(2)).await;
    let checked_while_down = backend.last_health_check();

    // The backend comes up between ticks; the next probe revives it.
    let _upstream = tag_server_at(a).await;
    wait_for(|| backend.is_alive(), Duration::from_secs(2)).await;
    assert!(backend.last_health_check() > checked_while_down);

    let (stream, tag) = connect_and_read_tag(addr).await;
    assert_eq!(tag, a.to_string());
    drop(stream);

    balancer.stop();
}

#[tokio::test]
async fn severing_terminates_in_flight_session() {
    let (a, _a_task) = tag_server().await;

    let (balancer, addr, _runner) = start_balancer(config_for(&[(a, 1)], NO_HEALTH_CHECKS)).await;

    let (mut stream, _tag) = connect_and_read_tag(addr).await;
    let backend = balancer.pool().lookup(&a.to_string()).unwrap();
    assert_eq!(backend.active_connections(), 1);

    backend.set_alive(false);

    // The balancer drops both sockets; the client observes EOF.
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
        .await
        .expect("session should be severed promptly")
        .unwrap();
    assert_eq!(backend.active_connections(), 0);

    balancer.stop();
}

#[tokio::test]
async fn stop_leaves_sessions_running() {
    let (a, _a_task) = tag_server().await;

    let (balancer, addr, runner) = start_balancer(config_for(&[(a, 1)], NO_HEALTH_CHECKS)).await;

    let (mut stream, _tag) = connect_and_read_tag(addr).await;

    balancer.stop();
    let result = tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    // The listener is gone...
    assert!(TcpStream::connect(addr).await.is_err());

    // ...but the in-flight session still proxies.
    stream.write_all(b"still here").await.unwrap();
    let mut echo = [0u8; 10];
    stream.read_exact(&mut echo).await.unwrap();
    assert_eq!(&echo, b"still here");
}

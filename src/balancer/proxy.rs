//! Bidirectional byte relay between two established sockets.

use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Per-direction copy buffer size.
pub const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Pump bytes between `client` and `upstream` until both directions reach
/// end of stream.
///
/// When one direction sees EOF, the write side of its destination is shut
/// down so the peer observes EOF in turn and the opposite direction drains
/// naturally. Returns `(client_to_upstream, upstream_to_client)` byte
/// counts on a clean close, or the first non-EOF error either direction
/// hit. Both sockets are closed on return in every case.
pub async fn relay(mut client: TcpStream, mut upstream: TcpStream) -> io::Result<(u64, u64)> {
    let (mut client_read, mut client_write) = client.split();
    let (mut upstream_read, mut upstream_write) = upstream.split();

    let to_upstream = async {
        let mut total = 0u64;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            match client_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    upstream_write.write_all(&buf[..n]).await?;
                    total += n as u64;
                }
                Err(e) => return Err(e),
            }
        }
        upstream_write.shutdown().await?;
        Ok(total)
    };

    let to_client = async {
        let mut total = 0u64;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            match upstream_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    client_write.write_all(&buf[..n]).await?;
                    total += n as u64;
                }
                Err(e) => return Err(e),
            }
        }
        client_write.shutdown().await?;
        Ok(total)
    };

    let (sent, received) = tokio::join!(to_upstream, to_client);
    Ok((sent?, received?))
}

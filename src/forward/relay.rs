//! Per-connection relay between an accepted local socket and a tunnel channel.
//!
//! Each direction is copied by its own task. Whichever direction finishes
//! first cancels the other, and both write halves are shut down, so the
//! local socket and the remote channel always close together. Some clients
//! never notice a one-sided tunnel teardown, which would otherwise leave the
//! surviving direction blocked forever.

use crate::error::Result;
use crate::forward::pool::SessionPool;
use crate::rule::ForwardingRule;
use crate::tunnel::{Connector, TunnelSession};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Upper bound on flushing a write half once the relay is tearing down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the local connection to the remote channel.
    pub upstream_bytes: u64,
    /// Bytes copied from the remote channel to the local connection.
    pub downstream_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => f.write_str("local->remote"),
            Direction::Downstream => f.write_str("remote->local"),
        }
    }
}

/// Serve one accepted connection for `rule`.
///
/// On failure `local` is dropped (closing it) before the error is returned.
/// A channel-open failure also evicts the session from the pool so the next
/// connection re-dials instead of reusing a dead session.
pub async fn serve<C, L>(
    pool: &SessionPool<C>,
    rule: &ForwardingRule,
    local: L,
    peer: SocketAddr,
) -> Result<RelayStats>
where
    C: Connector,
    L: AsyncRead + AsyncWrite + Send + 'static,
{
    let session = pool.acquire(&rule.group).await?;

    let remote = match session.open_channel(&rule.remote, peer).await {
        Ok(stream) => stream,
        Err(e) => {
            pool.invalidate(&rule.group, &session).await;
            return Err(e);
        }
    };

    debug!(%peer, remote = %rule.remote, group = %rule.group, "channel open");
    let stats = relay(local, remote).await;
    debug!(
        %peer,
        remote = %rule.remote,
        upstream_bytes = stats.upstream_bytes,
        downstream_bytes = stats.downstream_bytes,
        "relay closed"
    );

    // The session stays referenced until its channel is done with.
    drop(session);
    Ok(stats)
}

/// Copy bytes both ways until either side ends, then close both.
///
/// Returns once both directions have stopped and every half is dropped.
pub async fn relay<L, R>(local: L, remote: R) -> RelayStats
where
    L: AsyncRead + AsyncWrite + Send + 'static,
    R: AsyncRead + AsyncWrite + Send + 'static,
{
    let (local_read, local_write) = tokio::io::split(local);
    let (remote_read, remote_write) = tokio::io::split(remote);
    let closed = CancellationToken::new();

    let upstream = tokio::spawn(pipe(
        Direction::Upstream,
        local_read,
        remote_write,
        closed.clone(),
    ));
    let downstream = tokio::spawn(pipe(
        Direction::Downstream,
        remote_read,
        local_write,
        closed,
    ));

    let (upstream, downstream) = tokio::join!(upstream, downstream);

    RelayStats {
        upstream_bytes: upstream.unwrap_or(0),
        downstream_bytes: downstream.unwrap_or(0),
    }
}

async fn pipe<Rd, Wr>(
    direction: Direction,
    mut reader: Rd,
    mut writer: Wr,
    closed: CancellationToken,
) -> u64
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = tokio::select! {
            _ = closed.cancelled() => {
                debug!(%direction, "peer direction closed");
                break;
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(%direction, "source reached EOF");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    // Expected when the other direction tears the stream down.
                    debug!(%direction, error = %e, "read failed");
                    break;
                }
            },
        };

        let written = tokio::select! {
            _ = closed.cancelled() => {
                debug!(%direction, "peer direction closed mid-write");
                break;
            }
            written = writer.write_all(&buf[..n]) => written,
        };

        if let Err(e) = written {
            debug!(%direction, error = %e, "write failed");
            break;
        }
        total += n as u64;
    }

    closed.cancel();
    if let Ok(Err(e)) = tokio::time::timeout(SHUTDOWN_TIMEOUT, writer.shutdown()).await {
        debug!(%direction, error = %e, "shutdown failed");
    }

    debug!(%direction, bytes = total, "direction finished");
    total
}

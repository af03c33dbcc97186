//! The seam between forwarding and the tunnel protocol.
//!
//! A [`Connector`] dials an [`Endpoint`] and yields a [`TunnelSession`]; a
//! session opens any number of independent byte-stream channels. The SSH
//! implementation lives in [`crate::ssh`]; tests plug in in-memory stubs.

use crate::addr::HostPort;
use crate::endpoint::Endpoint;
use crate::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: TunnelSession;

    /// Establish and authenticate a new session to `endpoint`.
    async fn dial(&self, endpoint: &Endpoint) -> Result<Self::Session>;
}

/// An authenticated, multiplexing tunnel session.
///
/// Implementations must allow concurrent `open_channel` calls from many tasks.
#[async_trait]
pub trait TunnelSession: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Open a channel to `remote`. `originator` is the local peer being relayed.
    async fn open_channel(&self, remote: &HostPort, originator: SocketAddr)
        -> Result<Self::Stream>;

    /// True once the underlying connection is known to be gone.
    fn is_closed(&self) -> bool;
}

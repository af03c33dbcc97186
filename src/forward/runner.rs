use crate::error::{RelayError, Result};
use crate::forward::pool::SessionPool;
use crate::forward::relay;
use crate::rule::ForwardingRule;
use crate::tunnel::Connector;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) cannot spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A running rule's accept loop. Dropping the handle stops the loop.
#[derive(Debug)]
pub struct RuleHandle {
    pub rule: Arc<ForwardingRule>,
    pub local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RuleHandle {
    /// Stop accepting and close the listener. Relays already running are left alone.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Stop accepting and wait for the listener to be dropped.
    pub async fn shutdown_and_wait(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Owns the listener for one forwarding rule.
pub struct RuleRunner<C: Connector> {
    rule: Arc<ForwardingRule>,
    listener: TcpListener,
    pool: Arc<SessionPool<C>>,
}

impl<C: Connector> RuleRunner<C> {
    pub async fn bind(rule: ForwardingRule, pool: Arc<SessionPool<C>>) -> Result<Self> {
        let addr = rule.bind.to_string();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;

        Ok(Self {
            rule: Arc::new(rule),
            listener,
            pool,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawn the accept loop.
    pub fn spawn(self) -> Result<RuleHandle> {
        let local_addr = self.local_addr()?;
        let rule = self.rule.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(
            "Forwarding {} -> {} via {}",
            local_addr, rule.remote, rule.group
        );

        let task = tokio::spawn(self.run(shutdown_rx));

        Ok(RuleHandle {
            rule,
            local_addr,
            shutdown_tx,
            task,
        })
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let bind = self.rule.bind.clone();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(%peer, %bind, "accepted connection");
                            let pool = self.pool.clone();
                            let rule = self.rule.clone();

                            tokio::spawn(async move {
                                if let Err(e) = relay::serve(&pool, &rule, stream, peer).await {
                                    warn!(%peer, rule = %rule, "connection dropped: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!(%bind, "Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!(%bind, "Shutting down listener");
                    break;
                }
            }
        }
    }
}

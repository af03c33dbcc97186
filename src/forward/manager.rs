use crate::error::RelayError;
use crate::forward::pool::SessionPool;
use crate::forward::runner::{RuleHandle, RuleRunner};
use crate::rule::ForwardingRule;
use crate::tunnel::Connector;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// A rule that could not be started, with the reason.
#[derive(Debug)]
pub struct RuleFailure {
    pub rule: ForwardingRule,
    pub error: RelayError,
}

/// Starts and owns one accept loop per forwarding rule.
///
/// Rules fail independently: an unknown group or a bind error only skips the
/// rule it belongs to.
pub struct ForwardManager<C: Connector> {
    pool: Arc<SessionPool<C>>,
    rules: Vec<RuleHandle>,
    failures: Vec<RuleFailure>,
}

impl<C: Connector> ForwardManager<C> {
    pub fn new(pool: Arc<SessionPool<C>>) -> Self {
        Self {
            pool,
            rules: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Start every rule in order, recording the ones that fail.
    #[instrument(name = "start_rules", skip(self, rules), fields(rule_count = rules.len()))]
    pub async fn start(&mut self, rules: Vec<ForwardingRule>) {
        for rule in rules {
            if let Err(error) = self.add_rule(rule.clone()).await {
                error!("Failed to start rule {}: {}", rule, error);
                self.failures.push(RuleFailure { rule, error });
            }
        }

        info!(
            "{} forwarding rules active, {} failed",
            self.rules.len(),
            self.failures.len()
        );
    }

    /// Start a single rule, returning the bound local address.
    pub async fn add_rule(&mut self, rule: ForwardingRule) -> Result<SocketAddr, RelayError> {
        self.pool.registry().resolve(&rule.group)?;

        let handle = RuleRunner::bind(rule, self.pool.clone()).await?.spawn()?;
        let local_addr = handle.local_addr;
        self.rules.push(handle);
        Ok(local_addr)
    }

    pub fn active_rules(&self) -> &[RuleHandle] {
        &self.rules
    }

    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    pub fn pool(&self) -> &Arc<SessionPool<C>> {
        &self.pool
    }

    /// Stop every accept loop and wait for the listeners to close.
    pub async fn shutdown(&mut self) {
        info!("Shutting down all forwarding rules");
        for handle in self.rules.drain(..) {
            handle.shutdown_and_wait().await;
        }
    }
}

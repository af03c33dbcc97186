//! Lazily dialed, shared tunnel sessions, one per upstream group.
//!
//! The outer map lock is only held to find or create a group's slot. Each
//! slot has its own async lock held while that group dials, so concurrent
//! first use of a group produces a single dial and other groups are never
//! blocked behind it.

use crate::endpoint::EndpointRegistry;
use crate::error::Result;
use crate::tunnel::{Connector, TunnelSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type Slot<S> = Arc<tokio::sync::Mutex<Option<Arc<S>>>>;

pub struct SessionPool<C: Connector> {
    connector: C,
    registry: Arc<EndpointRegistry>,
    slots: Mutex<HashMap<String, Slot<C::Session>>>,
}

impl<C: Connector> SessionPool<C> {
    pub fn new(connector: C, registry: Arc<EndpointRegistry>) -> Self {
        Self {
            connector,
            registry,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn slot(&self, group: &str) -> Slot<C::Session> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Return the live session for `group`, dialing a new one if there is
    /// none or the cached one has closed. Failed dials are not cached.
    pub async fn acquire(&self, group: &str) -> Result<Arc<C::Session>> {
        let endpoint = self.registry.resolve(group)?;
        let slot = self.slot(group);
        let mut cached = slot.lock().await;

        if let Some(session) = cached.as_ref() {
            if !session.is_closed() {
                return Ok(session.clone());
            }
            warn!(group, "cached session closed, re-dialing");
            *cached = None;
        }

        debug!(group, address = %endpoint.address, "dialing upstream");
        let session = Arc::new(self.connector.dial(endpoint).await?);
        info!(group, "upstream session ready");
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session for `group` if it is still `session`.
    ///
    /// A relay that failed against an older session cannot evict a newer one.
    pub async fn invalidate(&self, group: &str, session: &Arc<C::Session>) {
        let slot = self.slot(group);
        let mut cached = slot.lock().await;
        if cached
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            debug!(group, "evicting cached session");
            *cached = None;
        }
    }

    /// Whether a session is currently cached for `group`.
    pub async fn is_cached(&self, group: &str) -> bool {
        let slot = self.slot(group);
        let cached = slot.lock().await;
        cached.is_some()
    }
}

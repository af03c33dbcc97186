//! TOML configuration loading.
//!
//! The file layout is:
//!
//! ```toml
//! title = "office"
//!
//! [ssh]
//! keepalive_interval_secs = 15
//!
//! [[server]]
//! group = "A"
//! addr = "127.0.0.1:2222"
//! user = "u"
//! auth = "secret"
//!
//! [[inner]]
//! group = "A"
//! bind = "127.0.0.1:9000"
//! addr = "10.0.0.5:80"
//! ```
//!
//! `[[server]]` entries become [`Endpoint`]s and `[[inner]]` entries become
//! [`ForwardingRule`]s. Rules naming an unknown group are kept here and
//! rejected individually when forwarding starts.

use crate::addr::HostPort;
use crate::endpoint::{Credential, Endpoint, EndpointRegistry, DEFAULT_PASSWORD_THRESHOLD};
use crate::error::{RelayError, Result};
use crate::rule::ForwardingRule;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "main.toml";

/// SSH client tuning shared by every upstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Seconds between keepalive requests; 0 disables keepalives.
    pub keepalive_interval_secs: u64,
    /// Unanswered keepalives before the session is considered dead.
    pub keepalive_max: usize,
    /// Seconds of inactivity before russh drops the session; 0 disables.
    pub inactivity_timeout_secs: u64,
    /// Upper bound on TCP connect + handshake + authentication.
    pub connect_timeout_secs: u64,
    /// Auth strings shorter than this (and not naming a file) are passwords.
    pub key_password_threshold: usize,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: 15,
            keepalive_max: 3,
            inactivity_timeout_secs: 0,
            connect_timeout_secs: 10,
            key_password_threshold: DEFAULT_PASSWORD_THRESHOLD,
        }
    }
}

impl SshSettings {
    pub fn keepalive_interval(&self) -> Option<Duration> {
        non_zero_secs(self.keepalive_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.inactivity_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    title: Option<String>,
    #[serde(default)]
    ssh: SshSettings,
    #[serde(default)]
    server: Vec<RawServer>,
    #[serde(default)]
    inner: Vec<RawInner>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    group: String,
    addr: HostPort,
    user: String,
    #[serde(default)]
    auth: String,
}

#[derive(Debug, Deserialize)]
struct RawInner {
    group: String,
    bind: HostPort,
    addr: HostPort,
}

/// Fully loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub title: Option<String>,
    pub ssh: SshSettings,
    pub registry: EndpointRegistry,
    pub rules: Vec<ForwardingRule>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loading configuration from {:?}", path);
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| RelayError::Config(format!("invalid configuration: {}", e)))?;

        let threshold = raw.ssh.key_password_threshold;
        let mut endpoints = Vec::with_capacity(raw.server.len());
        for server in raw.server {
            if server.group.trim().is_empty() {
                return Err(RelayError::Config(format!(
                    "server {} has an empty group",
                    server.addr
                )));
            }
            if server.user.trim().is_empty() {
                return Err(RelayError::Config(format!(
                    "server group '{}' has an empty user",
                    server.group
                )));
            }
            let credential = Credential::classify(&server.auth, threshold);
            debug!(group = %server.group, kind = credential.kind(), "classified credential");
            endpoints.push(Endpoint {
                group: server.group,
                address: server.addr,
                user: server.user,
                credential,
            });
        }
        let registry = EndpointRegistry::new(endpoints)?;

        let rules = raw
            .inner
            .into_iter()
            .map(|inner| ForwardingRule::new(inner.group, inner.bind, inner.addr))
            .collect::<Vec<_>>();

        debug!(
            "Loaded {} upstream groups and {} forwarding rules",
            registry.len(),
            rules.len()
        );

        Ok(Self {
            title: raw.title,
            ssh: raw.ssh,
            registry,
            rules,
        })
    }
}

use crate::addr::HostPort;
use std::fmt;

/// Binds a local listen address to a remote address reached through a group's tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRule {
    pub group: String,
    pub bind: HostPort,
    pub remote: HostPort,
}

impl ForwardingRule {
    pub fn new(group: impl Into<String>, bind: HostPort, remote: HostPort) -> Self {
        Self {
            group: group.into(),
            bind,
            remote,
        }
    }
}

impl fmt::Display for ForwardingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} via {}", self.bind, self.remote, self.group)
    }
}

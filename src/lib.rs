//! Forward local TCP listeners to remote addresses through shared SSH tunnels.
//!
//! Each `[[server]]` in the configuration names an upstream SSH endpoint and
//! each `[[inner]]` rule binds a local address whose connections are relayed
//! over a `direct-tcpip` channel on that upstream's session. Sessions are
//! dialed on first use and shared by every rule naming the same group.

pub mod addr;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod forward;
pub mod rule;
pub mod ssh;
pub mod tunnel;

pub use addr::HostPort;
pub use config::{Config, SshSettings};
pub use endpoint::{Credential, Endpoint, EndpointRegistry};
pub use error::{RelayError, Result};
pub use forward::{ForwardManager, RelayStats, RuleHandle, SessionPool};
pub use rule::ForwardingRule;
pub use tunnel::{Connector, TunnelSession};

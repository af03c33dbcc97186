//! Local listeners, the shared session pool, and the per-connection relay.

pub mod manager;
pub mod pool;
pub mod relay;
pub mod runner;

pub use manager::{ForwardManager, RuleFailure};
pub use pool::SessionPool;
pub use relay::{relay, serve, RelayStats};
pub use runner::{RuleHandle, RuleRunner};

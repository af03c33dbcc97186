//! SSH implementation of the tunnel seam, built on russh.

pub mod auth;
pub mod client;
pub mod handler;

pub use auth::AuthMethod;
pub use client::{SshConnector, SshSession};
pub use handler::ClientHandler;

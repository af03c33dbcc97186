use russh::client::Handler;
use russh::keys::{HashAlg, PublicKey};
use tracing::debug;

/// russh callbacks for one upstream session.
#[derive(Debug)]
pub struct ClientHandler {
    group: String,
}

impl ClientHandler {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }
}

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host keys are not pinned: every upstream key is accepted.
        debug!(
            group = %self.group,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting server host key"
        );
        Ok(true)
    }
}

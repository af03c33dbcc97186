//! Turning an endpoint [`Credential`] into a russh authentication attempt.

use crate::endpoint::{Credential, Endpoint};
use crate::error::{RelayError, Result};
use crate::ssh::handler::ClientHandler;
use russh::client::Handle;
use russh::keys::{decode_secret_key, load_secret_key, PrivateKey, PrivateKeyWithHashAlg};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A credential with its key material loaded and parsed.
#[derive(Clone)]
pub enum AuthMethod {
    Password(String),
    PublicKey(Arc<PrivateKey>),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PublicKey(key) => write!(f, "PublicKey({})", key.algorithm()),
        }
    }
}

impl AuthMethod {
    /// Load key material for `endpoint`. Unreadable or unparseable keys are
    /// reported as [`RelayError::Key`].
    pub fn resolve(endpoint: &Endpoint) -> Result<Self> {
        let key_error = |message: String| RelayError::Key {
            group: endpoint.group.clone(),
            message,
        };

        match &endpoint.credential {
            Credential::Password(password) => Ok(AuthMethod::Password(password.clone())),
            Credential::KeyFile(path) => load_secret_key(path, None)
                .map(|key| AuthMethod::PublicKey(Arc::new(key)))
                .map_err(|e| key_error(format!("failed to load {}: {}", path.display(), e))),
            Credential::InlineKey(text) => decode_secret_key(text, None)
                .map(|key| AuthMethod::PublicKey(Arc::new(key)))
                .map_err(|e| key_error(format!("failed to parse inline key: {}", e))),
        }
    }

    pub async fn authenticate(
        self,
        handle: &mut Handle<ClientHandler>,
        group: &str,
        user: &str,
    ) -> Result<()> {
        let auth_error = |message: String| RelayError::Auth {
            group: group.to_string(),
            message,
        };

        let result = match self {
            AuthMethod::Password(password) => {
                debug!(group, user, "trying password authentication");
                handle
                    .authenticate_password(user, password)
                    .await
                    .map_err(|e| auth_error(e.to_string()))?
            }
            AuthMethod::PublicKey(key) => {
                debug!(
                    group,
                    user,
                    algorithm = %key.algorithm(),
                    "trying public key authentication"
                );
                let key_with_hash = PrivateKeyWithHashAlg::new(key, None);
                handle
                    .authenticate_publickey(user, key_with_hash)
                    .await
                    .map_err(|e| auth_error(e.to_string()))?
            }
        };

        if result.success() {
            Ok(())
        } else {
            Err(auth_error(format!("server rejected credentials for user '{}'", user)))
        }
    }
}

//! Named upstream endpoints and the registry that resolves group names to them.

use crate::addr::HostPort;
use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Auth strings at least this long are treated as inline key material when
/// they do not name a file.
pub const DEFAULT_PASSWORD_THRESHOLD: usize = 50;

/// How an endpoint authenticates. Classified once when the registry is built.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    KeyFile(PathBuf),
    InlineKey(String),
}

impl Credential {
    /// Classify a raw `auth` value.
    ///
    /// An existing file wins, then short strings are passwords, and anything
    /// else is taken as the key text itself.
    pub fn classify(auth: &str, password_threshold: usize) -> Self {
        let path = Path::new(auth);
        if !auth.is_empty() && path.is_file() {
            Credential::KeyFile(path.to_path_buf())
        } else if auth.chars().count() < password_threshold {
            Credential::Password(auth.to_string())
        } else {
            Credential::InlineKey(auth.to_string())
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::KeyFile(_) => "key-file",
            Credential::InlineKey(_) => "inline-key",
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credential::InlineKey(_) => f.write_str("InlineKey(<redacted>)"),
        }
    }
}

/// Connection parameters for one named upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub group: String,
    pub address: HostPort,
    pub user: String,
    pub credential: Credential,
}

/// Read-only map from group name to [`Endpoint`].
#[derive(Debug, Default, Clone)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointRegistry {
    /// Build the registry. Duplicate group names are rejected.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self> {
        let mut map = HashMap::new();
        for endpoint in endpoints {
            if map.contains_key(&endpoint.group) {
                return Err(RelayError::Config(format!(
                    "duplicate server group '{}'",
                    endpoint.group
                )));
            }
            map.insert(endpoint.group.clone(), endpoint);
        }
        Ok(Self { endpoints: map })
    }

    pub fn resolve(&self, group: &str) -> Result<&Endpoint> {
        self.endpoints
            .get(group)
            .ok_or_else(|| RelayError::UnknownGroup(group.to_string()))
    }

    pub fn contains(&self, group: &str) -> bool {
        self.endpoints.contains_key(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

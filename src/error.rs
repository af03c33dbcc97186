use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown upstream group '{0}'")]
    UnknownGroup(String),

    #[error("SSH connection to group '{group}' failed: {message}")]
    Dial { group: String, message: String },

    #[error("SSH authentication for group '{group}' failed: {message}")]
    Auth { group: String, message: String },

    #[error("SSH key error for group '{group}': {message}")]
    Key { group: String, message: String },

    #[error("Failed to open channel to {remote} via group '{group}': {message}")]
    ChannelOpen {
        group: String,
        remote: String,
        message: String,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// True for failures raised while establishing a tunnel session.
    pub fn is_dial_error(&self) -> bool {
        matches!(
            self,
            RelayError::Dial { .. } | RelayError::Auth { .. } | RelayError::Key { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

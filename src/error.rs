use thiserror::Error;

/// Every way a write can fail. Each call that touches the network returns its
/// own `Result`, so concurrent writers never see each other's errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The point cannot be rendered as line protocol. Never sent over the wire.
    #[error("cannot encode point: {0}")]
    Encoding(String),

    /// The endpoint cannot be built from the client configuration.
    #[error("invalid write endpoint: {0}")]
    Config(String),

    /// No response was received (connection failure, timeout).
    #[error("write request failed without a response: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A response was received with a non-2xx status.
    #[error("server rejected write with status {status}: {body}")]
    Server { status: u16, body: String },
}

impl WriteError {
    /// Status code of a server-side rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            WriteError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, WriteError::Transport(_))
    }
}

pub type Result<T, E = WriteError> = std::result::Result<T, E>;

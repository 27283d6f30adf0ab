use crate::session::{SendError, SessionError};

/// Core error type for the panel bot.
///
/// Adapter crates map their specific errors into this type so the core can
/// tell user-facing failures (rendered into replies) from transport failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external error: {0}")]
    External(String),

    /// The chat backend closed the update stream for good (revoked token, etc).
    #[error("transport closed: {0}")]
    TransportClosed(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Send(#[from] SendError),
}

pub type Result<T> = std::result::Result<T, Error>;

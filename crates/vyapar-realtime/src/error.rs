//! # Realtime Error Types
//!
//! Failures of the kitchen display channel. None of these are visible to
//! the POS caller whose change triggered a broadcast: delivery is
//! best-effort.

use thiserror::Error;

/// Result type alias for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Message could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client sent something that is not a kitchen display command.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The socket failed while sending or receiving.
    #[error("Socket error: {0}")]
    Socket(String),

    /// The session's outgoing queue is gone (session ended).
    #[error("Session channel closed")]
    ChannelClosed,
}

impl RealtimeError {
    /// Short machine-readable code for error replies.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::Serialization(_) | RealtimeError::Protocol(_) => "BAD_MESSAGE",
            RealtimeError::Socket(_) | RealtimeError::ChannelClosed => "SESSION_CLOSED",
        }
    }
}

//! Error types for the poker room client.

use thiserror::Error;

/// Errors that can occur when using the poker room client.
#[derive(Debug, Error)]
pub enum PokerRoomError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted to send an intent, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// The server rejected a request.
    #[error("server error: {message}")]
    ServerError {
        /// Human-readable error message from the server.
        message: String,
    },

    /// A pushed snapshot or delta contradicts the room invariants.
    ///
    /// The local mirror is left untouched when this is returned.
    #[error("invalid room state: {0}")]
    InvalidState(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP request against the REST surface failed.
    #[cfg(feature = "http-api")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized [`Result`] type for poker room client operations.
pub type Result<T> = std::result::Result<T, PokerRoomError>;

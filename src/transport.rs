//! Transport abstraction for the poker room protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and the room server. Every room event and intent is one JSON text
//! message, so implementations handle message framing internally (WebSocket
//! frames, length-prefixed TCP, an in-process channel, ...).
//!
//! Connection setup is not part of this trait. Construct a connected transport
//! externally, then pass it to `PokerRoomClient::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use poker_room_client::error::PokerRoomError;
//! use poker_room_client::transport::Transport;
//! use tokio::sync::mpsc;
//!
//! struct ChannelTransport {
//!     tx: mpsc::UnboundedSender<String>,
//!     rx: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, message: String) -> Result<(), PokerRoomError> {
//!         self.tx
//!             .send(message)
//!             .map_err(|e| PokerRoomError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, PokerRoomError>> {
//!         self.rx.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PokerRoomError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PokerRoomError;

/// A bidirectional text message transport for the poker room protocol.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the client's
/// transport loop polls it inside `tokio::select!`.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), PokerRoomError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, PokerRoomError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), PokerRoomError>;
}

//! Transport implementations for the poker room protocol.
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), poker_room_client::PokerRoomError> {
//! use poker_room_client::{PokerRoomClient, PokerRoomConfig, WebSocketTransport};
//!
//! let ws = WebSocketTransport::connect("ws://localhost:5000/room").await?;
//! let (client, mut events) =
//!     PokerRoomClient::start(ws, PokerRoomConfig::new("3F2A9C1B", "alice"));
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;

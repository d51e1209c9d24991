//! # Poker Room Client
//!
//! Transport-agnostic Rust client and view controller for a planning poker
//! estimation room.
//!
//! The room server owns everything that matters: membership, votes, consensus
//! and the round lifecycle. This crate mirrors what the server pushes,
//! projects it into a view model and forwards the local user's intents.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any backend
//! - **Wire-compatible**: `{"event": ..., "data": ...}` JSON frames matching the room server
//! - **WebSocket built-in**: default `transport-websocket` feature provides `WebSocketTransport`
//! - **Pure core**: [`reducer::reduce`] and [`render::render`] are plain functions, easy to test
//! - **REST surface**: default `http-api` feature provides [`RestClient`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use poker_room_client::{PokerRoomClient, PokerRoomConfig, RoomController, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect("ws://localhost:5000/ws").await?;
//! let (client, events) = PokerRoomClient::start(transport, PokerRoomConfig::new("K3X9QZ", "alice"));
//! let controller = RoomController::new("K3X9QZ", "alice", my_renderer, std::sync::Arc::new(client));
//! controller.run(events, gestures).await;
//! ```

pub mod backlog;
pub mod card;
pub mod countdown;
pub mod error;
pub mod event;
pub mod intent;
pub mod protocol;
pub mod reducer;
pub mod render;
pub mod state;
pub mod transport;
pub mod transports;

#[cfg(feature = "tokio-runtime")]
pub mod client;
#[cfg(feature = "tokio-runtime")]
pub mod controller;
#[cfg(feature = "http-api")]
pub mod http;

pub use backlog::{parse_backlog, BacklogFile, BacklogItem};
pub use card::{Card, DECK};
pub use countdown::{Countdown, TimerDisplay};
pub use error::PokerRoomError;
pub use event::RoomEvent;
pub use intent::Intent;
pub use protocol::{ClientMessage, ConsensusRule, ServerMessage};
pub use reducer::{reduce, Effect, Region, Regions, Step};
pub use render::{render, RoomRenderer, RoomView};
pub use state::RoomMirror;
pub use transport::Transport;

#[cfg(feature = "tokio-runtime")]
pub use client::{PokerRoomClient, PokerRoomConfig};
#[cfg(feature = "tokio-runtime")]
pub use controller::{Gesture, IntentSink, RoomController};
#[cfg(feature = "http-api")]
pub use http::{RestClient, RevealResult};
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;

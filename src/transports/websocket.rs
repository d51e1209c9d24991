//! WebSocket transport built on `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the room protocol as text frames. Both
//! `ws://` and `wss://` URLs work; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), poker_room_client::PokerRoomError> {
//! use poker_room_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:5000/room").await?;
//! transport
//!     .send(r#"{"event":"reveal_votes","data":{"room_id":"3F2A9C1B"}}"#.to_string())
//!     .await?;
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::PokerRoomError;
use crate::transport::Transport;

/// The underlying WebSocket stream type.
///
/// Public so callers can build a transport from their own stream through
/// [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// Non-text frames are skipped. A close frame ends the stream.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// resolves does not consume a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to the room server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::Io`] if the URL is invalid or the handshake
    /// fails. I/O error kinds are preserved; everything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, PokerRoomError> {
        tracing::debug!(url = %url, "connecting to room server");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| {
                let kind = match &e {
                    tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                    _ => std::io::ErrorKind::Other,
                };
                PokerRoomError::Io(std::io::Error::new(kind, e))
            })?;

        tracing::info!(url = %url, "room connection established");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream.
    ///
    /// Use this for custom TLS, proxies or extra handshake headers.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Same as [`connect`](Self::connect), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::Timeout`] if the deadline elapses, or any
    /// error [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: Duration,
    ) -> Result<Self, PokerRoomError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| PokerRoomError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), PokerRoomError> {
        if self.closed {
            return Err(PokerRoomError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| PokerRoomError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PokerRoomError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(PokerRoomError::TransportReceive(e.to_string()))),
            };

            match frame {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(close) => {
                    tracing::debug!(?close, "room server sent close frame");
                    return None;
                }
                // tungstenite answers pings on its own.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), PokerRoomError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| PokerRoomError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one WebSocket connection on a random port and hand it to `handler`.
    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_bounds<T: Send + std::fmt::Debug>() {}
        assert_bounds::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let err = WebSocketTransport::connect("not a url").await.unwrap_err();
        assert!(matches!(err, PokerRoomError::Io(_)));
    }

    #[tokio::test]
    async fn recv_yields_room_events_in_order() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Text(r#"{"event":"error","data":{"msg":"a"}}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"event":"error","data":{"msg":"b"}}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.recv().await.unwrap().unwrap().contains("\"a\""));
        assert!(transport.recv().await.unwrap().unwrap().contains("\"b\""));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text("after".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "after");
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        let url = serve_once(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("join".to_string()).await.unwrap();
        assert_eq!(seen_rx.await.unwrap(), "join");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_sends() {
        let url =
            serve_once(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, PokerRoomError::TransportClosed));
    }
}

//! Async client for a planning poker room.
//!
//! [`PokerRoomClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Room events are emitted
//! on a bounded channel ([`tokio::sync::mpsc::Receiver<RoomEvent>`]) returned
//! from [`PokerRoomClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect("ws://localhost:5000/ws").await?;
//! let config = PokerRoomConfig::new("K3X9QZ", "alice");
//! let (client, mut events) = PokerRoomClient::start(transport, config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RoomEvent::Snapshot { .. } => client.submit_vote(Card::Five)?,
//!         RoomEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::card::Card;
use crate::controller::IntentSink;
use crate::error::{PokerRoomError, Result};
use crate::event::RoomEvent;
use crate::intent::Intent;
use crate::protocol::{ClientMessage, RoomId, ServerMessage};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`PokerRoomClient`] connection.
///
/// # Example
///
/// ```
/// use poker_room_client::client::PokerRoomConfig;
/// use std::time::Duration;
///
/// let config = PokerRoomConfig::new("K3X9QZ", "alice")
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.room_id, "K3X9QZ");
/// assert_eq!(config.event_channel_capacity, 512);
/// ```
#[derive(Debug, Clone)]
pub struct PokerRoomConfig {
    /// Room to join.
    pub room_id: RoomId,
    /// Display name of the local participant. Also the admin check key.
    pub username: String,
    /// Capacity of the bounded event channel.
    ///
    /// Every room event changes the mirror, so none is ever dropped. When the
    /// channel is full the transport loop waits for the consumer, and inbound
    /// frames queue in the transport meanwhile.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the transport loop gets to close the transport on
    /// [`PokerRoomClient::shutdown`] before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl PokerRoomConfig {
    pub fn new(room_id: impl Into<RoomId>, username: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            username: username.into(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    /// A room snapshot has been received since the join went out.
    joined: AtomicBool,
    session_name: Mutex<Option<String>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            joined: AtomicBool::new(false),
            session_name: Mutex::new(None),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for one participant in one room.
///
/// Every intent method addresses a [`ClientMessage`] to the configured room
/// and queues it for the transport loop. They return once the message is
/// queued; the server answers, if at all, with a [`RoomEvent`].
pub struct PokerRoomClient {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    state: Arc<ClientState>,
    room_id: RoomId,
    username: String,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl PokerRoomClient {
    /// Start the transport loop and return a handle plus event receiver.
    ///
    /// A [`Join`](ClientMessage::Join) for the configured room is queued as
    /// the very first outgoing message.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: PokerRoomConfig,
    ) -> (Self, mpsc::Receiver<RoomEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<RoomEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());
        let loop_state = Arc::clone(&state);

        // Receiver is alive in this scope, the send cannot fail.
        let _ = cmd_tx.send(Intent::Join.into_message(&config.room_id, &config.username));
        info!(room_id = %config.room_id, username = %config.username, "joining room");

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_state,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            room_id: config.room_id,
            username: config.username,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Address `intent` to this client's room and queue it.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn send_intent(&self, intent: Intent) -> Result<()> {
        self.send(intent.into_message(&self.room_id, &self.username))
    }

    /// Vote `card` for the current story. Re-voting replaces the vote.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn submit_vote(&self, card: Card) -> Result<()> {
        self.send_intent(Intent::SubmitVote(card))
    }

    /// Ask the server to reveal the round. Admin only; the server rejects
    /// everyone else with an `error` event.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn reveal_votes(&self) -> Result<()> {
        self.send_intent(Intent::RevealVotes)
    }

    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn next_task(&self) -> Result<()> {
        self.send_intent(Intent::NextTask)
    }

    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn restart_vote(&self) -> Result<()> {
        self.send_intent(Intent::RestartVote)
    }

    /// Ask for the estimated backlog. Arrives as
    /// [`RoomEvent::BacklogReady`].
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn request_backlog_download(&self) -> Result<()> {
        self.send_intent(Intent::RequestBacklogDownload)
    }

    /// Start the voting session, optionally with a per-round countdown of
    /// `duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`PokerRoomError::NotConnected`] if the transport has closed.
    pub fn start_session(&self, use_timer: bool, duration: u32) -> Result<()> {
        self.send_intent(Intent::StartSession {
            use_timer,
            duration,
        })
    }

    /// Shut down the client, closing the transport and stopping the background task.
    ///
    /// After calling this method, the event receiver will yield `None` once the
    /// transport loop exits.
    pub async fn shutdown(&mut self) {
        debug!("PokerRoomClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // A loop stuck in close() is aborted so it cannot outlive the handle.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Returns `true` once the server has sent a room snapshot.
    pub fn is_joined(&self) -> bool {
        self.state.joined.load(Ordering::Acquire)
    }

    /// Session name from the latest snapshot.
    pub async fn session_name(&self) -> Option<String> {
        self.state.session_name.lock().await.clone()
    }

    fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(PokerRoomError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| PokerRoomError::NotConnected)
    }
}

impl IntentSink for PokerRoomClient {
    fn send_intent(&self, intent: Intent) -> Result<()> {
        PokerRoomClient::send_intent(self, intent)
    }
}

impl std::fmt::Debug for PokerRoomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PokerRoomClient")
            .field("room_id", &self.room_id)
            .field("username", &self.username)
            .field("connected", &self.is_connected())
            .field("joined", &self.is_joined())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PokerRoomClient {
    fn drop(&mut self) {
        // No executor to drive transport.close() here; abort the loop instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background loop that multiplexes send/receive via `tokio::select!`.
///
/// Exits when:
/// - The command channel closes (client handle dropped or shutdown called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<RoomEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    emit_event(&event_tx, RoomEvent::Connected).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!(event = msg.event_name(), "sending client message");
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                            }
                        }
                    }
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                update_state(&state, &server_msg).await;
                                emit_event(&event_tx, RoomEvent::from(server_msg)).await;
                            }
                            Err(e) => {
                                warn!("failed to deserialize server message: {e}; raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

async fn update_state(state: &ClientState, msg: &ServerMessage) {
    match msg {
        ServerMessage::Status(payload) => {
            if !state.joined.swap(true, Ordering::AcqRel) {
                info!(session = %payload.current_state.session_name, "joined room");
            }
            *state.session_name.lock().await = Some(payload.current_state.session_name.clone());
        }
        ServerMessage::SessionEnded { msg } => {
            info!("session ended: {msg}");
        }
        ServerMessage::Error { msg } => {
            warn!("server rejected a request: {msg}");
        }
        _ => {}
    }
}

/// Emit an event to the event channel, waiting for room if it is full.
///
/// A dropped delta would leave the consumer's mirror stale with no way to
/// notice, so the loop takes backpressure instead.
async fn emit_event(event_tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    let kind = event.kind();
    if event_tx.capacity() == 0 {
        debug!(event = kind, "event channel full, waiting for consumer");
    }
    if event_tx.send(event).await.is_err() {
        debug!(event = kind, "event channel closed, receiver dropped");
    }
}

/// Emit [`Disconnected`](RoomEvent::Disconnected) and update state.
///
/// Always the last event on the channel.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<RoomEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    state.joined.store(false, Ordering::Release);
    if event_tx.send(RoomEvent::Disconnected { reason }).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Records sent messages and replays scripted responses.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, PokerRoomError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, PokerRoomError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), PokerRoomError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PokerRoomError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                // Script exhausted: stay open until shutdown.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), PokerRoomError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn status_json() -> String {
        serde_json::json!({
            "event": "status",
            "data": {
                "msg": "alice joined the room.",
                "participants": ["alice"],
                "current_state": {
                    "session_name": "Sprint 12",
                    "admin_name": "alice",
                    "backlog": [],
                    "current_story_index": 0,
                    "votes": {},
                    "is_revealed": false,
                    "is_started": false,
                    "use_timer": false,
                    "timer_duration": 60,
                    "participants": {"sid-1": "alice"}
                }
            }
        })
        .to_string()
    }

    fn sent_messages(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<ClientMessage> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|json| serde_json::from_str(json).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn start_sends_join_first() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(status_json()))]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));

        assert!(matches!(events.recv().await.unwrap(), RoomEvent::Connected));
        assert!(matches!(
            events.recv().await.unwrap(),
            RoomEvent::Snapshot { .. }
        ));

        assert_eq!(
            sent_messages(&sent)[0],
            ClientMessage::Join {
                room_id: "ROOM1".into(),
                username: "alice".into(),
            }
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn snapshot_marks_joined_and_records_session() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(status_json()))]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));

        assert!(!client.is_joined());
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Snapshot

        assert!(client.is_joined());
        assert_eq!(client.session_name().await.as_deref(), Some("Sprint 12"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn intents_are_addressed_to_the_room() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "bob"));
        let _ = events.recv().await; // Connected

        client.submit_vote(Card::Eight).unwrap();
        client.reveal_votes().unwrap();
        client.start_session(true, 30).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = sent_messages(&sent);
        assert_eq!(messages.len(), 4);
        assert_eq!(
            messages[1],
            ClientMessage::SubmitVote {
                room_id: "ROOM1".into(),
                username: "bob".into(),
                vote: Card::Eight,
            }
        );
        assert_eq!(
            messages[2],
            ClientMessage::RevealVotes {
                room_id: "ROOM1".into()
            }
        );
        assert_eq!(
            messages[3],
            ClientMessage::StartSession {
                room_id: "ROOM1".into(),
                use_timer: true,
                duration: 30,
            }
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("{not json".into())),
            Some(Ok(r#"{"event":"mystery","data":{}}"#.into())),
            Some(Ok(status_json())),
        ]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));

        let _ = events.recv().await; // Connected
        assert!(matches!(
            events.recv().await.unwrap(),
            RoomEvent::Snapshot { .. }
        ));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(status_json())), None]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Snapshot
        assert_eq!(
            events.recv().await.unwrap(),
            RoomEvent::Disconnected { reason: None }
        );
        assert!(!client.is_connected());
        assert!(!client.is_joined());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn receive_error_disconnects_with_reason() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Err(PokerRoomError::TransportClosed))]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));

        let _ = events.recv().await; // Connected
        match events.recv().await.unwrap() {
            RoomEvent::Disconnected { reason: Some(reason) } => {
                assert!(reason.contains("transport receive error"));
            }
            other => panic!("expected Disconnected, got {other:?}"),
        }
        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_after_shutdown() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        assert!(closed.load(Ordering::Relaxed));
        assert!(matches!(
            client.next_task(),
            Err(PokerRoomError::NotConnected)
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RoomEvent::Disconnected { .. }
        ));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) =
            PokerRoomClient::start(transport, PokerRoomConfig::new("ROOM1", "alice"));
        client.shutdown().await;
        client.shutdown().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn small_event_channel_delivers_every_frame() {
        let revealed = serde_json::json!({
            "event": "votes_revealed",
            "data": {"votes": {"alice": "5"}, "result": "5", "details": "Strict: every vote is 5"}
        })
        .to_string();
        let mut incoming: Vec<Option<std::result::Result<String, PokerRoomError>>> =
            (0..20).map(|_| Some(Ok(status_json()))).collect();
        incoming.push(Some(Ok(revealed)));
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = PokerRoomConfig::new("ROOM1", "alice").with_event_channel_capacity(1);
        let (mut client, mut events) = PokerRoomClient::start(transport, config);

        // Let the loop fill the channel before anything is consumed.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut kinds = Vec::new();
        while let Some(event) = events.recv().await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds.len(), 23, "{kinds:?}");
        assert_eq!(kinds[0], "connected");
        assert_eq!(&kinds[1..21], ["snapshot"; 20]);
        assert_eq!(kinds[21], "votes_revealed");
        assert_eq!(kinds[22], "disconnected");
        client.shutdown().await;
    }

    #[test]
    fn config_defaults_and_clamping() {
        let config = PokerRoomConfig::new("ROOM1", "alice");
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(
            config.with_event_channel_capacity(0).event_channel_capacity,
            1
        );
    }
}

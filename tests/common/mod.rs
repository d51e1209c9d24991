#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for poker room client integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`RecordingRenderer`] and helpers
//! that build server frames shaped exactly like the room server's, extra
//! fields included.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use poker_room_client::protocol::ClientMessage;
use poker_room_client::reducer::Regions;
use poker_room_client::render::{RoomRenderer, RoomView};
use poker_room_client::{BacklogFile, PokerRoomError, Transport};
use serde_json::{json, Map, Value};

// ── MockTransport ───────────────────────────────────────────────────

/// Scripted server frames are consumed in order by `recv()`. All frames sent
/// by the client are recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, PokerRoomError>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Returns the transport plus shared handles for inspecting sent frames
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, PokerRoomError>>>,
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
    async fn send(&mut self, message: String) -> Result<(), PokerRoomError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, PokerRoomError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Script exhausted: stay open until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), PokerRoomError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Decode every frame the client sent so far.
pub fn sent_messages(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<ClientMessage> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|json| serde_json::from_str(json).expect("client frame"))
        .collect()
}

// ── RecordingRenderer ───────────────────────────────────────────────

/// Keeps every repaint, alert and download.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<(RoomView, Regions)>,
    pub alerts: Vec<String>,
    pub downloads: Vec<BacklogFile>,
}

impl RecordingRenderer {
    pub fn last_view(&self) -> &RoomView {
        &self.frames.last().expect("at least one repaint").0
    }
}

impl RoomRenderer for RecordingRenderer {
    fn render(&mut self, view: &RoomView, regions: Regions) {
        self.frames.push((view.clone(), regions));
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn download(&mut self, file: &BacklogFile) {
        self.downloads.push(file.clone());
    }
}

// ── Server frames ───────────────────────────────────────────────────

fn frame(event: &str, data: Value) -> String {
    json!({"event": event, "data": data}).to_string()
}

fn vote_map(votes: &[(&str, &str)]) -> Value {
    Value::Object(
        votes
            .iter()
            .map(|(user, card)| (user.to_string(), Value::from(*card)))
            .collect::<Map<String, Value>>(),
    )
}

/// The three-story backlog used by every fixture.
pub fn backlog_json() -> Value {
    json!([
        {"name": "Login page", "description": "OAuth sign-in", "votes_submitted": {}},
        {"nom": "Search", "description": "Full text search"},
        {"name": "Export", "description": "CSV export", "final_vote": null}
    ])
}

/// A `status` snapshot. Participants appear in the server's `{sid: name}`
/// form inside `current_state`.
pub fn status_json(
    admin: &str,
    participants: &[&str],
    votes: &[(&str, &str)],
    is_started: bool,
    use_timer: bool,
) -> String {
    let by_sid: Map<String, Value> = participants
        .iter()
        .enumerate()
        .map(|(i, name)| (format!("sid-{i}"), Value::from(*name)))
        .collect();
    frame(
        "status",
        json!({
            "msg": format!("{} joined the room.", participants.last().copied().unwrap_or(admin)),
            "participants": participants,
            "current_state": {
                "session_name": "Sprint 12",
                "session_type": "strict",
                "admin_name": admin,
                "admin_sid": "sid-0",
                "backlog": backlog_json(),
                "current_story_index": 0,
                "votes": vote_map(votes),
                "is_revealed": false,
                "is_started": is_started,
                "use_timer": use_timer,
                "timer_duration": 60,
                "timer_end_time": null,
                "participants": by_sid
            }
        }),
    )
}

pub fn session_started_json(use_timer: bool, duration: u32) -> String {
    frame(
        "session_started",
        json!({
            "is_started": true,
            "use_timer": use_timer,
            "duration": duration,
            "current_story": {"name": "Login page", "description": "OAuth sign-in"}
        }),
    )
}

pub fn vote_submitted_json(participants: &[&str], votes: &[(&str, &str)]) -> String {
    frame(
        "vote_submitted",
        json!({
            "participants": participants,
            "current_state": {"votes": vote_map(votes)},
            "voted_all": votes.len() == participants.len()
        }),
    )
}

pub fn votes_revealed_json(votes: &[(&str, &str)], result: &str, details: &str) -> String {
    frame(
        "votes_revealed",
        json!({"votes": vote_map(votes), "result": result, "details": details}),
    )
}

pub fn new_round_json(index: usize, use_timer: bool, duration: u32) -> String {
    frame(
        "new_round",
        json!({"index": index, "use_timer": use_timer, "duration": duration}),
    )
}

pub fn vote_restarted_json(use_timer: bool, duration: u32) -> String {
    frame(
        "vote_restarted",
        json!({"use_timer": use_timer, "duration": duration}),
    )
}

pub fn backlog_updated_json() -> String {
    frame("backlog_updated", json!({"backlog_data": backlog_json()}))
}

pub fn session_ended_json(msg: &str) -> String {
    frame("session_ended", json!({"msg": msg}))
}

pub fn error_json(msg: &str) -> String {
    frame("error", json!({"msg": msg}))
}

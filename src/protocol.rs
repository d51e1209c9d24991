//! Wire-compatible protocol types for the planning poker room server.
//!
//! Every frame is a JSON object adjacently tagged as
//! `{"event": "<snake_case name>", "data": {...}}`. The event names and
//! payload fields match the room server's socket events. Fields the client does
//! not use (`admin_sid`, `timer_end_time`, ...) are ignored on input.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::backlog::BacklogItem;
use crate::card::Card;

/// Short room identifier issued by the server (e.g. `"3F2A9C1B"`).
pub type RoomId = String;

/// Username to card face, for participants who voted this round.
pub type VoteMap = BTreeMap<String, String>;

// ── Enums ───────────────────────────────────────────────────────────

/// How the server turns a round's votes into one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusRule {
    /// All numeric votes must be identical.
    #[default]
    Strict,
    /// Mean of the numeric votes, one decimal.
    Average,
    /// Median of the numeric votes.
    Median,
}

impl ConsensusRule {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsensusRule::Strict => "strict",
            ConsensusRule::Average => "average",
            ConsensusRule::Median => "median",
        }
    }
}

impl fmt::Display for ConsensusRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Room snapshot ───────────────────────────────────────────────────

/// The server's full room state as carried by `status` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub session_name: String,
    /// Consensus rule name. Kept as text; unknown rules are still displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    pub admin_name: String,
    #[serde(default)]
    pub backlog: Vec<BacklogItem>,
    #[serde(default)]
    pub current_story_index: Option<usize>,
    #[serde(default)]
    pub votes: VoteMap,
    #[serde(default)]
    pub is_revealed: bool,
    #[serde(default)]
    pub is_started: bool,
    #[serde(default)]
    pub use_timer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_duration: Option<u32>,
    /// Usernames. The server sends a `{connection id: username}` map.
    #[serde(default, deserialize_with = "usernames")]
    pub participants: Vec<String>,
}

/// Accept both the server's `{sid: username}` map and a plain username list.
fn usernames<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Roster {
        List(Vec<String>),
        Map(BTreeMap<String, String>),
    }

    Ok(match Roster::deserialize(deserializer)? {
        Roster::List(names) => names,
        Roster::Map(by_sid) => by_sid.into_values().collect(),
    })
}

/// The subset of room state carried by `vote_submitted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoteTally {
    #[serde(default)]
    pub votes: VoteMap,
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload for the `status` server message.
/// Boxed in `ServerMessage` to reduce enum size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Human-readable status line ("alice joined the room.").
    pub msg: String,
    /// Connected usernames.
    pub participants: Vec<String>,
    pub current_state: RoomSnapshot,
}

/// Payload for the `vote_submitted` server message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmittedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    pub participants: Vec<String>,
    pub current_state: VoteTally,
    #[serde(default)]
    pub voted_all: bool,
}

// ── Messages ────────────────────────────────────────────────────────

/// Intents sent from client to server.
///
/// Every intent names the room it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce the local user in the room. Sent first on every connection.
    Join { room_id: RoomId, username: String },
    /// Vote for the current story.
    SubmitVote {
        room_id: RoomId,
        username: String,
        vote: Card,
    },
    /// Turn the cards over (admin).
    RevealVotes { room_id: RoomId },
    /// Move to the next backlog story (admin).
    NextTask { room_id: RoomId },
    /// Discard the round's votes and vote the same story again (admin).
    RestartVote { room_id: RoomId },
    /// Ask for the estimated backlog as a file (admin).
    RequestBacklogDownload { room_id: RoomId },
    /// Start estimating, optionally with a per-round countdown (admin).
    StartSession {
        room_id: RoomId,
        use_timer: bool,
        /// Countdown length in seconds.
        duration: u32,
    },
}

impl ClientMessage {
    /// Wire event name, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::SubmitVote { .. } => "submit_vote",
            ClientMessage::RevealVotes { .. } => "reveal_votes",
            ClientMessage::NextTask { .. } => "next_task",
            ClientMessage::RestartVote { .. } => "restart_vote",
            ClientMessage::RequestBacklogDownload { .. } => "request_backlog_download",
            ClientMessage::StartSession { .. } => "start_session",
        }
    }
}

/// Events pushed from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room snapshot (boxed to reduce enum size).
    Status(Box<StatusPayload>),
    /// The admin started the session.
    SessionStarted {
        #[serde(default)]
        is_started: bool,
        #[serde(default)]
        use_timer: bool,
        #[serde(default)]
        duration: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_story: Option<BacklogItem>,
    },
    /// Someone voted; carries the updated roster and vote map.
    VoteSubmitted(Box<VoteSubmittedPayload>),
    /// Cards are turned over, with the server-computed consensus.
    VotesRevealed {
        votes: VoteMap,
        result: String,
        details: String,
    },
    /// A new round started on the story at `index`.
    NewRound {
        index: usize,
        #[serde(default)]
        use_timer: bool,
        #[serde(default)]
        duration: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_story: Option<BacklogItem>,
    },
    /// The current story's round was restarted.
    VoteRestarted {
        #[serde(default)]
        use_timer: bool,
        #[serde(default)]
        duration: u32,
    },
    /// The backlog download requested by the admin.
    BacklogUpdated { backlog_data: Vec<BacklogItem> },
    /// Every story of the backlog has been estimated.
    SessionEnded { msg: String },
    /// A request was rejected.
    Error { msg: String },
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

    #[test]
    fn participants_accept_sid_map() {
        let snapshot: RoomSnapshot = serde_json::from_value(serde_json::json!({
            "session_name": "Sprint 12",
            "admin_name": "alice",
            "participants": {"sid-b": "bob", "sid-a": "alice"}
        }))
        .unwrap();

        let mut names = snapshot.participants.clone();
        names.sort();
        assert_eq!(names, ["alice", "bob"]);
        assert!(!snapshot.is_started);
        assert_eq!(snapshot.current_story_index, None);
    }

    #[test]
    fn participants_accept_plain_list() {
        let snapshot: RoomSnapshot = serde_json::from_value(serde_json::json!({
            "session_name": "Sprint 12",
            "admin_name": "alice",
            "participants": ["carol", "alice"]
        }))
        .unwrap();
        assert_eq!(snapshot.participants, ["carol", "alice"]);
    }

    #[test]
    fn client_message_uses_event_envelope() {
        let msg = ClientMessage::SubmitVote {
            room_id: "ROOM1".into(),
            username: "bob".into(),
            vote: Card::Thirteen,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "submit_vote");
        assert_eq!(json["data"]["vote"], "13");
        assert_eq!(msg.event_name(), "submit_vote");
    }

    #[test]
    fn consensus_rule_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConsensusRule::Median).unwrap(),
            "\"median\""
        );
        assert_eq!(ConsensusRule::default(), ConsensusRule::Strict);
    }
}

//! Events delivered to consumers of the poker room client.

use crate::backlog::BacklogItem;
use crate::protocol::{RoomSnapshot, ServerMessage, VoteMap};

/// Everything the room view reacts to, in server emission order.
///
/// `Connected` and `Disconnected` are synthesized by the transport loop; the
/// other variants map one-to-one onto [`ServerMessage`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The transport loop is running and the `join` intent is queued.
    Connected,
    /// Full room snapshot.
    Snapshot {
        message: String,
        participants: Vec<String>,
        state: Box<RoomSnapshot>,
    },
    SessionStarted { use_timer: bool, duration: u32 },
    VoteSubmitted {
        participants: Vec<String>,
        votes: VoteMap,
    },
    VotesRevealed {
        votes: VoteMap,
        result: String,
        details: String,
    },
    NewRound {
        index: usize,
        use_timer: bool,
        duration: u32,
    },
    VoteRestarted { use_timer: bool, duration: u32 },
    /// The backlog download the admin asked for.
    BacklogReady { backlog: Vec<BacklogItem> },
    SessionEnded { message: String },
    /// The server rejected something; the message is meant for the user.
    ServerError { message: String },
    /// The transport loop exited. Always the last event.
    Disconnected { reason: Option<String> },
}

impl RoomEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::Connected => "connected",
            RoomEvent::Snapshot { .. } => "snapshot",
            RoomEvent::SessionStarted { .. } => "session_started",
            RoomEvent::VoteSubmitted { .. } => "vote_submitted",
            RoomEvent::VotesRevealed { .. } => "votes_revealed",
            RoomEvent::NewRound { .. } => "new_round",
            RoomEvent::VoteRestarted { .. } => "vote_restarted",
            RoomEvent::BacklogReady { .. } => "backlog_ready",
            RoomEvent::SessionEnded { .. } => "session_ended",
            RoomEvent::ServerError { .. } => "server_error",
            RoomEvent::Disconnected { .. } => "disconnected",
        }
    }
}

impl From<ServerMessage> for RoomEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Status(payload) => {
                let payload = *payload;
                RoomEvent::Snapshot {
                    message: payload.msg,
                    participants: payload.participants,
                    state: Box::new(payload.current_state),
                }
            }
            ServerMessage::SessionStarted {
                use_timer,
                duration,
                ..
            } => RoomEvent::SessionStarted {
                use_timer,
                duration,
            },
            ServerMessage::VoteSubmitted(payload) => {
                let payload = *payload;
                RoomEvent::VoteSubmitted {
                    participants: payload.participants,
                    votes: payload.current_state.votes,
                }
            }
            ServerMessage::VotesRevealed {
                votes,
                result,
                details,
            } => RoomEvent::VotesRevealed {
                votes,
                result,
                details,
            },
            ServerMessage::NewRound {
                index,
                use_timer,
                duration,
                ..
            } => RoomEvent::NewRound {
                index,
                use_timer,
                duration,
            },
            ServerMessage::VoteRestarted {
                use_timer,
                duration,
            } => RoomEvent::VoteRestarted {
                use_timer,
                duration,
            },
            ServerMessage::BacklogUpdated { backlog_data } => RoomEvent::BacklogReady {
                backlog: backlog_data,
            },
            ServerMessage::SessionEnded { msg } => RoomEvent::SessionEnded { message: msg },
            ServerMessage::Error { msg } => RoomEvent::ServerError { message: msg },
        }
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
    use crate::protocol::{VoteSubmittedPayload, VoteTally};

    #[test]
    fn vote_submitted_keeps_only_roster_and_votes() {
        let mut votes = VoteMap::new();
        votes.insert("bob".into(), "5".into());
        let msg = ServerMessage::VoteSubmitted(Box::new(VoteSubmittedPayload {
            msg: Some("bob voted.".into()),
            participants: vec!["alice".into(), "bob".into()],
            current_state: VoteTally {
                votes: votes.clone(),
            },
            voted_all: false,
        }));

        assert_eq!(
            RoomEvent::from(msg),
            RoomEvent::VoteSubmitted {
                participants: vec!["alice".into(), "bob".into()],
                votes,
            }
        );
    }

    #[test]
    fn error_maps_to_server_error() {
        let event = RoomEvent::from(ServerMessage::Error {
            msg: "Only the admin can reveal votes.".into(),
        });
        assert_eq!(event.kind(), "server_error");
        assert!(matches!(event, RoomEvent::ServerError { message } if message.contains("admin")));
    }
}

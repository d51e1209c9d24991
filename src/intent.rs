//! Local intents, before they are addressed to a room.

use crate::card::Card;
use crate::protocol::ClientMessage;

/// Something the local user (or the controller on their behalf) asks the
/// server to do. Intents are fire-and-forget: the server answers, if at all,
/// with a regular room event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Join,
    SubmitVote(Card),
    RevealVotes,
    NextTask,
    RestartVote,
    RequestBacklogDownload,
    StartSession { use_timer: bool, duration: u32 },
}

impl Intent {
    /// Address the intent to `room_id` on behalf of `username`.
    pub fn into_message(self, room_id: &str, username: &str) -> ClientMessage {
        let room_id = room_id.to_string();
        match self {
            Intent::Join => ClientMessage::Join {
                room_id,
                username: username.to_string(),
            },
            Intent::SubmitVote(vote) => ClientMessage::SubmitVote {
                room_id,
                username: username.to_string(),
                vote,
            },
            Intent::RevealVotes => ClientMessage::RevealVotes { room_id },
            Intent::NextTask => ClientMessage::NextTask { room_id },
            Intent::RestartVote => ClientMessage::RestartVote { room_id },
            Intent::RequestBacklogDownload => ClientMessage::RequestBacklogDownload { room_id },
            Intent::StartSession {
                use_timer,
                duration,
            } => ClientMessage::StartSession {
                room_id,
                use_timer,
                duration,
            },
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

    #[test]
    fn vote_carries_room_and_user() {
        let msg = Intent::SubmitVote(Card::Five).into_message("ROOM1", "bob");
        assert_eq!(
            msg,
            ClientMessage::SubmitVote {
                room_id: "ROOM1".into(),
                username: "bob".into(),
                vote: Card::Five,
            }
        );
    }

    #[test]
    fn admin_intents_carry_only_room() {
        let json = serde_json::to_value(Intent::NextTask.into_message("ROOM1", "alice")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "next_task", "data": {"room_id": "ROOM1"}})
        );
    }
}

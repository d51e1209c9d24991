//! The client's mirror of the room.
//!
//! [`RoomMirror`] is the single piece of mutable state of a room view. It pairs
//! the server-owned [`RoomState`] with [`LocalView`] flags that only exist on
//! this client (selection, admin flag, timer display, ...). It is created empty
//! on connect, replaced by snapshots, patched by deltas and emptied again on
//! disconnect.

use std::collections::VecDeque;

use crate::backlog::BacklogItem;
use crate::card::Card;
use crate::countdown::TimerDisplay;
use crate::error::{PokerRoomError, Result};
use crate::protocol::{RoomId, RoomSnapshot, VoteMap};

/// Number of status lines kept in [`LocalView::messages`].
pub const MESSAGE_LOG_CAPACITY: usize = 100;

/// Server-owned room state, mirrored read-only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomState {
    pub session_name: String,
    pub session_type: Option<String>,
    pub admin_name: String,
    pub is_started: bool,
    pub is_revealed: bool,
    pub use_timer: bool,
    pub timer_duration: Option<u32>,
    pub participants: Vec<String>,
    pub votes: VoteMap,
    pub backlog: Vec<BacklogItem>,
    pub current_story_index: Option<usize>,
}

impl RoomState {
    /// Build the mirror from a `status` snapshot and its participant list.
    pub fn from_snapshot(participants: Vec<String>, snapshot: RoomSnapshot) -> Self {
        Self {
            session_name: snapshot.session_name,
            session_type: snapshot.session_type,
            admin_name: snapshot.admin_name,
            is_started: snapshot.is_started,
            is_revealed: snapshot.is_revealed,
            use_timer: snapshot.use_timer,
            timer_duration: snapshot.timer_duration,
            participants,
            votes: snapshot.votes,
            backlog: snapshot.backlog,
            current_story_index: snapshot.current_story_index,
        }
    }

    pub fn has_voted(&self, username: &str) -> bool {
        self.votes.contains_key(username)
    }

    /// Participants with a vote this round.
    pub fn voted_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|name| self.has_voted(name))
            .count()
    }

    pub fn current_story(&self) -> Option<&BacklogItem> {
        self.current_story_index
            .and_then(|index| self.backlog.get(index))
    }

    /// Reject states no server round can produce.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::InvalidState`] when a vote belongs to someone outside
    /// the room, or the story index points past a non-empty backlog.
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(stranger) = self
            .votes
            .keys()
            .find(|name| !self.participants.contains(name))
        {
            return Err(PokerRoomError::InvalidState(format!(
                "vote from {stranger:?} who is not a participant"
            )));
        }
        check_story_index(self.current_story_index, self.backlog.len())
    }
}

/// A story index is valid when it addresses the backlog, or the backlog is empty.
pub(crate) fn check_story_index(index: Option<usize>, backlog_len: usize) -> Result<()> {
    match index {
        Some(index) if backlog_len > 0 && index >= backlog_len => {
            Err(PokerRoomError::InvalidState(format!(
                "story index {index} outside a backlog of {backlog_len}"
            )))
        }
        _ => Ok(()),
    }
}

/// The server's verdict for a revealed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consensus {
    pub result: String,
    pub details: String,
}

/// Client-only view flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalView {
    pub username: String,
    /// The local user is the room admin.
    pub is_admin: bool,
    /// The card deck has been laid out for this connection.
    pub deck_ready: bool,
    pub selected_card: Option<Card>,
    /// A reveal intent already left this client during the current round.
    pub reveal_requested: bool,
    pub consensus: Option<Consensus>,
    pub timer: TimerDisplay,
    pub messages: VecDeque<String>,
    pub session_ended: bool,
}

/// Everything a room view renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMirror {
    pub room_id: RoomId,
    pub room: RoomState,
    pub local: LocalView,
}

impl RoomMirror {
    /// An empty mirror for `username` in `room_id`.
    pub fn new(room_id: impl Into<RoomId>, username: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            room: RoomState::default(),
            local: LocalView {
                username: username.into(),
                is_admin: false,
                deck_ready: false,
                selected_card: None,
                reveal_requested: false,
                consensus: None,
                timer: TimerDisplay::Ready,
                messages: VecDeque::new(),
                session_ended: false,
            },
        }
    }

    /// A fresh empty mirror with the same identity.
    pub fn emptied(&self) -> Self {
        Self::new(self.room_id.clone(), self.local.username.clone())
    }

    pub fn username(&self) -> &str {
        &self.local.username
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        if self.local.messages.len() == MESSAGE_LOG_CAPACITY {
            self.local.messages.pop_front();
        }
        self.local.messages.push_back(message.into());
    }

    /// Log a snapshot's status line unless it repeats the last one, so a
    /// re-sent snapshot renders the same as the first.
    pub fn push_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.local.messages.back() != Some(&message) {
            self.push_message(message);
        }
    }

    /// Forget everything tied to the current round.
    pub fn clear_round(&mut self) {
        self.room.votes.clear();
        self.room.is_revealed = false;
        self.local.selected_card = None;
        self.local.consensus = None;
        self.local.reveal_requested = false;
    }

    /// Mark `card` as the only selected card.
    pub fn select_card(&mut self, card: Card) {
        self.local.selected_card = Some(card);
    }

    /// Whether the admin's client should reveal on its own: the session runs
    /// without a timer and every participant has voted.
    pub fn auto_reveal_due(&self) -> bool {
        let total = self.room.participants.len();
        self.local.is_admin
            && !self.local.reveal_requested
            && self.room.is_started
            && !self.room.use_timer
            && !self.room.is_revealed
            && total > 0
            && self.room.voted_count() == total
    }

    /// Claim the reveal for an elapsed countdown. Returns `true` at most once
    /// per round, and only on the admin's client.
    pub fn claim_timeout_reveal(&mut self) -> bool {
        if self.local.is_admin && !self.room.is_revealed && !self.local.reveal_requested {
            self.local.reveal_requested = true;
            true
        } else {
            false
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

    fn started_room(admin: &str, participants: &[&str]) -> RoomMirror {
        let mut mirror = RoomMirror::new("ROOM1", admin);
        mirror.local.is_admin = true;
        mirror.room.admin_name = admin.into();
        mirror.room.is_started = true;
        mirror.room.participants = participants.iter().map(|p| p.to_string()).collect();
        mirror
    }

    #[test]
    fn vote_from_stranger_is_invalid() {
        let mut room = RoomState {
            participants: vec!["alice".into()],
            ..RoomState::default()
        };
        room.votes.insert("mallory".into(), "5".into());
        assert!(matches!(
            room.check_invariants(),
            Err(PokerRoomError::InvalidState(_))
        ));
    }

    #[test]
    fn story_index_must_fit_backlog() {
        assert!(check_story_index(Some(0), 0).is_ok());
        assert!(check_story_index(Some(1), 2).is_ok());
        assert!(check_story_index(Some(2), 2).is_err());
        assert!(check_story_index(None, 2).is_ok());
    }

    #[test]
    fn auto_reveal_requires_every_vote() {
        let mut mirror = started_room("alice", &["alice", "bob"]);
        mirror.room.votes.insert("alice".into(), "3".into());
        assert!(!mirror.auto_reveal_due());

        mirror.room.votes.insert("bob".into(), "5".into());
        assert!(mirror.auto_reveal_due());
    }

    #[test]
    fn auto_reveal_skipped_with_timer_or_for_guests() {
        let mut mirror = started_room("alice", &["alice"]);
        mirror.room.votes.insert("alice".into(), "3".into());

        mirror.room.use_timer = true;
        assert!(!mirror.auto_reveal_due());

        mirror.room.use_timer = false;
        mirror.local.is_admin = false;
        assert!(!mirror.auto_reveal_due());
    }

    #[test]
    fn auto_reveal_never_fires_on_empty_room() {
        let mirror = started_room("alice", &[]);
        assert!(!mirror.auto_reveal_due());
    }

    #[test]
    fn timeout_reveal_is_claimed_once() {
        let mut mirror = started_room("alice", &["alice"]);
        assert!(mirror.claim_timeout_reveal());
        assert!(!mirror.claim_timeout_reveal());

        mirror.clear_round();
        assert!(mirror.claim_timeout_reveal());
    }

    #[test]
    fn message_log_is_bounded() {
        let mut mirror = RoomMirror::new("ROOM1", "bob");
        for i in 0..MESSAGE_LOG_CAPACITY + 5 {
            mirror.push_message(format!("line {i}"));
        }
        assert_eq!(mirror.local.messages.len(), MESSAGE_LOG_CAPACITY);
        assert_eq!(mirror.local.messages.front().unwrap(), "line 5");
    }
}

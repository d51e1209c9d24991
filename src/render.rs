//! Projection of a [`RoomMirror`] into what a room view displays.
//!
//! [`render`] is pure and total: any mirror produces a [`RoomView`]. Front ends
//! implement [`RoomRenderer`] and repaint the [`Regions`] the reducer reports.

use std::fmt;

use crate::backlog::{BacklogFile, BacklogItem};
use crate::card::{Card, DECK};
use crate::countdown::TimerDisplay;
use crate::reducer::Regions;
use crate::state::{Consensus, RoomMirror};

/// How another participant's card is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFace {
    /// Voted, not yet revealed.
    Back,
    /// No vote yet.
    Pending,
    Revealed(String),
    /// Revealed round without a vote from this participant.
    NoVote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCard {
    pub username: String,
    pub face: CardFace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub name: String,
    pub voted: bool,
}

impl fmt::Display for ParticipantRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.voted {
            f.write_str(" ✅")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckCard {
    pub card: Card,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogRow {
    /// One-based.
    pub position: usize,
    pub name: String,
    pub is_current: bool,
    pub estimate: Option<String>,
}

impl fmt::Display for BacklogRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.position, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryView {
    pub name: String,
    pub description: String,
    /// One-based.
    pub position: usize,
    pub total: usize,
}

/// Enablement of the admin-only controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdminControls {
    pub visible: bool,
    pub start_visible: bool,
    pub reveal_disabled: bool,
    pub next_disabled: bool,
    pub restart_disabled: bool,
    pub download_visible: bool,
}

/// Everything a room view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub session_title: String,
    pub participants: Vec<ParticipantRow>,
    pub participant_count: usize,
    pub voted_count: usize,
    /// Every participant except the local user, in roster order.
    pub other_votes: Vec<VoteCard>,
    /// Empty until the deck is laid out for this connection.
    pub deck: Vec<DeckCard>,
    pub backlog: Vec<BacklogRow>,
    pub total_tasks: usize,
    pub current_story: Option<StoryView>,
    /// Only present once votes are revealed.
    pub consensus: Option<Consensus>,
    pub admin: AdminControls,
    pub timer: TimerDisplay,
    pub messages: Vec<String>,
    pub session_ended: bool,
}

impl RoomView {
    /// "voted/total" as shown next to the participant list.
    pub fn vote_progress(&self) -> String {
        format!("{}/{}", self.voted_count, self.participant_count)
    }
}

/// Project `mirror` into a view.
pub fn render(mirror: &RoomMirror) -> RoomView {
    let room = &mirror.room;
    let local = &mirror.local;

    let participants = room
        .participants
        .iter()
        .map(|name| ParticipantRow {
            name: name.clone(),
            voted: room.has_voted(name),
        })
        .collect();

    let other_votes = room
        .participants
        .iter()
        .filter(|name| name.as_str() != local.username)
        .map(|name| VoteCard {
            username: name.clone(),
            face: vote_face(room.votes.get(name), room.is_revealed),
        })
        .collect();

    let deck = if local.deck_ready {
        DECK.iter()
            .map(|card| DeckCard {
                card: *card,
                selected: local.selected_card == Some(*card),
            })
            .collect()
    } else {
        Vec::new()
    };

    let backlog = room
        .backlog
        .iter()
        .enumerate()
        .map(|(index, item)| backlog_row(index, item, room.current_story_index))
        .collect();

    let current_story = room.current_story_index.and_then(|index| {
        room.backlog.get(index).map(|item| StoryView {
            name: item.name.clone(),
            description: item.description.clone(),
            position: index + 1,
            total: room.backlog.len(),
        })
    });

    let voted_count = room.voted_count();
    let admin = if local.is_admin {
        AdminControls {
            visible: true,
            start_visible: !room.is_started,
            reveal_disabled: voted_count == 0 || room.is_revealed,
            next_disabled: !room.is_revealed,
            restart_disabled: !room.is_revealed,
            download_visible: true,
        }
    } else {
        AdminControls::default()
    };

    RoomView {
        session_title: room.session_name.clone(),
        participants,
        participant_count: room.participants.len(),
        voted_count,
        other_votes,
        deck,
        backlog,
        total_tasks: room.backlog.len(),
        current_story,
        consensus: local
            .consensus
            .clone()
            .filter(|_| room.is_revealed),
        admin,
        timer: local.timer,
        messages: local.messages.iter().cloned().collect(),
        session_ended: local.session_ended,
    }
}

fn vote_face(vote: Option<&String>, revealed: bool) -> CardFace {
    match (vote, revealed) {
        (Some(value), true) => CardFace::Revealed(value.clone()),
        (None, true) => CardFace::NoVote,
        (Some(_), false) => CardFace::Back,
        (None, false) => CardFace::Pending,
    }
}

fn backlog_row(index: usize, item: &BacklogItem, current: Option<usize>) -> BacklogRow {
    BacklogRow {
        position: index + 1,
        name: item.name.clone(),
        is_current: current == Some(index),
        estimate: item.final_vote.clone(),
    }
}

/// The seam between the controller and a concrete UI.
pub trait RoomRenderer {
    /// Repaint `regions` from `view`.
    fn render(&mut self, view: &RoomView, regions: Regions);

    /// Show a blocking error to the user.
    fn alert(&mut self, message: &str);

    /// Offer `file` to the user as a download.
    fn download(&mut self, file: &BacklogFile);
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

    fn room(user: &str) -> RoomMirror {
        let mut mirror = RoomMirror::new("ROOM1", user);
        mirror.local.deck_ready = true;
        mirror.room.session_name = "Sprint 12".into();
        mirror.room.admin_name = "alice".into();
        mirror.local.is_admin = user == "alice";
        mirror.room.is_started = true;
        mirror.room.participants = vec!["alice".into(), "bob".into(), "carol".into()];
        mirror.room.backlog = vec![
            BacklogItem::new("Login", "OAuth flow"),
            BacklogItem::new("Search", "Full text"),
        ];
        mirror.room.current_story_index = Some(1);
        mirror
    }

    #[test]
    fn hidden_votes_show_back_or_pending_and_skip_self() {
        let mut mirror = room("bob");
        mirror.room.votes.insert("alice".into(), "8".into());
        mirror.room.votes.insert("bob".into(), "3".into());

        let view = render(&mirror);
        assert_eq!(
            view.other_votes,
            vec![
                VoteCard {
                    username: "alice".into(),
                    face: CardFace::Back
                },
                VoteCard {
                    username: "carol".into(),
                    face: CardFace::Pending
                },
            ]
        );
        assert_eq!(view.vote_progress(), "2/3");
        assert_eq!(view.participants[1].to_string(), "bob ✅");
        assert_eq!(view.participants[2].to_string(), "carol");
    }

    #[test]
    fn revealed_votes_show_values() {
        let mut mirror = room("bob");
        mirror.room.votes.insert("alice".into(), "8".into());
        mirror.room.is_revealed = true;

        let faces: Vec<_> = render(&mirror)
            .other_votes
            .into_iter()
            .map(|card| card.face)
            .collect();
        assert_eq!(faces, vec![CardFace::Revealed("8".into()), CardFace::NoVote]);
    }

    #[test]
    fn deck_waits_for_connection_and_marks_one_selection() {
        let mut mirror = room("bob");
        mirror.local.deck_ready = false;
        assert!(render(&mirror).deck.is_empty());

        mirror.local.deck_ready = true;
        mirror.select_card(Card::Thirteen);
        let deck = render(&mirror).deck;
        assert_eq!(deck.len(), DECK.len());
        let selected: Vec<_> = deck.iter().filter(|c| c.selected).map(|c| c.card).collect();
        assert_eq!(selected, vec![Card::Thirteen]);
    }

    #[test]
    fn current_story_is_one_based() {
        let view = render(&room("bob"));
        let story = view.current_story.unwrap();
        assert_eq!(story.name, "Search");
        assert_eq!((story.position, story.total), (2, 2));
        assert!(view.backlog[1].is_current);
        assert_eq!(view.backlog[0].to_string(), "1. Login");
    }

    #[test]
    fn admin_controls_follow_round_state() {
        let mut mirror = room("alice");
        let admin = render(&mirror).admin;
        assert!(admin.visible);
        assert!(!admin.start_visible);
        assert!(admin.reveal_disabled);
        assert!(admin.next_disabled);

        mirror.room.votes.insert("bob".into(), "5".into());
        assert!(!render(&mirror).admin.reveal_disabled);

        mirror.room.is_revealed = true;
        let admin = render(&mirror).admin;
        assert!(admin.reveal_disabled);
        assert!(!admin.next_disabled);
        assert!(!admin.restart_disabled);
    }

    #[test]
    fn guests_see_no_admin_controls() {
        assert_eq!(render(&room("bob")).admin, AdminControls::default());
    }

    #[test]
    fn consensus_hidden_until_reveal() {
        let mut mirror = room("bob");
        mirror.local.consensus = Some(Consensus {
            result: "5".into(),
            details: "unanimous".into(),
        });
        assert!(render(&mirror).consensus.is_none());

        mirror.room.is_revealed = true;
        assert_eq!(render(&mirror).consensus.unwrap().result, "5");
    }

    #[test]
    fn empty_mirror_renders() {
        let view = render(&RoomMirror::new("ROOM1", "bob"));
        assert!(view.participants.is_empty());
        assert!(view.current_story.is_none());
        assert_eq!(view.timer, TimerDisplay::Ready);
    }
}

//! Pure state reducer: `(mirror, event) -> (mirror', regions, effects)`.
//!
//! [`reduce`] never touches a UI, a timer or the network. It returns the next
//! mirror, the set of UI [`Regions`] that must be redrawn, and the side
//! [`Effect`]s the controller has to carry out, in order. On error the caller's
//! mirror is untouched.

use crate::backlog::BacklogFile;
use crate::countdown::TimerDisplay;
use crate::error::Result;
use crate::event::RoomEvent;
use crate::intent::Intent;
use crate::state::{check_story_index, Consensus, RoomMirror, RoomState};

/// A UI region of the room view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Title,
    Participants,
    OtherVotes,
    Deck,
    Backlog,
    CurrentStory,
    Timer,
    Consensus,
    AdminControls,
    Messages,
}

impl Region {
    pub const ALL: [Region; 10] = [
        Region::Title,
        Region::Participants,
        Region::OtherVotes,
        Region::Deck,
        Region::Backlog,
        Region::CurrentStory,
        Region::Timer,
        Region::Consensus,
        Region::AdminControls,
        Region::Messages,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of [`Region`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Regions(u16);

impl Regions {
    pub const NONE: Regions = Regions(0);

    pub fn all() -> Self {
        Self::of(&Region::ALL)
    }

    pub fn of(regions: &[Region]) -> Self {
        regions
            .iter()
            .fold(Self::NONE, |set, region| set.with(*region))
    }

    #[must_use]
    pub fn with(self, region: Region) -> Self {
        Regions(self.0 | region.bit())
    }

    #[must_use]
    pub fn union(self, other: Regions) -> Self {
        Regions(self.0 | other.0)
    }

    pub fn contains(self, region: Region) -> bool {
        self.0 & region.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Region> {
        Region::ALL
            .into_iter()
            .filter(move |region| self.contains(*region))
    }
}

/// Participant list, vote markers and the buttons that depend on them.
fn vote_markers() -> Regions {
    Regions::of(&[
        Region::Participants,
        Region::OtherVotes,
        Region::AdminControls,
    ])
}

/// Everything a fresh round resets.
fn round_reset() -> Regions {
    vote_markers().union(Regions::of(&[
        Region::Deck,
        Region::Timer,
        Region::Consensus,
    ]))
}

/// A side effect requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendIntent(Intent),
    /// Replace any running countdown with a new one of `seconds`.
    StartCountdown { seconds: u32 },
    CancelCountdown,
    Download(BacklogFile),
    Alert(String),
}

/// Result of reducing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub mirror: RoomMirror,
    pub regions: Regions,
    pub effects: Vec<Effect>,
}

/// Apply `event` to `mirror`.
///
/// # Errors
///
/// [`PokerRoomError::InvalidState`](crate::PokerRoomError::InvalidState) when
/// the event would break a room invariant, and
/// [`PokerRoomError::Serialization`](crate::PokerRoomError::Serialization) if a
/// backlog download cannot be encoded.
pub fn reduce(mirror: &RoomMirror, event: &RoomEvent) -> Result<Step> {
    let mut next = mirror.clone();
    let mut effects = Vec::new();

    let regions = match event {
        RoomEvent::Connected => {
            next = mirror.emptied();
            next.local.deck_ready = true;
            Regions::all()
        }

        RoomEvent::Snapshot {
            message,
            participants,
            state,
        } => {
            let room = RoomState::from_snapshot(participants.clone(), state.as_ref().clone());
            room.check_invariants()?;
            next.local.is_admin = next.local.username == room.admin_name;
            if !room.is_revealed {
                next.local.consensus = None;
            }
            next.room = room;
            next.push_status(message.as_str());
            request_auto_reveal(&mut next, &mut effects);
            Regions::all()
        }

        RoomEvent::SessionStarted {
            use_timer,
            duration,
        } => {
            next.room.is_started = true;
            start_round(&mut next, &mut effects, *use_timer, *duration);
            round_reset().union(Regions::of(&[Region::AdminControls]))
        }

        RoomEvent::VoteSubmitted {
            participants,
            votes,
        } => {
            next.room.participants = participants.clone();
            next.room.votes = votes.clone();
            next.room.check_invariants()?;
            request_auto_reveal(&mut next, &mut effects);
            vote_markers()
        }

        RoomEvent::VotesRevealed {
            votes,
            result,
            details,
        } => {
            next.room.is_revealed = true;
            next.room.votes = votes.clone();
            next.room.check_invariants()?;
            next.local.consensus = Some(Consensus {
                result: result.clone(),
                details: details.clone(),
            });
            // A reveal is final for the round; a late timeout must not ask again.
            next.local.reveal_requested = true;
            effects.push(Effect::CancelCountdown);
            vote_markers().with(Region::Consensus)
        }

        RoomEvent::NewRound {
            index,
            use_timer,
            duration,
        } => {
            check_story_index(Some(*index), next.room.backlog.len())?;
            next.room.current_story_index = Some(*index);
            start_round(&mut next, &mut effects, *use_timer, *duration);
            round_reset().union(Regions::of(&[Region::Backlog, Region::CurrentStory]))
        }

        RoomEvent::VoteRestarted {
            use_timer,
            duration,
        } => {
            start_round(&mut next, &mut effects, *use_timer, *duration);
            round_reset()
        }

        RoomEvent::BacklogReady { backlog } => {
            effects.push(Effect::Download(BacklogFile::new(&mirror.room_id, backlog)?));
            Regions::NONE
        }

        RoomEvent::SessionEnded { message } => {
            next.local.session_ended = true;
            next.push_message(message.clone());
            Regions::of(&[Region::Messages, Region::AdminControls])
        }

        RoomEvent::ServerError { message } => {
            effects.push(Effect::Alert(message.clone()));
            Regions::NONE
        }

        RoomEvent::Disconnected { .. } => {
            next = mirror.emptied();
            effects.push(Effect::CancelCountdown);
            Regions::all()
        }
    };

    Ok(Step {
        mirror: next,
        regions,
        effects,
    })
}

/// Reset the round and (re)arm the countdown.
fn start_round(next: &mut RoomMirror, effects: &mut Vec<Effect>, use_timer: bool, duration: u32) {
    next.clear_round();
    next.room.use_timer = use_timer;
    next.room.timer_duration = Some(duration);
    next.local.timer = TimerDisplay::Ready;
    effects.push(Effect::CancelCountdown);
    if use_timer {
        effects.push(Effect::StartCountdown { seconds: duration });
    }
}

fn request_auto_reveal(next: &mut RoomMirror, effects: &mut Vec<Effect>) {
    if next.auto_reveal_due() {
        next.local.reveal_requested = true;
        effects.push(Effect::SendIntent(Intent::RevealVotes));
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
    use crate::backlog::BacklogItem;
    use crate::card::Card;
    use crate::protocol::{RoomSnapshot, VoteMap};
    use crate::PokerRoomError;

    fn votes(pairs: &[(&str, &str)]) -> VoteMap {
        pairs
            .iter()
            .map(|(user, card)| (user.to_string(), card.to_string()))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    fn snapshot(participants: &[&str], votes: VoteMap, started: bool) -> RoomEvent {
        RoomEvent::Snapshot {
            message: "alice joined the room.".into(),
            participants: names(participants),
            state: Box::new(RoomSnapshot {
                session_name: "Sprint 12".into(),
                session_type: Some("median".into()),
                admin_name: "alice".into(),
                backlog: vec![
                    BacklogItem::new("Login", "OAuth"),
                    BacklogItem::new("Search", "Full text"),
                ],
                current_story_index: Some(0),
                votes,
                is_revealed: false,
                is_started: started,
                use_timer: false,
                timer_duration: Some(60),
                participants: names(participants),
            }),
        }
    }

    fn connected(user: &str) -> RoomMirror {
        reduce(&RoomMirror::new("ROOM1", user), &RoomEvent::Connected)
            .unwrap()
            .mirror
    }

    #[test]
    fn connect_starts_empty_with_deck() {
        let step = reduce(&RoomMirror::new("ROOM1", "bob"), &RoomEvent::Connected).unwrap();
        assert!(step.mirror.local.deck_ready);
        assert_eq!(step.mirror.room, RoomState::default());
        assert!(step.regions.contains(Region::Deck));
        assert!(step.effects.is_empty());
    }

    #[test]
    fn snapshot_replaces_mirror_and_derives_admin() {
        let step = reduce(&connected("alice"), &snapshot(&["alice", "bob"], votes(&[]), false))
            .unwrap();
        assert!(step.mirror.local.is_admin);
        assert_eq!(step.mirror.room.session_name, "Sprint 12");
        assert_eq!(step.mirror.local.messages.len(), 1);
        assert_eq!(step.regions, Regions::all());

        let guest = reduce(&connected("bob"), &snapshot(&["alice", "bob"], votes(&[]), false))
            .unwrap();
        assert!(!guest.mirror.local.is_admin);
    }

    #[test]
    fn invalid_snapshot_is_rejected() {
        let mirror = connected("alice");
        let err = reduce(&mirror, &snapshot(&["alice"], votes(&[("eve", "5")]), true))
            .unwrap_err();
        assert!(matches!(err, PokerRoomError::InvalidState(_)));
    }

    #[test]
    fn repeated_snapshot_renders_identically() {
        let frame = snapshot(&["alice", "bob"], votes(&[("alice", "5")]), true);
        let once = reduce(&connected("bob"), &frame).unwrap().mirror;
        let twice = reduce(&once, &frame).unwrap().mirror;

        assert_eq!(once.local.messages.len(), 1);
        assert_eq!(once, twice);
        assert_eq!(crate::render::render(&once), crate::render::render(&twice));
    }

    #[test]
    fn vote_submitted_patches_only_vote_regions() {
        let mirror = reduce(&connected("bob"), &snapshot(&["alice", "bob"], votes(&[]), true))
            .unwrap()
            .mirror;
        let step = reduce(
            &mirror,
            &RoomEvent::VoteSubmitted {
                participants: names(&["alice", "bob"]),
                votes: votes(&[("alice", "5")]),
            },
        )
        .unwrap();

        assert_eq!(step.mirror.room.voted_count(), 1);
        assert_eq!(step.regions, vote_markers());
        assert!(!step.regions.contains(Region::Backlog));
        assert!(step.effects.is_empty());
    }

    #[test]
    fn admin_auto_reveals_once_when_everyone_voted() {
        let mirror = reduce(&connected("alice"), &snapshot(&["alice", "bob"], votes(&[]), true))
            .unwrap()
            .mirror;
        let all_voted = RoomEvent::VoteSubmitted {
            participants: names(&["alice", "bob"]),
            votes: votes(&[("alice", "5"), ("bob", "8")]),
        };

        let step = reduce(&mirror, &all_voted).unwrap();
        assert_eq!(step.effects, [Effect::SendIntent(Intent::RevealVotes)]);

        // The same tally arriving again (e.g. a status echo) does not re-send.
        let again = reduce(&step.mirror, &all_voted).unwrap();
        assert!(again.effects.is_empty());
    }

    #[test]
    fn reveal_sets_consensus_and_stops_countdown() {
        let mirror = reduce(&connected("bob"), &snapshot(&["alice", "bob"], votes(&[]), true))
            .unwrap()
            .mirror;
        let step = reduce(
            &mirror,
            &RoomEvent::VotesRevealed {
                votes: votes(&[("alice", "5")]),
                result: "5.0".into(),
                details: "Median of 1 numeric vote(s): 5.0".into(),
            },
        )
        .unwrap();

        assert!(step.mirror.room.is_revealed);
        assert_eq!(step.mirror.local.consensus.as_ref().unwrap().result, "5.0");
        assert_eq!(step.effects, [Effect::CancelCountdown]);
        assert!(step.regions.contains(Region::Consensus));
    }

    #[test]
    fn reveal_naming_a_stranger_is_rejected() {
        let mirror = reduce(&connected("bob"), &snapshot(&["alice", "bob"], votes(&[]), true))
            .unwrap()
            .mirror;
        let err = reduce(
            &mirror,
            &RoomEvent::VotesRevealed {
                votes: votes(&[("alice", "5"), ("mallory", "100")]),
                result: "N/A".into(),
                details: "Strict: votes differ".into(),
            },
        )
        .unwrap_err();

        assert!(matches!(err, PokerRoomError::InvalidState(_)));
        assert!(!mirror.room.is_revealed);
    }

    #[test]
    fn new_round_resets_and_arms_timer() {
        let mut mirror = reduce(&connected("alice"), &snapshot(&["alice"], votes(&[("alice", "3")]), true))
            .unwrap()
            .mirror;
        mirror.select_card(Card::Three);
        mirror.room.is_revealed = true;

        let step = reduce(
            &mirror,
            &RoomEvent::NewRound {
                index: 1,
                use_timer: true,
                duration: 30,
            },
        )
        .unwrap();

        assert_eq!(step.mirror.room.current_story_index, Some(1));
        assert!(step.mirror.room.votes.is_empty());
        assert!(!step.mirror.room.is_revealed);
        assert_eq!(step.mirror.local.selected_card, None);
        assert_eq!(
            step.effects,
            [
                Effect::CancelCountdown,
                Effect::StartCountdown { seconds: 30 }
            ]
        );
        assert!(step.regions.contains(Region::CurrentStory));
    }

    #[test]
    fn new_round_past_backlog_is_rejected() {
        let mirror = reduce(&connected("alice"), &snapshot(&["alice"], votes(&[]), true))
            .unwrap()
            .mirror;
        let err = reduce(
            &mirror,
            &RoomEvent::NewRound {
                index: 2,
                use_timer: false,
                duration: 60,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PokerRoomError::InvalidState(_)));
    }

    #[test]
    fn restart_keeps_story_without_timer() {
        let mirror = reduce(&connected("alice"), &snapshot(&["alice"], votes(&[("alice", "3")]), true))
            .unwrap()
            .mirror;
        let step = reduce(
            &mirror,
            &RoomEvent::VoteRestarted {
                use_timer: false,
                duration: 60,
            },
        )
        .unwrap();

        assert_eq!(step.mirror.room.current_story_index, Some(0));
        assert!(step.mirror.room.votes.is_empty());
        assert_eq!(step.effects, [Effect::CancelCountdown]);
        assert!(!step.regions.contains(Region::CurrentStory));
    }

    #[test]
    fn backlog_ready_downloads_without_mutation() {
        let mirror = connected("alice");
        let step = reduce(
            &mirror,
            &RoomEvent::BacklogReady {
                backlog: vec![BacklogItem::new("Login", "OAuth")],
            },
        )
        .unwrap();

        assert_eq!(step.mirror, mirror);
        assert!(step.regions.is_empty());
        match &step.effects[..] {
            [Effect::Download(file)] => {
                assert_eq!(file.file_name, "backlog_ROOM1_estimations.json");
            }
            other => panic!("unexpected effects {other:?}"),
        }
    }

    #[test]
    fn server_error_only_alerts() {
        let mirror = connected("bob");
        let step = reduce(
            &mirror,
            &RoomEvent::ServerError {
                message: "Cannot vote after reveal.".into(),
            },
        )
        .unwrap();
        assert_eq!(step.mirror, mirror);
        assert_eq!(
            step.effects,
            [Effect::Alert("Cannot vote after reveal.".into())]
        );
    }

    #[test]
    fn disconnect_discards_mirror() {
        let mirror = reduce(&connected("alice"), &snapshot(&["alice"], votes(&[]), true))
            .unwrap()
            .mirror;
        let step = reduce(&mirror, &RoomEvent::Disconnected { reason: None }).unwrap();
        assert_eq!(step.mirror, RoomMirror::new("ROOM1", "alice"));
        assert_eq!(step.effects, [Effect::CancelCountdown]);
    }

    #[test]
    fn regions_set_operations() {
        let set = Regions::NONE.with(Region::Timer).with(Region::Deck);
        assert!(set.contains(Region::Timer));
        assert!(!set.contains(Region::Backlog));
        assert_eq!(set.iter().collect::<Vec<_>>(), [Region::Deck, Region::Timer]);
        assert_eq!(Regions::all().iter().count(), Region::ALL.len());
    }
}

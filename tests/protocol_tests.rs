#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests.
//!
//! Verifies the wire shape of every `ClientMessage`, decoding of
//! `ServerMessage` frames as the room server emits them (extra fields,
//! `{sid: name}` rosters, French backlog keys), and rejection of malformed
//! frames.

mod common;

use poker_room_client::protocol::{ClientMessage, ConsensusRule, RoomSnapshot, ServerMessage};
use poker_room_client::{parse_backlog, Card, RoomEvent, DECK};
use serde_json::json;

use common::{
    backlog_updated_json, error_json, new_round_json, session_ended_json, session_started_json,
    status_json, vote_restarted_json, vote_submitted_json, votes_revealed_json,
};

fn decode(frame: &str) -> ServerMessage {
    serde_json::from_str(frame).expect("server frame")
}

// ════════════════════════════════════════════════════════════════════
// ClientMessage wire shape
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_messages_use_event_and_data() {
    let cases = [
        (
            ClientMessage::Join {
                room_id: "K3X9QZ".into(),
                username: "alice".into(),
            },
            json!({"event": "join", "data": {"room_id": "K3X9QZ", "username": "alice"}}),
        ),
        (
            ClientMessage::SubmitVote {
                room_id: "K3X9QZ".into(),
                username: "bob".into(),
                vote: Card::Unknown,
            },
            json!({"event": "submit_vote", "data": {"room_id": "K3X9QZ", "username": "bob", "vote": "?"}}),
        ),
        (
            ClientMessage::RevealVotes {
                room_id: "K3X9QZ".into(),
            },
            json!({"event": "reveal_votes", "data": {"room_id": "K3X9QZ"}}),
        ),
        (
            ClientMessage::RequestBacklogDownload {
                room_id: "K3X9QZ".into(),
            },
            json!({"event": "request_backlog_download", "data": {"room_id": "K3X9QZ"}}),
        ),
        (
            ClientMessage::StartSession {
                room_id: "K3X9QZ".into(),
                use_timer: true,
                duration: 45,
            },
            json!({"event": "start_session", "data": {"room_id": "K3X9QZ", "use_timer": true, "duration": 45}}),
        ),
    ];

    for (msg, expected) in cases {
        assert_eq!(serde_json::to_value(&msg).unwrap(), expected, "{msg:?}");
        assert_eq!(expected["event"], msg.event_name());
    }
}

#[test]
fn every_deck_card_votes_as_its_face() {
    for card in DECK {
        let msg = ClientMessage::SubmitVote {
            room_id: "R".into(),
            username: "u".into(),
            vote: card,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["vote"], card.as_str());
    }
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage decoding
// ════════════════════════════════════════════════════════════════════

#[test]
fn status_snapshot_with_server_extras() {
    let frame = status_json("alice", &["alice", "bob"], &[("bob", "13")], true, false);
    let ServerMessage::Status(payload) = decode(&frame) else {
        panic!("expected status");
    };

    let state = &payload.current_state;
    assert_eq!(state.session_name, "Sprint 12");
    assert_eq!(state.session_type.as_deref(), Some("strict"));
    assert_eq!(state.current_story_index, Some(0));
    assert_eq!(state.timer_duration, Some(60));
    assert!(state.is_started);

    let mut roster = state.participants.clone();
    roster.sort();
    assert_eq!(roster, ["alice", "bob"]);
    assert_eq!(payload.participants, ["alice", "bob"]);
    assert_eq!(state.votes.get("bob").map(String::as_str), Some("13"));
}

#[test]
fn snapshot_backlog_accepts_french_name_key() {
    let frame = status_json("alice", &["alice"], &[], false, false);
    let ServerMessage::Status(payload) = decode(&frame) else {
        panic!("expected status");
    };
    let names: Vec<_> = payload
        .current_state
        .backlog
        .iter()
        .map(|item| item.name.as_str())
        .collect();
    assert_eq!(names, ["Login page", "Search", "Export"]);
}

#[test]
fn round_events_decode() {
    assert!(matches!(
        decode(&session_started_json(true, 120)),
        ServerMessage::SessionStarted {
            use_timer: true,
            duration: 120,
            current_story: Some(_),
            ..
        }
    ));
    assert!(matches!(
        decode(&new_round_json(2, false, 60)),
        ServerMessage::NewRound {
            index: 2,
            use_timer: false,
            ..
        }
    ));
    assert_eq!(
        decode(&vote_restarted_json(true, 30)),
        ServerMessage::VoteRestarted {
            use_timer: true,
            duration: 30
        }
    );
}

#[test]
fn vote_submitted_carries_roster_and_votes() {
    let msg = decode(&vote_submitted_json(
        &["alice", "bob", "carol"],
        &[("alice", "5"), ("carol", "?")],
    ));
    let ServerMessage::VoteSubmitted(payload) = msg else {
        panic!("expected vote_submitted");
    };
    assert_eq!(payload.participants.len(), 3);
    assert_eq!(payload.current_state.votes.len(), 2);
    assert!(!payload.voted_all);
}

#[test]
fn votes_revealed_carries_consensus() {
    let msg = decode(&votes_revealed_json(
        &[("alice", "5"), ("bob", "8")],
        "6.5",
        "Average of 2 numeric vote(s)",
    ));
    let event = RoomEvent::from(msg);
    assert!(matches!(
        event,
        RoomEvent::VotesRevealed { ref result, ref votes, .. } if result == "6.5" && votes.len() == 2
    ));
}

#[test]
fn closing_events_decode() {
    assert!(matches!(
        decode(&backlog_updated_json()),
        ServerMessage::BacklogUpdated { backlog_data } if backlog_data.len() == 3
    ));
    assert_eq!(
        decode(&session_ended_json("done")),
        ServerMessage::SessionEnded { msg: "done".into() }
    );
    assert_eq!(
        decode(&error_json("Cannot vote after reveal.")),
        ServerMessage::Error {
            msg: "Cannot vote after reveal.".into()
        }
    );
}

#[test]
fn minimal_snapshot_uses_defaults() {
    let snapshot: RoomSnapshot = serde_json::from_value(json!({
        "session_name": "Retro",
        "admin_name": "alice"
    }))
    .unwrap();
    assert!(snapshot.backlog.is_empty());
    assert!(snapshot.votes.is_empty());
    assert!(snapshot.participants.is_empty());
    assert!(!snapshot.is_revealed);
}

// ════════════════════════════════════════════════════════════════════
// Malformed frames
// ════════════════════════════════════════════════════════════════════

#[test]
fn malformed_frames_are_rejected() {
    let bad = [
        r#"{"event": "status"}"#,
        r#"{"event": "launch_missiles", "data": {}}"#,
        r#"{"data": {"msg": "no tag"}}"#,
        r#"{"event": "new_round", "data": {"index": -1}}"#,
        r#"{"event": "votes_revealed", "data": {"votes": {}}}"#,
        "not json at all",
    ];
    for frame in bad {
        assert!(
            serde_json::from_str::<ServerMessage>(frame).is_err(),
            "accepted {frame}"
        );
    }
}

#[test]
fn unknown_card_face_is_rejected() {
    let frame = r#"{"event": "submit_vote", "data": {"room_id": "R", "username": "u", "vote": "7"}}"#;
    assert!(serde_json::from_str::<ClientMessage>(frame).is_err());
}

// ════════════════════════════════════════════════════════════════════
// Enums and backlog files
// ════════════════════════════════════════════════════════════════════

#[test]
fn consensus_rule_is_lowercase() {
    assert_eq!(
        serde_json::to_value(ConsensusRule::Median).unwrap(),
        json!("median")
    );
    assert_eq!(
        serde_json::from_value::<ConsensusRule>(json!("average")).unwrap(),
        ConsensusRule::Average
    );
    assert_eq!(ConsensusRule::default(), ConsensusRule::Strict);
}

#[test]
fn uploaded_backlog_fills_placeholders() {
    let items = parse_backlog(r#"[{"nom": "Checkout"}, {"description": "orphan"}]"#).unwrap();
    assert_eq!(items[0].name, "Checkout");
    assert_eq!(items[0].description, "No description provided.");
    assert_eq!(items[1].name, "Unnamed task");
    assert!(!items[0].is_estimated());
}

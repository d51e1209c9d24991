#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Room view controller tests.
//!
//! Frames go through the real decoder (`ServerMessage` -> `RoomEvent`) and
//! the controller, so each scenario exercises the path a live room takes.

mod common;

use std::time::Duration;

use poker_room_client::protocol::ServerMessage;
use poker_room_client::render::CardFace;
use poker_room_client::{
    render, Card, Gesture, Intent, PokerRoomClient, PokerRoomConfig, RoomController, RoomEvent,
    TimerDisplay,
};
use tokio::sync::mpsc;

use common::{
    new_round_json, sent_messages, session_started_json, status_json, vote_restarted_json,
    vote_submitted_json, votes_revealed_json, MockTransport, RecordingRenderer,
};

type Controller = RoomController<RecordingRenderer, mpsc::UnboundedSender<Intent>>;

fn event(frame: &str) -> RoomEvent {
    RoomEvent::from(serde_json::from_str::<ServerMessage>(frame).unwrap())
}

fn controller(user: &str) -> (Controller, mpsc::UnboundedReceiver<Intent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut ctl = RoomController::new("K3X9QZ", user, RecordingRenderer::default(), tx);
    ctl.handle_event(RoomEvent::Connected).unwrap();
    (ctl, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Intent>) -> Vec<Intent> {
    let mut out = Vec::new();
    while let Ok(intent) = rx.try_recv() {
        out.push(intent);
    }
    out
}

// ════════════════════════════════════════════════════════════════════
// Snapshot rendering
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn participant_rows_match_snapshot_and_voters_are_checked() {
    let (mut ctl, _intents) = controller("bob");
    ctl.handle_event(event(&status_json(
        "alice",
        &["alice", "bob", "carol", "dave"],
        &[("alice", "3"), ("dave", "8")],
        true,
        false,
    )))
    .unwrap();

    let view = ctl.renderer().last_view();
    assert_eq!(view.participant_count, 4);
    assert_eq!(view.participants.len(), 4);
    let checked: Vec<_> = view
        .participants
        .iter()
        .filter(|row| row.voted)
        .map(|row| row.name.as_str())
        .collect();
    assert_eq!(checked, ["alice", "dave"]);
}

#[tokio::test]
async fn same_snapshot_twice_renders_identically() {
    let (mut ctl, _intents) = controller("bob");
    let frame = status_json("alice", &["alice", "bob"], &[("alice", "5")], true, false);

    ctl.handle_event(event(&frame)).unwrap();
    let first = render(ctl.mirror());
    ctl.handle_event(event(&frame)).unwrap();
    let second = render(ctl.mirror());

    assert_eq!(first, second);
    assert_eq!(second.messages.len(), 1);
}

#[tokio::test]
async fn own_card_never_in_others_votes() {
    let (mut ctl, _intents) = controller("bob");
    ctl.handle_event(event(&status_json(
        "alice",
        &["alice", "bob"],
        &[("bob", "5")],
        true,
        false,
    )))
    .unwrap();

    let view = ctl.view();
    assert!(view.other_votes.iter().all(|card| card.username != "bob"));
    assert_eq!(view.other_votes[0].face, CardFace::Pending);
}

// ════════════════════════════════════════════════════════════════════
// Full round
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn three_participants_reveal_and_advance() {
    let (mut ctl, mut intents) = controller("alice");
    let roster = ["alice", "bob", "carol"];

    ctl.handle_event(event(&status_json("alice", &roster, &[("bob", "5")], true, false)))
        .unwrap();
    assert_eq!(ctl.view().vote_progress(), "1/3");

    ctl.handle_event(event(&vote_submitted_json(
        &roster,
        &[("bob", "5"), ("carol", "5"), ("alice", "8")],
    )))
    .unwrap();
    assert_eq!(ctl.view().vote_progress(), "3/3");
    // Everyone voted on an untimed round: the admin's client asks to reveal.
    assert_eq!(drain(&mut intents), [Intent::RevealVotes]);

    ctl.handle_event(event(&votes_revealed_json(
        &[("bob", "5"), ("carol", "5"), ("alice", "8")],
        "N/A",
        "Strict: votes differ",
    )))
    .unwrap();
    let view = ctl.view();
    assert_eq!(view.consensus.as_ref().unwrap().details, "Strict: votes differ");
    assert_eq!(
        view.other_votes
            .iter()
            .map(|card| card.face.clone())
            .collect::<Vec<_>>(),
        [
            CardFace::Revealed("5".into()),
            CardFace::Revealed("5".into())
        ]
    );
    assert!(!view.admin.next_disabled);

    ctl.handle_gesture(Gesture::NextTask).unwrap();
    assert_eq!(drain(&mut intents), [Intent::NextTask]);

    ctl.handle_event(event(&new_round_json(1, false, 60))).unwrap();
    let mirror = ctl.mirror();
    assert_eq!(mirror.room.current_story_index, Some(1));
    assert!(mirror.room.votes.is_empty());
    assert_eq!(ctl.view().current_story.unwrap().name, "Search");
}

#[tokio::test]
async fn round_reset_clears_selection_and_disables_actions() {
    let (mut ctl, _intents) = controller("alice");
    ctl.handle_event(event(&status_json("alice", &["alice", "bob"], &[], true, false)))
        .unwrap();
    ctl.handle_gesture(Gesture::SelectCard(Card::Thirteen)).unwrap();
    ctl.handle_event(event(&votes_revealed_json(&[("alice", "13")], "13", "Only one vote")))
        .unwrap();

    ctl.handle_event(event(&vote_restarted_json(false, 60))).unwrap();

    let view = ctl.view();
    assert!(view.deck.iter().all(|card| !card.selected));
    assert!(view.admin.reveal_disabled);
    assert!(view.admin.next_disabled);
    assert!(view.admin.restart_disabled);
    assert!(view.consensus.is_none());
    assert!(view
        .other_votes
        .iter()
        .all(|card| card.face == CardFace::Pending));
}

#[tokio::test]
async fn session_start_hides_start_controls() {
    let (mut ctl, _intents) = controller("alice");
    ctl.handle_event(event(&status_json("alice", &["alice"], &[], false, false)))
        .unwrap();
    assert!(ctl.view().admin.start_visible);

    ctl.handle_event(event(&session_started_json(false, 60))).unwrap();
    assert!(!ctl.view().admin.start_visible);
    assert!(ctl.mirror().room.is_started);
}

// ════════════════════════════════════════════════════════════════════
// Countdown, in paused time
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn one_second_timer_reveals_exactly_once() {
    let (tx, mut intents) = mpsc::unbounded_channel();
    let ctl = RoomController::new("K3X9QZ", "alice", RecordingRenderer::default(), tx);
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_gestures_tx, gestures_rx) = mpsc::channel(16);
    let running = tokio::spawn(ctl.run(events_rx, gestures_rx));

    events_tx.send(RoomEvent::Connected).await.unwrap();
    events_tx
        .send(event(&status_json("alice", &["alice", "bob"], &[], true, true)))
        .await
        .unwrap();
    events_tx
        .send(event(&new_round_json(0, true, 1)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(intents.recv().await, Some(Intent::RevealVotes));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(intents.try_recv().is_err());

    drop(events_tx);
    let ctl = running.await.unwrap();
    assert_eq!(ctl.mirror().local.timer, TimerDisplay::Finished);
    assert!(ctl
        .renderer()
        .frames
        .iter()
        .any(|(view, _)| view.timer == TimerDisplay::Finished));
}

#[tokio::test(start_paused = true)]
async fn guest_timer_finishes_silently() {
    let (tx, mut intents) = mpsc::unbounded_channel();
    let ctl = RoomController::new("K3X9QZ", "bob", RecordingRenderer::default(), tx);
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_gestures_tx, gestures_rx) = mpsc::channel(16);
    let running = tokio::spawn(ctl.run(events_rx, gestures_rx));

    events_tx
        .send(event(&status_json("alice", &["alice", "bob"], &[], true, true)))
        .await
        .unwrap();
    events_tx
        .send(event(&vote_restarted_json(true, 3)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    drop(events_tx);
    let ctl = running.await.unwrap();

    assert_eq!(ctl.mirror().local.timer, TimerDisplay::Finished);
    assert!(intents.try_recv().is_err());
    let shown: Vec<_> = ctl
        .renderer()
        .frames
        .iter()
        .map(|(view, _)| view.timer)
        .collect();
    for expected in [
        TimerDisplay::Remaining(3),
        TimerDisplay::Remaining(2),
        TimerDisplay::Remaining(1),
        TimerDisplay::Finished,
    ] {
        assert!(shown.contains(&expected), "{expected:?} never rendered");
    }
}

#[tokio::test(start_paused = true)]
async fn restart_cancels_previous_countdown() {
    let (tx, _intents) = mpsc::unbounded_channel();
    let ctl = RoomController::new("K3X9QZ", "bob", RecordingRenderer::default(), tx);
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_gestures_tx, gestures_rx) = mpsc::channel(16);
    let running = tokio::spawn(ctl.run(events_rx, gestures_rx));

    events_tx
        .send(event(&status_json("alice", &["alice", "bob"], &[], true, true)))
        .await
        .unwrap();
    events_tx
        .send(event(&vote_restarted_json(true, 60)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    events_tx
        .send(event(&vote_restarted_json(true, 60)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    drop(events_tx);
    let ctl = running.await.unwrap();
    // Only the second countdown kept ticking: 60 - 5.
    assert_eq!(ctl.mirror().local.timer, TimerDisplay::Remaining(55));
}

// ════════════════════════════════════════════════════════════════════
// Wired to a real client
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn controller_drives_client_end_to_end() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(status_json("alice", &["alice", "bob"], &[], true, false))),
        Some(Ok(vote_submitted_json(
            &["alice", "bob"],
            &[("alice", "5"), ("bob", "5")],
        ))),
    ]);
    let (client, events) = PokerRoomClient::start(transport, PokerRoomConfig::new("K3X9QZ", "alice"));
    let ctl = RoomController::new(
        "K3X9QZ",
        "alice",
        RecordingRenderer::default(),
        std::sync::Arc::new(client),
    );
    let (_gestures_tx, gestures_rx) = mpsc::channel(16);
    let running = tokio::spawn(ctl.run(events, gestures_rx));

    let names = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let names: Vec<_> = sent_messages(&sent)
                .iter()
                .map(|msg| msg.event_name())
                .collect();
            if names.len() >= 2 {
                return names;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("auto-reveal reaches the transport");

    assert_eq!(names, ["join", "reveal_votes"]);
    running.abort();
}

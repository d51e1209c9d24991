//! Integration-style client tests.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server frames
//! and verify that `PokerRoomClient` maps them to room events, addresses every
//! intent to its room and shuts down cleanly.

mod common;

use std::time::Duration;

use poker_room_client::protocol::ClientMessage;
use poker_room_client::{
    Card, Intent, IntentSink, PokerRoomClient, PokerRoomConfig, PokerRoomError, RoomEvent,
};

use common::{
    backlog_updated_json, error_json, new_round_json, sent_messages, session_ended_json,
    session_started_json, status_json, vote_restarted_json, vote_submitted_json,
    votes_revealed_json, MockTransport,
};

#[allow(clippy::type_complexity)]
fn start_client(
    username: &str,
    incoming: Vec<Option<Result<String, PokerRoomError>>>,
) -> (
    PokerRoomClient,
    tokio::sync::mpsc::Receiver<RoomEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let config = PokerRoomConfig::new("K3X9QZ", username);
    let (client, events) = PokerRoomClient::start(transport, config);
    (client, events, sent, closed)
}

async fn next(rx: &mut tokio::sync::mpsc::Receiver<RoomEvent>) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event within a second")
        .expect("channel open")
}

// ════════════════════════════════════════════════════════════════════
// Event mapping
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_round_maps_every_server_event() {
    let (mut client, mut events, _sent, _closed) = start_client(
        "alice",
        vec![
            Some(Ok(status_json("alice", &["alice", "bob"], &[], false, false))),
            Some(Ok(session_started_json(true, 90))),
            Some(Ok(vote_submitted_json(&["alice", "bob"], &[("bob", "8")]))),
            Some(Ok(votes_revealed_json(
                &[("bob", "8")],
                "8",
                "Strict: every numeric vote is 8",
            ))),
            Some(Ok(new_round_json(1, true, 90))),
            Some(Ok(vote_restarted_json(false, 60))),
            Some(Ok(backlog_updated_json())),
            Some(Ok(session_ended_json("All stories have been estimated."))),
            None,
        ],
    );

    assert_eq!(next(&mut events).await, RoomEvent::Connected);

    match next(&mut events).await {
        RoomEvent::Snapshot {
            participants,
            state,
            message,
        } => {
            assert_eq!(participants, ["alice", "bob"]);
            assert_eq!(state.admin_name, "alice");
            assert_eq!(state.backlog.len(), 3);
            assert_eq!(state.backlog[1].name, "Search");
            assert_eq!(message, "bob joined the room.");
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }

    assert_eq!(
        next(&mut events).await,
        RoomEvent::SessionStarted {
            use_timer: true,
            duration: 90
        }
    );
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::VoteSubmitted { votes, .. } if votes.get("bob").map(String::as_str) == Some("8")
    ));
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::VotesRevealed { result, .. } if result == "8"
    ));
    assert_eq!(
        next(&mut events).await,
        RoomEvent::NewRound {
            index: 1,
            use_timer: true,
            duration: 90
        }
    );
    assert_eq!(
        next(&mut events).await,
        RoomEvent::VoteRestarted {
            use_timer: false,
            duration: 60
        }
    );
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::BacklogReady { backlog } if backlog.len() == 3
    ));
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::SessionEnded { .. }
    ));
    assert_eq!(
        next(&mut events).await,
        RoomEvent::Disconnected { reason: None }
    );

    client.shutdown().await;
}

#[tokio::test]
async fn server_error_is_delivered_as_event() {
    let (mut client, mut events, _sent, _closed) = start_client(
        "bob",
        vec![Some(Ok(error_json("Only the admin can reveal votes.")))],
    );

    let _ = next(&mut events).await; // Connected
    assert_eq!(
        next(&mut events).await,
        RoomEvent::ServerError {
            message: "Only the admin can reveal votes.".into()
        }
    );
    // A domain error does not end the connection.
    assert!(client.is_connected());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Outbound intents
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn admin_intents_name_the_room() {
    let (mut client, mut events, sent, _closed) = start_client("alice", vec![]);
    let _ = next(&mut events).await; // Connected

    client.start_session(false, 60).unwrap();
    client.reveal_votes().unwrap();
    client.next_task().unwrap();
    client.restart_vote().unwrap();
    client.request_backlog_download().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let names: Vec<_> = sent_messages(&sent)
        .iter()
        .map(ClientMessage::event_name)
        .collect();
    assert_eq!(
        names,
        [
            "join",
            "start_session",
            "reveal_votes",
            "next_task",
            "restart_vote",
            "request_backlog_download"
        ]
    );
    for frame in sent.lock().unwrap().iter() {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        assert_eq!(value["data"]["room_id"], "K3X9QZ");
    }

    client.shutdown().await;
}

#[tokio::test]
async fn vote_frame_matches_server_shape() {
    let (mut client, mut events, sent, _closed) = start_client("bob", vec![]);
    let _ = next(&mut events).await; // Connected

    client.submit_vote(Card::Break).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frames = sent.lock().unwrap().clone();
    let vote: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
    assert_eq!(
        vote,
        serde_json::json!({
            "event": "submit_vote",
            "data": {"room_id": "K3X9QZ", "username": "bob", "vote": "☕️"}
        })
    );

    client.shutdown().await;
}

#[tokio::test]
async fn client_is_an_intent_sink() {
    let (mut client, mut events, sent, _closed) = start_client("alice", vec![]);
    let _ = next(&mut events).await; // Connected

    let sink: &dyn IntentSink = &client;
    sink.send_intent(Intent::RevealVotes).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        sent_messages(&sent).last(),
        Some(&ClientMessage::RevealVotes {
            room_id: "K3X9QZ".into()
        })
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn shutdown_closes_transport_and_ends_stream() {
    let (mut client, mut events, _sent, closed) = start_client("alice", vec![]);
    let _ = next(&mut events).await; // Connected

    client.shutdown().await;

    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::Disconnected { reason: Some(_) }
    ));
    assert!(events.recv().await.is_none());
    assert!(matches!(
        client.submit_vote(Card::One),
        Err(PokerRoomError::NotConnected)
    ));
}

#[tokio::test]
async fn dropping_client_stops_the_loop() {
    let (client, mut events, _sent, _closed) = start_client("alice", vec![]);
    let _ = next(&mut events).await; // Connected

    drop(client);

    // The aborted loop drops its sender; the stream ends.
    let end = tokio::time::timeout(Duration::from_secs(1), async {
        while events.recv().await.is_some() {}
    })
    .await;
    assert!(end.is_ok());
}

#[tokio::test]
async fn debug_shows_identity_and_state() {
    let (mut client, mut events, _sent, _closed) = start_client("alice", vec![]);
    let _ = next(&mut events).await; // Connected

    let debug = format!("{client:?}");
    assert!(debug.contains("PokerRoomClient"));
    assert!(debug.contains("K3X9QZ"));
    assert!(debug.contains("connected: true"));

    client.shutdown().await;
}

//! # Loopback Room Example
//!
//! Runs a whole estimation round without a network:
//!
//! 1. A `LoopbackTransport` connects the client to an in-process fake server
//! 2. The fake server answers intents the way the room server does
//! 3. A `RoomController` renders to stdout while scripted gestures play
//! 4. Everyone votes, the admin's client auto-reveals, the round advances
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_room
//! RUST_LOG=debug cargo run --example loopback_room
//! ```

use std::time::Duration;

use async_trait::async_trait;
use poker_room_client::protocol::{
    ClientMessage, RoomSnapshot, ServerMessage, StatusPayload, VoteMap, VoteSubmittedPayload,
    VoteTally,
};
use poker_room_client::render::{RoomRenderer, RoomView};
use poker_room_client::{
    BacklogFile, BacklogItem, Card, Gesture, PokerRoomClient, PokerRoomConfig, PokerRoomError,
    Region, Regions, RoomController, Transport,
};
use tokio::sync::mpsc;

const ROOM_ID: &str = "LOOP01";
const ADMIN: &str = "alice";
const BOT: &str = "bob";

// ── Transport ───────────────────────────────────────────────────────

/// Both directions of the connection as in-process channels.
struct LoopbackTransport {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), PokerRoomError> {
        self.to_server
            .send(message)
            .map_err(|_| PokerRoomError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, PokerRoomError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), PokerRoomError> {
        Ok(())
    }
}

// ── Fake server ─────────────────────────────────────────────────────

struct FakeRoom {
    backlog: Vec<BacklogItem>,
    index: usize,
    votes: VoteMap,
    started: bool,
}

impl FakeRoom {
    fn participants() -> Vec<String> {
        vec![ADMIN.to_string(), BOT.to_string()]
    }

    fn status(&self, msg: &str) -> ServerMessage {
        ServerMessage::Status(Box::new(StatusPayload {
            msg: msg.to_string(),
            participants: Self::participants(),
            current_state: RoomSnapshot {
                session_name: "Loopback sprint".into(),
                session_type: Some("strict".into()),
                admin_name: ADMIN.into(),
                backlog: self.backlog.clone(),
                current_story_index: Some(self.index),
                votes: self.votes.clone(),
                is_revealed: false,
                is_started: self.started,
                use_timer: false,
                timer_duration: Some(60),
                participants: Self::participants(),
            },
        }))
    }

    fn vote(&mut self, username: String, card: Card) -> ServerMessage {
        self.votes.insert(username, card.to_string());
        ServerMessage::VoteSubmitted(Box::new(VoteSubmittedPayload {
            msg: None,
            participants: Self::participants(),
            current_state: VoteTally {
                votes: self.votes.clone(),
            },
            voted_all: self.votes.len() == Self::participants().len(),
        }))
    }

    fn reveal(&mut self) -> ServerMessage {
        let mut faces = self.votes.values();
        let first = faces.next().cloned().unwrap_or_default();
        let unanimous = faces.all(|face| *face == first);
        let (result, details) = if unanimous {
            (first.clone(), format!("Strict: every vote is {first}"))
        } else {
            ("N/A".to_string(), "Strict: votes differ".to_string())
        };
        if let Some(item) = self.backlog.get_mut(self.index) {
            item.final_vote = Some(result.clone());
            item.consensus_rule = Some("strict".into());
            item.votes_submitted = self.votes.clone();
        }
        ServerMessage::VotesRevealed {
            votes: self.votes.clone(),
            result,
            details,
        }
    }

    fn next(&mut self) -> ServerMessage {
        self.votes.clear();
        if self.index + 1 >= self.backlog.len() {
            return ServerMessage::SessionEnded {
                msg: "Every backlog story has been estimated!".into(),
            };
        }
        self.index += 1;
        ServerMessage::NewRound {
            index: self.index,
            use_timer: false,
            duration: 60,
            current_story: self.backlog.get(self.index).cloned(),
        }
    }
}

async fn fake_server(
    mut from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
) -> Result<(), PokerRoomError> {
    let mut room = FakeRoom {
        backlog: vec![
            BacklogItem::new("Login page", "OAuth sign-in"),
            BacklogItem::new("Search", "Full text search"),
        ],
        index: 0,
        votes: VoteMap::new(),
        started: false,
    };

    while let Some(frame) = from_client.recv().await {
        let replies = match serde_json::from_str::<ClientMessage>(&frame)? {
            ClientMessage::Join { username, .. } => {
                vec![room.status(&format!("{username} joined the room."))]
            }
            ClientMessage::StartSession {
                use_timer,
                duration,
                ..
            } => {
                room.started = true;
                vec![
                    ServerMessage::SessionStarted {
                        is_started: true,
                        use_timer,
                        duration,
                        current_story: room.backlog.first().cloned(),
                    },
                    room.vote(BOT.into(), Card::Five),
                ]
            }
            ClientMessage::SubmitVote { username, vote, .. } => vec![room.vote(username, vote)],
            ClientMessage::RevealVotes { .. } => vec![room.reveal()],
            ClientMessage::NextTask { .. } => {
                let next = room.next();
                let done = matches!(next, ServerMessage::SessionEnded { .. });
                let mut replies = vec![next];
                if !done {
                    replies.push(room.vote(BOT.into(), Card::Eight));
                }
                replies
            }
            ClientMessage::RestartVote { .. } => {
                room.votes.clear();
                vec![ServerMessage::VoteRestarted {
                    use_timer: false,
                    duration: 60,
                }]
            }
            ClientMessage::RequestBacklogDownload { .. } => vec![ServerMessage::BacklogUpdated {
                backlog_data: room.backlog.clone(),
            }],
        };

        let ended = replies
            .iter()
            .any(|reply| matches!(reply, ServerMessage::SessionEnded { .. }));
        for reply in replies {
            if to_client.send(serde_json::to_string(&reply)?).is_err() {
                return Ok(());
            }
        }
        if ended {
            // Closing our side ends the client's transport loop.
            return Ok(());
        }
    }
    Ok(())
}

// ── Renderer ────────────────────────────────────────────────────────

struct StdoutRenderer;

impl RoomRenderer for StdoutRenderer {
    fn render(&mut self, view: &RoomView, regions: Regions) {
        if regions.contains(Region::Participants) {
            let rows: Vec<_> = view.participants.iter().map(ToString::to_string).collect();
            println!("  participants [{}]: {}", view.vote_progress(), rows.join(", "));
        }
        if regions.contains(Region::CurrentStory) {
            if let Some(story) = &view.current_story {
                println!(
                    "  story {}/{}: {} ({})",
                    story.position, story.total, story.name, story.description
                );
            }
        }
        if regions.contains(Region::Consensus) {
            if let Some(consensus) = &view.consensus {
                println!("  consensus: {} ({})", consensus.result, consensus.details);
            }
        }
        if regions.contains(Region::Messages) {
            if let Some(line) = view.messages.last() {
                println!("  > {line}");
            }
        }
    }

    fn alert(&mut self, message: &str) {
        println!("  ALERT: {message}");
    }

    fn download(&mut self, file: &BacklogFile) {
        println!("  download {} ({} bytes)", file.file_name, file.contents.len());
    }
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();
    let server = tokio::spawn(fake_server(from_client, to_client));

    let transport = LoopbackTransport {
        to_server,
        from_server,
    };
    let (client, events) = PokerRoomClient::start(transport, PokerRoomConfig::new(ROOM_ID, ADMIN));
    let controller = RoomController::new(ROOM_ID, ADMIN, StdoutRenderer, std::sync::Arc::new(client));

    let (gestures, gesture_rx) = mpsc::channel(8);
    let script = tokio::spawn(async move {
        let steps = [
            Gesture::StartSession {
                use_timer: false,
                duration: 60,
            },
            // bob already voted 5; this completes the round and triggers auto-reveal.
            Gesture::SelectCard(Card::Five),
            Gesture::NextTask,
            Gesture::SelectCard(Card::Thirteen),
            Gesture::DownloadBacklog,
            Gesture::NextTask,
        ];
        for gesture in steps {
            tokio::time::sleep(Duration::from_millis(200)).await;
            println!("gesture: {gesture:?}");
            if gestures.send(gesture).await.is_err() {
                break;
            }
        }
    });

    let controller = tokio::time::timeout(Duration::from_secs(5), controller.run(events, gesture_rx)).await;
    script.abort();
    server.abort();

    match controller {
        Ok(controller) => println!("room closed: {controller:?}"),
        Err(_) => tracing::warn!("room did not close in time"),
    }
    Ok(())
}

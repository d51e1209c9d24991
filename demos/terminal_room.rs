//! # Terminal Room Example
//!
//! Joins a live planning poker room over WebSocket and plays it from a
//! terminal:
//!
//! 1. Connect to the room server
//! 2. Join `POKER_ROOM_ID` as `POKER_USERNAME`
//! 3. Redraw the room on stdout whenever the controller repaints
//! 4. Read commands from stdin (`vote 8`, `reveal`, `next`, ...)
//!
//! ## Running
//!
//! ```sh
//! POKER_ROOM_ID=3F2A9C1B POKER_USERNAME=bob cargo run --example terminal_room
//!
//! # Override the server URL:
//! POKER_ROOM_URL=ws://poker.internal:5000/ws cargo run --example terminal_room
//! ```

use std::sync::Arc;

use poker_room_client::render::{CardFace, RoomRenderer, RoomView};
use poker_room_client::{
    BacklogFile, Card, Gesture, PokerRoomClient, PokerRoomConfig, Region, Regions,
    RoomController, WebSocketTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Default server URL when `POKER_ROOM_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:5000/ws";

const HELP: &str = "commands: vote <card> | reveal | next | restart | download | start [seconds] | quit";

// ── Renderer ────────────────────────────────────────────────────────

struct TerminalRenderer;

impl RoomRenderer for TerminalRenderer {
    fn render(&mut self, view: &RoomView, regions: Regions) {
        if regions.contains(Region::Title) {
            println!("== {} ==", view.session_title);
        }
        if regions.contains(Region::Participants) {
            println!("participants ({} voted):", view.vote_progress());
            for row in &view.participants {
                println!("  {row}");
            }
        }
        if regions.contains(Region::OtherVotes) {
            let cards: Vec<_> = view
                .other_votes
                .iter()
                .map(|card| {
                    let face = match &card.face {
                        CardFace::Back => "[#]".to_string(),
                        CardFace::Pending => "[ ]".to_string(),
                        CardFace::Revealed(value) => format!("[{value}]"),
                        CardFace::NoVote => "[-]".to_string(),
                    };
                    format!("{} {face}", card.username)
                })
                .collect();
            println!("votes: {}", cards.join("  "));
        }
        if regions.contains(Region::Deck) && !view.deck.is_empty() {
            let deck: Vec<_> = view
                .deck
                .iter()
                .map(|card| {
                    if card.selected {
                        format!("<{}>", card.card)
                    } else {
                        card.card.to_string()
                    }
                })
                .collect();
            println!("deck: {}", deck.join(" "));
        }
        if regions.contains(Region::Backlog) {
            for row in &view.backlog {
                let marker = if row.is_current { ">" } else { " " };
                let estimate = row.estimate.as_deref().unwrap_or("");
                println!("{marker} {row} {estimate}");
            }
        }
        if regions.contains(Region::CurrentStory) {
            if let Some(story) = &view.current_story {
                println!(
                    "story {}/{}: {}\n  {}",
                    story.position, story.total, story.name, story.description
                );
            }
        }
        if regions.contains(Region::Timer) {
            println!("timer: {}", view.timer);
        }
        if regions.contains(Region::Consensus) {
            if let Some(consensus) = &view.consensus {
                println!("consensus: {} ({})", consensus.result, consensus.details);
            }
        }
        if regions.contains(Region::AdminControls) && view.admin.visible {
            let state = |disabled: bool| if disabled { "off" } else { "on" };
            println!(
                "admin: reveal {} | next {} | restart {}{}",
                state(view.admin.reveal_disabled),
                state(view.admin.next_disabled),
                state(view.admin.restart_disabled),
                if view.admin.start_visible { " | start available" } else { "" },
            );
        }
        if regions.contains(Region::Messages) {
            if let Some(line) = view.messages.last() {
                println!("> {line}");
            }
        }
        if view.session_ended && regions.contains(Region::Messages) {
            println!("session ended");
        }
    }

    fn alert(&mut self, message: &str) {
        eprintln!("!! {message}");
    }

    fn download(&mut self, file: &BacklogFile) {
        match std::fs::write(&file.file_name, &file.contents) {
            Ok(()) => println!("saved {}", file.file_name),
            Err(e) => eprintln!("!! could not save {}: {e}", file.file_name),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

enum Command {
    Gesture(Gesture),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let gesture = match words.next()? {
        "vote" => Gesture::SelectCard(words.next()?.parse::<Card>().ok()?),
        "reveal" => Gesture::RevealVotes,
        "next" => Gesture::NextTask,
        "restart" => Gesture::RestartVote,
        "download" => Gesture::DownloadBacklog,
        "start" => match words.next() {
            Some(seconds) => Gesture::StartSession {
                use_timer: true,
                duration: seconds.parse().ok()?,
            },
            None => Gesture::StartSession {
                use_timer: false,
                duration: 60,
            },
        },
        "quit" | "exit" => return Some(Command::Quit),
        _ => return None,
    };
    Some(Command::Gesture(gesture))
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("POKER_ROOM_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room_id = std::env::var("POKER_ROOM_ID")?;
    let username = std::env::var("POKER_USERNAME")?;
    tracing::info!("Connecting to {url} as {username}");

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect(&url).await?;
    let (client, events) =
        PokerRoomClient::start(transport, PokerRoomConfig::new(room_id.clone(), username.clone()));
    let client = Arc::new(client);
    let controller = RoomController::new(room_id, username, TerminalRenderer, Arc::clone(&client));

    // ── Stdin ───────────────────────────────────────────────────────
    let (gesture_tx, gesture_rx) = mpsc::channel(16);
    let (quit_tx, quit_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(Command::Gesture(gesture)) => {
                    if gesture_tx.send(gesture).await.is_err() {
                        break;
                    }
                }
                Some(Command::Quit) => break,
                None => println!("{HELP}"),
            }
        }
        let _ = quit_tx.send(());
    });

    // ── Run ─────────────────────────────────────────────────────────
    tokio::select! {
        _ = controller.run(events, gesture_rx) => {
            tracing::info!("Room closed");
        }
        _ = quit_rx => {
            tracing::info!("Leaving room");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, leaving room");
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    // The controller's clone is gone once the select above returns.
    if let Ok(mut client) = Arc::try_unwrap(client) {
        client.shutdown().await;
    }
    Ok(())
}

//! The room view controller.
//!
//! [`RoomController`] owns the [`RoomMirror`], a [`RoomRenderer`] and an
//! [`IntentSink`]. It feeds room events through [`reduce`], carries out the
//! returned [`Effect`]s, turns local [`Gesture`]s into intents and drives the
//! round countdown. [`RoomController::run`] multiplexes all three inputs on one
//! task, so the mirror never needs a lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::card::Card;
use crate::countdown::{Countdown, CountdownHandle};
use crate::error::{PokerRoomError, Result};
use crate::event::RoomEvent;
use crate::intent::Intent;
use crate::reducer::{reduce, Effect, Region, Regions};
use crate::render::{render, RoomRenderer, RoomView};
use crate::state::RoomMirror;

/// Where the controller sends intents.
pub trait IntentSink {
    /// Queue `intent` for the server.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::NotConnected`] once the connection is gone.
    fn send_intent(&self, intent: Intent) -> Result<()>;
}

impl IntentSink for mpsc::UnboundedSender<Intent> {
    fn send_intent(&self, intent: Intent) -> Result<()> {
        self.send(intent).map_err(|_| PokerRoomError::NotConnected)
    }
}

impl<T: IntentSink + ?Sized> IntentSink for Arc<T> {
    fn send_intent(&self, intent: Intent) -> Result<()> {
        (**self).send_intent(intent)
    }
}

/// A local user action on the room view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    SelectCard(Card),
    RevealVotes,
    NextTask,
    RestartVote,
    DownloadBacklog,
    StartSession { use_timer: bool, duration: u32 },
}

/// Controller for one room view.
pub struct RoomController<R, S> {
    mirror: RoomMirror,
    renderer: R,
    sink: S,
    countdown: Option<(Countdown, CountdownHandle)>,
    generation: u64,
    tick_period: Duration,
    tick_tx: mpsc::UnboundedSender<u64>,
    tick_rx: Option<mpsc::UnboundedReceiver<u64>>,
}

impl<R: RoomRenderer, S: IntentSink> RoomController<R, S> {
    /// A controller with an empty mirror for `username` in `room_id`.
    pub fn new(room_id: impl Into<String>, username: impl Into<String>, renderer: R, sink: S) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        Self {
            mirror: RoomMirror::new(room_id, username),
            renderer,
            sink,
            countdown: None,
            generation: 0,
            tick_period: Duration::from_secs(1),
            tick_tx,
            tick_rx: Some(tick_rx),
        }
    }

    /// Change how long one countdown second lasts. Takes effect on the next
    /// countdown.
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn mirror(&self) -> &RoomMirror {
        &self.mirror
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn view(&self) -> RoomView {
        render(&self.mirror)
    }

    /// Generation of the running countdown, if any.
    pub fn countdown_generation(&self) -> Option<u64> {
        self.countdown.as_ref().map(|(_, handle)| handle.generation())
    }

    /// Apply one room event.
    ///
    /// # Errors
    ///
    /// Whatever [`reduce`] rejects. The mirror and the UI are left as they
    /// were.
    pub fn handle_event(&mut self, event: RoomEvent) -> Result<()> {
        debug!(event = event.kind(), "room event");
        let step = match reduce(&self.mirror, &event) {
            Ok(step) => step,
            Err(e) => {
                error!(event = event.kind(), "rejected room event: {e}");
                return Err(e);
            }
        };

        self.mirror = step.mirror;
        let mut regions = step.regions;
        for effect in step.effects {
            regions = regions.union(self.apply(effect));
        }
        self.repaint(regions);
        Ok(())
    }

    /// Apply one local gesture.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::NotConnected`] when the intent cannot be queued.
    pub fn handle_gesture(&mut self, gesture: Gesture) -> Result<()> {
        debug!(?gesture, "gesture");
        match gesture {
            Gesture::SelectCard(card) => {
                self.mirror.select_card(card);
                self.repaint(Regions::NONE.with(Region::Deck));
                self.sink.send_intent(Intent::SubmitVote(card))
            }
            Gesture::RevealVotes => {
                self.mirror.local.reveal_requested = true;
                self.sink.send_intent(Intent::RevealVotes)
            }
            Gesture::NextTask => self.sink.send_intent(Intent::NextTask),
            Gesture::RestartVote => self.sink.send_intent(Intent::RestartVote),
            Gesture::DownloadBacklog => self.sink.send_intent(Intent::RequestBacklogDownload),
            Gesture::StartSession {
                use_timer,
                duration,
            } => self.sink.send_intent(Intent::StartSession {
                use_timer,
                duration,
            }),
        }
    }

    /// One countdown second elapsed for `generation`. Ticks from a cancelled
    /// countdown are ignored.
    pub fn handle_tick(&mut self, generation: u64) {
        let Some((countdown, handle)) = self.countdown.as_mut() else {
            debug!(generation, "tick without a countdown");
            return;
        };
        if handle.generation() != generation {
            debug!(generation, current = handle.generation(), "stale tick");
            return;
        }

        self.mirror.local.timer = countdown.tick();
        let mut regions = Regions::NONE.with(Region::Timer);
        if countdown.is_finished() {
            self.countdown = None;
            regions = regions.union(self.countdown_finished());
        }
        self.repaint(regions);
    }

    /// Drive the controller until `events` closes.
    ///
    /// Gestures are optional: a closed gesture channel only stops gesture
    /// handling. Returns the controller so callers can inspect the final
    /// mirror.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RoomEvent>,
        mut gestures: mpsc::Receiver<Gesture>,
    ) -> Self {
        let Some(mut ticks) = self.tick_rx.take() else {
            warn!("room controller is already running");
            return self;
        };
        let mut gestures_open = true;

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        // Rejected events are logged by handle_event.
                        Some(event) => { let _ = self.handle_event(event); }
                        None => break,
                    }
                }

                gesture = gestures.recv(), if gestures_open => {
                    match gesture {
                        Some(gesture) => {
                            if let Err(e) = self.handle_gesture(gesture) {
                                warn!("gesture dropped: {e}");
                            }
                        }
                        None => gestures_open = false,
                    }
                }

                Some(generation) = ticks.recv() => self.handle_tick(generation),
            }
        }

        debug!("room controller stopped");
        self.countdown = None;
        self.tick_rx = Some(ticks);
        self
    }

    fn apply(&mut self, effect: Effect) -> Regions {
        match effect {
            Effect::SendIntent(intent) => {
                if let Err(e) = self.sink.send_intent(intent) {
                    warn!(?intent, "could not send intent: {e}");
                }
                Regions::NONE
            }
            Effect::StartCountdown { seconds } => self.start_countdown(seconds),
            Effect::CancelCountdown => {
                if self.countdown.take().is_some() {
                    debug!("countdown cancelled");
                }
                Regions::NONE
            }
            Effect::Download(file) => {
                info!(file = %file.file_name, "backlog download ready");
                self.renderer.download(&file);
                Regions::NONE
            }
            Effect::Alert(message) => {
                self.renderer.alert(&message);
                Regions::NONE
            }
        }
    }

    fn start_countdown(&mut self, seconds: u32) -> Regions {
        // The old ticker must be gone before the new one exists.
        self.countdown = None;
        self.generation = self.generation.wrapping_add(1);

        let countdown = Countdown::start(seconds);
        self.mirror.local.timer = countdown.display();
        let regions = Regions::NONE.with(Region::Timer);
        if countdown.is_finished() {
            return regions.union(self.countdown_finished());
        }

        let handle = CountdownHandle::spawn(self.generation, self.tick_period, self.tick_tx.clone());
        self.countdown = Some((countdown, handle));
        regions
    }

    fn countdown_finished(&mut self) -> Regions {
        info!("countdown finished");
        if self.mirror.claim_timeout_reveal() {
            if let Err(e) = self.sink.send_intent(Intent::RevealVotes) {
                warn!("could not request reveal: {e}");
            }
        }
        Regions::NONE.with(Region::AdminControls)
    }

    fn repaint(&mut self, regions: Regions) {
        if !regions.is_empty() {
            let view = render(&self.mirror);
            self.renderer.render(&view, regions);
        }
    }
}

impl<R, S> std::fmt::Debug for RoomController<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomController")
            .field("mirror", &self.mirror)
            .field("generation", &self.generation)
            .field("counting_down", &self.countdown.is_some())
            .finish()
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
    use crate::backlog::{BacklogFile, BacklogItem};
    use crate::countdown::TimerDisplay;
    use crate::protocol::RoomSnapshot;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(RoomView, Regions)>,
        alerts: Vec<String>,
        downloads: Vec<BacklogFile>,
    }

    impl RoomRenderer for Recorder {
        fn render(&mut self, view: &RoomView, regions: Regions) {
            self.frames.push((view.clone(), regions));
        }

        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }

        fn download(&mut self, file: &BacklogFile) {
            self.downloads.push(file.clone());
        }
    }

    type Controller = RoomController<Recorder, mpsc::UnboundedSender<Intent>>;

    fn controller(user: &str) -> (Controller, mpsc::UnboundedReceiver<Intent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RoomController::new("ROOM1", user, Recorder::default(), tx), rx)
    }

    fn snapshot(use_timer: bool) -> RoomEvent {
        let participants = vec!["alice".to_string(), "bob".to_string()];
        RoomEvent::Snapshot {
            message: "bob joined the room.".into(),
            participants: participants.clone(),
            state: Box::new(RoomSnapshot {
                session_name: "Sprint 12".into(),
                session_type: None,
                admin_name: "alice".into(),
                backlog: vec![BacklogItem::new("Login", "OAuth")],
                current_story_index: Some(0),
                votes: Default::default(),
                is_revealed: false,
                is_started: true,
                use_timer,
                timer_duration: Some(1),
                participants,
            }),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Intent>) -> Vec<Intent> {
        let mut out = Vec::new();
        while let Ok(intent) = rx.try_recv() {
            out.push(intent);
        }
        out
    }

    #[tokio::test]
    async fn select_card_marks_deck_and_votes() {
        let (mut ctl, mut intents) = controller("bob");
        ctl.handle_event(RoomEvent::Connected).unwrap();
        ctl.handle_gesture(Gesture::SelectCard(Card::Eight)).unwrap();
        ctl.handle_gesture(Gesture::SelectCard(Card::Three)).unwrap();

        assert_eq!(
            drain(&mut intents),
            [
                Intent::SubmitVote(Card::Eight),
                Intent::SubmitVote(Card::Three)
            ]
        );
        let (view, regions) = ctl.renderer().frames.last().unwrap();
        assert_eq!(*regions, Regions::NONE.with(Region::Deck));
        let selected: Vec<_> = view.deck.iter().filter(|c| c.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].card, Card::Three);
    }

    #[tokio::test]
    async fn rejected_event_leaves_mirror_and_ui() {
        let (mut ctl, _intents) = controller("bob");
        ctl.handle_event(snapshot(false)).unwrap();
        let before = ctl.mirror().clone();
        let frames = ctl.renderer().frames.len();

        let err = ctl
            .handle_event(RoomEvent::NewRound {
                index: 5,
                use_timer: false,
                duration: 60,
            })
            .unwrap_err();

        assert!(matches!(err, PokerRoomError::InvalidState(_)));
        assert_eq!(ctl.mirror(), &before);
        assert_eq!(ctl.renderer().frames.len(), frames);
    }

    #[tokio::test]
    async fn server_error_alerts_and_download_is_offered() {
        let (mut ctl, _intents) = controller("alice");
        ctl.handle_event(RoomEvent::ServerError {
            message: "Only the admin can reveal votes.".into(),
        })
        .unwrap();
        ctl.handle_event(RoomEvent::BacklogReady { backlog: vec![] })
            .unwrap();

        assert_eq!(ctl.renderer().alerts, ["Only the admin can reveal votes."]);
        assert_eq!(
            ctl.renderer().downloads[0].file_name,
            "backlog_ROOM1_estimations.json"
        );
    }

    #[tokio::test]
    async fn timeout_reveal_sent_once_by_admin() {
        let (mut ctl, mut intents) = controller("alice");
        ctl.handle_event(snapshot(true)).unwrap();
        ctl.handle_event(RoomEvent::NewRound {
            index: 0,
            use_timer: true,
            duration: 1,
        })
        .unwrap();
        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Remaining(1));

        let generation = ctl.countdown_generation().unwrap();
        ctl.handle_tick(generation);
        ctl.handle_tick(generation);

        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Finished);
        assert_eq!(drain(&mut intents), [Intent::RevealVotes]);
        assert_eq!(ctl.countdown_generation(), None);
    }

    #[tokio::test]
    async fn guest_countdown_never_reveals() {
        let (mut ctl, mut intents) = controller("bob");
        ctl.handle_event(snapshot(true)).unwrap();
        ctl.handle_event(RoomEvent::VoteRestarted {
            use_timer: true,
            duration: 1,
        })
        .unwrap();

        let generation = ctl.countdown_generation().unwrap();
        ctl.handle_tick(generation);

        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Finished);
        assert!(drain(&mut intents).is_empty());
    }

    #[tokio::test]
    async fn restart_replaces_countdown_and_ignores_stale_ticks() {
        let (mut ctl, _intents) = controller("bob");
        ctl.handle_event(snapshot(true)).unwrap();
        ctl.handle_event(RoomEvent::VoteRestarted {
            use_timer: true,
            duration: 10,
        })
        .unwrap();
        let first = ctl.countdown_generation().unwrap();

        ctl.handle_event(RoomEvent::VoteRestarted {
            use_timer: true,
            duration: 30,
        })
        .unwrap();
        let second = ctl.countdown_generation().unwrap();
        assert_ne!(first, second);

        ctl.handle_tick(first);
        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Remaining(30));
        ctl.handle_tick(second);
        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Remaining(29));
    }

    #[tokio::test]
    async fn server_reveal_first_suppresses_timeout_reveal() {
        let (mut ctl, mut intents) = controller("alice");
        ctl.handle_event(snapshot(true)).unwrap();
        ctl.handle_event(RoomEvent::SessionStarted {
            use_timer: true,
            duration: 5,
        })
        .unwrap();
        let generation = ctl.countdown_generation().unwrap();

        ctl.handle_event(RoomEvent::VotesRevealed {
            votes: Default::default(),
            result: "N/A".into(),
            details: "No numeric votes".into(),
        })
        .unwrap();
        assert_eq!(ctl.countdown_generation(), None);

        ctl.handle_tick(generation);
        assert!(drain(&mut intents).is_empty());
    }

    #[tokio::test]
    async fn zero_duration_finishes_at_once() {
        let (mut ctl, mut intents) = controller("alice");
        ctl.handle_event(snapshot(true)).unwrap();
        ctl.handle_event(RoomEvent::VoteRestarted {
            use_timer: true,
            duration: 0,
        })
        .unwrap();

        assert_eq!(ctl.mirror().local.timer, TimerDisplay::Finished);
        assert_eq!(ctl.countdown_generation(), None);
        assert_eq!(drain(&mut intents), [Intent::RevealVotes]);
    }

    #[tokio::test]
    async fn manual_reveal_blocks_auto_reveal() {
        let (mut ctl, mut intents) = controller("alice");
        ctl.handle_event(snapshot(false)).unwrap();
        ctl.handle_gesture(Gesture::RevealVotes).unwrap();
        ctl.handle_event(RoomEvent::VoteSubmitted {
            participants: vec!["alice".into(), "bob".into()],
            votes: [("alice".to_string(), "5".to_string()), ("bob".to_string(), "5".to_string())]
                .into_iter()
                .collect(),
        })
        .unwrap();

        assert_eq!(drain(&mut intents), [Intent::RevealVotes]);
    }
}

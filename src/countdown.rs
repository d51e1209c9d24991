//! Round countdown: pure arithmetic plus a cancellable ticker task.
//!
//! The countdown is a visual mirror only; the server decides when a timed
//! round is revealed. [`Countdown`] holds the remaining seconds and never goes
//! below zero. [`CountdownHandle`] owns the task that produces one tick per
//! period, tagged with a generation so that ticks queued by a cancelled
//! countdown can be recognised and ignored.

use std::fmt;

/// What the timer region shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDisplay {
    /// No countdown running for this round.
    #[default]
    Ready,
    /// Seconds left.
    Remaining(u32),
    /// The countdown reached zero.
    Finished,
}

impl fmt::Display for TimerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerDisplay::Ready => f.write_str("Ready"),
            TimerDisplay::Remaining(secs) => write!(f, "{:02}:{:02}", secs / 60, secs % 60),
            TimerDisplay::Finished => f.write_str("TIME'S UP!"),
        }
    }
}

/// Seconds left in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    pub fn start(duration: u32) -> Self {
        Self {
            remaining: duration,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn display(&self) -> TimerDisplay {
        if self.is_finished() {
            TimerDisplay::Finished
        } else {
            TimerDisplay::Remaining(self.remaining)
        }
    }

    /// One second elapsed.
    pub fn tick(&mut self) -> TimerDisplay {
        self.remaining = self.remaining.saturating_sub(1);
        self.display()
    }
}

#[cfg(feature = "tokio-runtime")]
pub use ticker::CountdownHandle;

#[cfg(feature = "tokio-runtime")]
mod ticker {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::{self, Instant, MissedTickBehavior};
    use tracing::debug;

    /// A running ticker. Dropping the handle stops it.
    #[derive(Debug)]
    pub struct CountdownHandle {
        generation: u64,
        task: JoinHandle<()>,
    }

    impl CountdownHandle {
        /// Send `generation` on `ticks` once per `period`, starting one period
        /// from now, until cancelled or until the receiver is gone.
        pub fn spawn(generation: u64, period: Duration, ticks: mpsc::UnboundedSender<u64>) -> Self {
            let task = tokio::spawn(async move {
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if ticks.send(generation).is_err() {
                        break;
                    }
                }
            });
            debug!(generation, "countdown ticker started");
            Self { generation, task }
        }

        pub fn generation(&self) -> u64 {
            self.generation
        }

        pub fn cancel(self) {
            drop(self);
        }
    }

    impl Drop for CountdownHandle {
        fn drop(&mut self) {
            self.task.abort();
            debug!(generation = self.generation, "countdown ticker stopped");
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
    fn finishes_after_exactly_duration_ticks() {
        for duration in [1_u32, 2, 7, 61] {
            let mut countdown = Countdown::start(duration);
            let mut ticks = 0;
            while !countdown.is_finished() {
                countdown.tick();
                ticks += 1;
            }
            assert_eq!(ticks, duration);
            assert_eq!(countdown.display(), TimerDisplay::Finished);
        }
    }

    #[test]
    fn never_goes_negative() {
        let mut countdown = Countdown::start(1);
        assert_eq!(countdown.tick(), TimerDisplay::Finished);
        assert_eq!(countdown.tick(), TimerDisplay::Finished);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn zero_duration_is_finished_immediately() {
        assert_eq!(Countdown::start(0).display(), TimerDisplay::Finished);
    }

    #[test]
    fn display_is_minutes_and_seconds() {
        assert_eq!(TimerDisplay::Remaining(90).to_string(), "01:30");
        assert_eq!(TimerDisplay::Remaining(5).to_string(), "00:05");
        assert_eq!(TimerDisplay::Remaining(600).to_string(), "10:00");
        assert_eq!(TimerDisplay::Ready.to_string(), "Ready");
        assert_eq!(TimerDisplay::Finished.to_string(), "TIME'S UP!");
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test(start_paused = true)]
    async fn ticker_tags_ticks_and_stops_on_drop() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = CountdownHandle::spawn(7, std::time::Duration::from_secs(1), tx);
        assert_eq!(handle.generation(), 7);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, Some(7));

        handle.cancel();
        // The aborted task drops its sender, closing the channel.
        assert_eq!(rx.recv().await, None);
    }
}

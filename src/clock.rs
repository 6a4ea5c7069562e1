//! Wall clock capability for the observation loop

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full delay passed
    Elapsed,
    /// A stop request arrived before the delay was up
    Stopped,
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Block for `delay` without spinning, returning early if anything arrives on `stop`
    fn wait(&self, delay: Duration, stop: &Receiver<()>) -> WaitOutcome;
}

/// The real clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn wait(&self, delay: Duration, stop: &Receiver<()>) -> WaitOutcome {
        let deadline = Instant::now() + delay;
        match stop.recv_timeout(delay) {
            Ok(()) => WaitOutcome::Stopped,
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Elapsed,
            // Nobody is left to ask us to stop, so just sit out the rest
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                WaitOutcome::Elapsed
            }
        }
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

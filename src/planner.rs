//! Turns the observation mode into the list of window start offsets for the run

use std::time::Duration;

use crate::{
    config::{ObservationMode, RunConfig},
    error::{Error, Result},
};

pub const DEGREES_PER_DAY: u32 = 360;
pub const SECONDS_PER_DAY: u64 = 86400;

/// Start offsets of every acquisition window, measured from the run start.
///
/// Never empty, starts at zero and is strictly increasing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowPlan {
    offsets: Vec<Duration>,
    interval: Duration,
}

impl WindowPlan {
    pub fn offsets(&self) -> &[Duration] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Spacing between consecutive windows (zero for a single shot)
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offset the `i`th window is scheduled at, if there is one
    pub fn offset(&self, i: usize) -> Option<Duration> {
        self.offsets.get(i).copied()
    }

    /// Survey runs wait between windows, single shots never do
    pub fn is_survey(&self) -> bool {
        self.offsets.len() > 1
    }
}

/// Compute the window plan for `config`. Pure, so calling it twice gives the same plan.
pub fn plan(config: &RunConfig) -> Result<WindowPlan> {
    match config.mode() {
        ObservationMode::SingleShot => Ok(WindowPlan {
            offsets: vec![Duration::ZERO],
            interval: Duration::ZERO,
        }),
        ObservationMode::Survey24h { degree_interval } => survey(degree_interval),
    }
}

fn survey(degree_interval: u32) -> Result<WindowPlan> {
    if degree_interval == 0 || DEGREES_PER_DAY % degree_interval != 0 {
        return Err(Error::InvalidInterval { degree_interval });
    }
    let num_windows = (DEGREES_PER_DAY / degree_interval) as u64;
    // 86400 / 360 = 240, so every divisor of 360 gives whole seconds
    let interval = Duration::from_secs(SECONDS_PER_DAY / num_windows);
    let offsets = (0..num_windows as u32).map(|i| interval * i).collect();
    Ok(WindowPlan { offsets, interval })
}

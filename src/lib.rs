//! Scheduling for single-antenna hydrogen line surveys.
//!
//! A run is planned from its [`RunConfig`](config::RunConfig) into a
//! [`WindowPlan`](planner::WindowPlan), then the
//! [`ObservationLoop`](observation::ObservationLoop) drives acquisition, analysis,
//! plotting and datafile writing for every window, keeping each window pinned to
//! `run_start + offset` however long the previous ones took.

pub mod analysis;
pub mod args;
pub mod clock;
pub mod collaborators;
pub mod complex;
pub mod config;
pub mod coordinates;
pub mod datafile;
pub mod error;
pub mod observation;
pub mod planner;
pub mod plot;
pub mod sdr;

pub use error::{Error, Result};

//! The pieces the observation loop drives once per window.
//!
//! Acquisition hands back an explicit [`Samples`] buffer which is moved into the
//! analyzer, and the analyzer's [`Analysis`] is what gets plotted, so no step relies
//! on data left behind by a previous one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    complex::ComplexByte,
    config::{DeviceParams, DspParams, ObservationParams, ObserverParams, PlottingParams},
    error::BoxError,
};

/// Sky position the antenna points at for a given instant
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    pub instant: DateTime<Utc>,
    /// Degrees, [0, 360)
    pub right_ascension: f64,
    /// Degrees, [-90, 90]
    pub declination: f64,
    /// Local mean sidereal time in degrees
    pub local_sidereal_time: f64,
}

/// Raw IQ data for one window, `blocks` each holding `2^resolution` samples
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Samples {
    pub sample_rate: f64,
    /// Frequency the receiver was tuned to, in Hz
    pub center_frequency: f64,
    pub blocks: Vec<Vec<ComplexByte>>,
}

impl Samples {
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Vec::is_empty)
    }
}

/// Averaged power spectrum of one window, lowest frequency first
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub coordinates: Coordinates,
    /// Bin center frequencies in Hz, spanning `center ± sample_rate / 2`
    pub frequencies: Vec<f64>,
    /// Normalized power per bin, same length as `frequencies`
    pub spectrum: Vec<f64>,
    /// Sum over all bins, equal to the mean sample power
    pub total_power: f64,
}

/// Everything describing how the data was taken. Deliberately window independent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRecord<'a> {
    pub run_start: DateTime<Utc>,
    #[serde(rename = "SDR")]
    pub device: &'a DeviceParams,
    #[serde(rename = "DSP")]
    pub dsp: &'a DspParams,
    #[serde(rename = "Observer")]
    pub observer: &'a ObserverParams,
    #[serde(rename = "Observation")]
    pub observation: &'a ObservationParams,
}

/// Owns the SDR for the whole run
pub trait Acquirer {
    fn collect(&mut self, sample_rate: f64, dsp: &DspParams) -> Result<Samples, BoxError>;
}

pub trait CoordinateResolver {
    fn resolve(
        &self,
        instant: DateTime<Utc>,
        observer: &ObserverParams,
    ) -> Result<Coordinates, BoxError>;
}

pub trait Analyzer {
    fn analyze(&mut self, samples: Samples, coordinates: &Coordinates)
        -> Result<Analysis, BoxError>;
}

pub trait Plotter {
    fn plot(&mut self, plotting: &PlottingParams, analysis: &Analysis) -> Result<(), BoxError>;
}

pub trait Persister {
    fn persist(&mut self, record: &RunRecord<'_>) -> Result<(), BoxError>;
}

/// Borrowed set of collaborators for one run
pub struct Collaborators<'a> {
    pub acquirer: &'a mut dyn Acquirer,
    pub resolver: &'a dyn CoordinateResolver,
    pub analyzer: &'a mut dyn Analyzer,
    pub plotter: &'a mut dyn Plotter,
    pub persister: &'a mut dyn Persister,
}

//! Run parameters, loaded from the JSON config file
//!
//! The file has five sections (`SDR`, `DSP`, `observer`, `plotting`, `observation`).
//! Everything is validated up front so a bad file never reaches the hardware.

use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on `number_of_fft * 2^resolution`, 256 MiB of 8-bit IQ
pub const MAX_SAMPLES_PER_WINDOW: u64 = 1 << 27;

/// How the SDR is reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    #[default]
    Local,
    Tcp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoGain {
    Auto,
}

/// Tuner gain, either a fixed value in dB or the literal `"auto"`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gain {
    Db(f64),
    Auto(AutoGain),
}

impl Default for Gain {
    fn default() -> Self {
        Gain::Auto(AutoGain::Auto)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceParams {
    #[serde(default)]
    pub connection: Connection,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Center frequency in Hz
    pub frequency: f64,
    /// Frequency correction in ppm
    #[serde(default)]
    pub freq_correction: i32,
    #[serde(default)]
    pub gain: Gain,
    /// Samples per second
    pub sample_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DspParams {
    /// Number of FFTs averaged per window
    pub number_of_fft: u32,
    /// FFT length as a power of 2, which is also the number of spectral bins
    pub resolution: u32,
}

impl DspParams {
    pub fn samples_per_block(&self) -> usize {
        1usize << self.resolution
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverParams {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    /// Antenna pointing, degrees east of north
    pub azimuth: f64,
    /// Antenna pointing, degrees above the horizon
    pub altitude: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlottingParams {
    #[serde(default = "default_true")]
    pub plot: bool,
    #[serde(default = "default_plot_dir")]
    pub output_dir: PathBuf,
}

impl Default for PlottingParams {
    fn default() -> Self {
        Self {
            plot: true,
            output_dir: default_plot_dir(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationParams {
    #[serde(rename = "24h", default)]
    pub survey_24h: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_interval: Option<u32>,
    #[serde(default)]
    pub datafile: bool,
    #[serde(default = "default_data_dir")]
    pub datafile_dir: PathBuf,
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    1234
}

fn default_true() -> bool {
    true
}

fn default_plot_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// The config file exactly as written on disk
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "SDR")]
    sdr: DeviceParams,
    #[serde(rename = "DSP")]
    dsp: DspParams,
    observer: ObserverParams,
    #[serde(default)]
    plotting: PlottingParams,
    observation: ObservationParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservationMode {
    SingleShot,
    Survey24h { degree_interval: u32 },
}

/// Validated parameters for one invocation
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    device: DeviceParams,
    dsp: DspParams,
    observer: ObserverParams,
    plotting: PlottingParams,
    observation: ObservationParams,
    mode: ObservationMode,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(s)?;
        Self::from_parts(
            raw.sdr,
            raw.dsp,
            raw.observer,
            raw.plotting,
            raw.observation,
        )
    }

    pub fn from_parts(
        device: DeviceParams,
        dsp: DspParams,
        observer: ObserverParams,
        plotting: PlottingParams,
        observation: ObservationParams,
    ) -> Result<Self, ConfigError> {
        validate_device(&device)?;
        validate_dsp(&dsp)?;
        validate_observer(&observer)?;
        let mode = mode_of(&observation)?;
        Ok(Self {
            device,
            dsp,
            observer,
            plotting,
            observation,
            mode,
        })
    }

    /// Replace the observation mode, e.g. from a command line override
    pub fn with_mode(mut self, mode: ObservationMode) -> Self {
        match mode {
            ObservationMode::SingleShot => self.observation.survey_24h = false,
            ObservationMode::Survey24h { degree_interval } => {
                self.observation.survey_24h = true;
                self.observation.degree_interval = Some(degree_interval);
            }
        }
        self.mode = mode;
        self
    }

    pub fn device(&self) -> &DeviceParams {
        &self.device
    }

    pub fn dsp(&self) -> &DspParams {
        &self.dsp
    }

    pub fn observer(&self) -> &ObserverParams {
        &self.observer
    }

    pub fn plotting(&self) -> &PlottingParams {
        &self.plotting
    }

    pub fn observation(&self) -> &ObservationParams {
        &self.observation
    }

    pub fn mode(&self) -> ObservationMode {
        self.mode
    }

    pub fn datafile(&self) -> bool {
        self.observation.datafile
    }
}

fn out_of_range(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.into(),
    }
}

fn validate_device(device: &DeviceParams) -> Result<(), ConfigError> {
    if !(device.sample_rate.is_finite() && device.sample_rate > 0.0) {
        return Err(out_of_range("sample_rate", "must be a positive number"));
    }
    if !(device.frequency.is_finite() && device.frequency > 0.0) {
        return Err(out_of_range("frequency", "must be a positive number"));
    }
    if let Gain::Db(db) = device.gain {
        if !db.is_finite() {
            return Err(out_of_range("gain", "must be a number or \"auto\""));
        }
    }
    Ok(())
}

fn validate_dsp(dsp: &DspParams) -> Result<(), ConfigError> {
    if dsp.number_of_fft == 0 {
        return Err(out_of_range("number_of_fft", "must be at least 1"));
    }
    if !(1..=24).contains(&dsp.resolution) {
        return Err(out_of_range("resolution", "must be between 1 and 24"));
    }
    let total = dsp.number_of_fft as u64 * dsp.samples_per_block() as u64;
    if total > MAX_SAMPLES_PER_WINDOW {
        return Err(out_of_range(
            "number_of_fft",
            format!(
                "times 2^resolution gives {} samples per window, the limit is {}",
                total, MAX_SAMPLES_PER_WINDOW
            ),
        ));
    }
    Ok(())
}

fn validate_observer(observer: &ObserverParams) -> Result<(), ConfigError> {
    if !(-90.0..=90.0).contains(&observer.latitude) {
        return Err(out_of_range("latitude", "must be within [-90, 90] degrees"));
    }
    if !(-180.0..=360.0).contains(&observer.longitude) {
        return Err(out_of_range("longitude", "must be within [-180, 360] degrees"));
    }
    if !(-90.0..=90.0).contains(&observer.altitude) {
        return Err(out_of_range("altitude", "must be within [-90, 90] degrees"));
    }
    if !observer.azimuth.is_finite() {
        return Err(out_of_range("azimuth", "must be a number"));
    }
    Ok(())
}

// Divisibility of the interval is the planner's business, here we only need it present
fn mode_of(observation: &ObservationParams) -> Result<ObservationMode, ConfigError> {
    if !observation.survey_24h {
        return Ok(ObservationMode::SingleShot);
    }
    let degree_interval = observation
        .degree_interval
        .ok_or(ConfigError::MissingDegreeInterval)?;
    Ok(ObservationMode::Survey24h { degree_interval })
}

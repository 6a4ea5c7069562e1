//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;

use crate::config::ObservationMode;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// JSON run configuration
    #[clap(short, long, default_value = "config.json")]
    pub config: PathBuf,
    /// Run a 24h survey with this many degrees between windows, overriding the config
    #[clap(short, long, conflicts_with = "single-shot")]
    pub degree_interval: Option<u32>,
    /// Take a single window, overriding the config
    #[clap(short, long)]
    pub single_shot: bool,
    /// Append diagnostics to this file instead of the terminal
    #[clap(short, long)]
    pub log_file: Option<PathBuf>,
    /// Seed for the simulated receiver's noise source
    #[clap(long)]
    pub seed: Option<u64>,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

impl Args {
    /// Observation mode forced from the command line, if any
    pub fn mode_override(&self) -> Option<ObservationMode> {
        if self.single_shot {
            Some(ObservationMode::SingleShot)
        } else {
            self.degree_interval
                .map(|degree_interval| ObservationMode::Survey24h { degree_interval })
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

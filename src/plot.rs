//! Writes each window's averaged spectrum as a `frequency,power` CSV series for plotting

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, info};

use crate::{
    collaborators::{Analysis, Plotter},
    config::PlottingParams,
    error::BoxError,
};

/// Filesystem-safe UTC timestamp, e.g. `2024-03-20-06-00-00`
pub fn file_timestamp(time: &DateTime<Utc>) -> String {
    format!(
        "{}-{:02}-{:02}-{:02}-{:02}-{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

#[derive(Debug, Default)]
pub struct CsvPlotter {
    written: Vec<PathBuf>,
}

impl CsvPlotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files written so far, oldest first
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl Plotter for CsvPlotter {
    fn plot(&mut self, plotting: &PlottingParams, analysis: &Analysis) -> Result<(), BoxError> {
        if !plotting.plot {
            debug!("Plotting disabled");
            return Ok(());
        }
        fs::create_dir_all(&plotting.output_dir)?;
        let coords = &analysis.coordinates;
        let path = plotting
            .output_dir
            .join(format!("power-{}.csv", file_timestamp(&coords.instant)));
        let mut out = BufWriter::new(File::create(&path)?);
        writeln!(out, "# time={}", coords.instant.to_rfc3339())?;
        writeln!(
            out,
            "# ra_deg={:.4} dec_deg={:.4} lst_deg={:.4}",
            coords.right_ascension, coords.declination, coords.local_sidereal_time
        )?;
        writeln!(out, "# total_power={}", analysis.total_power)?;
        writeln!(out, "frequency_hz,power")?;
        for (f, p) in analysis.frequencies.iter().zip(&analysis.spectrum) {
            writeln!(out, "{},{}", f, p)?;
        }
        out.flush()?;
        info!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

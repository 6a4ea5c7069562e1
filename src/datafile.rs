//! Datafile persistence: a JSON record of how each window's data was taken

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    collaborators::{Persister, RunRecord},
    error::BoxError,
    plot::file_timestamp,
};

/// Writes `run-<start>-<n>.json` into the observation section's datafile directory
#[derive(Debug, Default)]
pub struct JsonPersister {
    count: usize,
}

impl JsonPersister {
    pub fn new() -> Self {
        Self::default()
    }

    fn path_for(&self, dir: &Path, record: &RunRecord<'_>) -> PathBuf {
        dir.join(format!(
            "run-{}-{:03}.json",
            file_timestamp(&record.run_start),
            self.count
        ))
    }
}

impl Persister for JsonPersister {
    fn persist(&mut self, record: &RunRecord<'_>) -> Result<(), BoxError> {
        let dir = &record.observation.datafile_dir;
        fs::create_dir_all(dir)?;
        let path = self.path_for(dir, record);
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, record)?;
        out.flush()?;
        info!("Wrote datafile {}", path.display());
        self.count += 1;
        Ok(())
    }
}

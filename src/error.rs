//! Errors that can end a run

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Error type handed back by collaborators. The loop does not inspect it, it only
/// tags which stage produced it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("degree interval {degree_interval} does not evenly divide 360 degrees")]
    InvalidInterval { degree_interval: u32 },
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(BoxError) -> Self {
        move |source| Self::Collaborator { stage, source }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`degree_interval` is required when `24h` is enabled")]
    MissingDegreeInterval,
    #[error("`{field}` {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Which step of a window a collaborator failure came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Device,
    Coordinates,
    Acquisition,
    Analysis,
    Plotting,
    Datafile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Device => "device setup",
            Stage::Coordinates => "coordinate resolution",
            Stage::Acquisition => "acquisition",
            Stage::Analysis => "analysis",
            Stage::Plotting => "plotting",
            Stage::Datafile => "datafile write",
        };
        f.write_str(name)
    }
}

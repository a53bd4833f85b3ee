//! Error taxonomy for the simulation pipeline.
//!
//! Every variant is terminal for the request that raised it; the report
//! builder turns each into an error-severity report.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any process is launched.
    #[error("{reason}")]
    InvalidInput { reason: String },

    #[error("This program is not supported on this system ({os})")]
    UnsupportedPlatform { os: String },

    /// The simulator printed a failure sentinel.
    #[error("{reason}")]
    SimulatorRuntime { raw: String, reason: String },

    /// Success classification with nothing to show.
    #[error("Simulator output contained no evolutionary stages; the output format may have changed")]
    ParseAnomaly { raw: String },

    #[error("Failed to write simulator input {path}: {source}")]
    WriteInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove previous track file {path}: {source}")]
    ClearTrack {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch simulator {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Simulator did not finish within {}", format_timeout(.0))]
    Timeout(Duration),

    #[error("Failed to read track file: {0}")]
    Track(#[from] crate::track::TrackError),
}

impl PipelineError {
    /// Raw simulator output carried by the error, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            PipelineError::SimulatorRuntime { raw, .. } | PipelineError::ParseAnomaly { raw } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

fn format_timeout(d: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*d)
}

pub type PipelineResult<T> = Result<T, PipelineError>;

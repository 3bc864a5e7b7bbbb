use crate::pipeline::phase::PhaseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a tally run
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Source unavailable: {path}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed reading source: {0}")]
    SourceRead(#[source] std::io::Error),

    #[error("Invalid configuration for {field} = {value}: {reason}")]
    InvalidConfiguration {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read configuration file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Only {received} of {expected} workers reported a partial aggregate")]
    WorkerFailed { expected: usize, received: usize },

    #[error("Pipeline task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

impl TallyError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any record was read
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

/// Per-record extraction failure. Recovered locally: the record is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Malformed record: found {found} fields, need at least {required}")]
    Malformed { found: usize, required: usize },
}

pub type Result<T> = std::result::Result<T, TallyError>;

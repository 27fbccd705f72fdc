use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed classification of everything that can go wrong during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ParseError,
    ValidationError,
    PersistenceError,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "parse",
            ErrorKind::ValidationError => "validation",
            ErrorKind::PersistenceError => "persistence",
            ErrorKind::TransportError => "transport",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("XML parse failed: {0}")]
    Parse(String),

    #[error("Storage rejected batch {batch}: {message}")]
    Persistence { batch: usize, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record {index} aborted the run ({kind}): {message}")]
    RecordRejected {
        index: usize,
        kind: ErrorKind,
        message: String,
    },
}

impl IngestError {
    /// Maps the error onto the run-report taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Parse(_) | IngestError::Io(_) | IngestError::Json(_) => {
                ErrorKind::ParseError
            }
            IngestError::Config(_) | IngestError::Toml(_) => {
                ErrorKind::ValidationError
            }
            IngestError::Persistence { .. } => ErrorKind::PersistenceError,
            IngestError::Transport(_) => ErrorKind::TransportError,
            IngestError::RecordRejected { kind, .. } => *kind,
        }
    }
}

impl From<quick_xml::Error> for IngestError {
    fn from(e: quick_xml::Error) -> Self {
        IngestError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        IngestError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

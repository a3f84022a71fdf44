use std::path::PathBuf;
use thiserror::Error;

/// Centralized error type for the coverage crate
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A required semantic field matched no column header
    #[error("missing column for field '{field}': no header contains any of [{}]", .candidates.join(", "))]
    MissingColumn {
        field: String,
        candidates: Vec<String>,
    },

    #[error("field '{0}' has no candidate substrings configured")]
    EmptyCandidates(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("I/O error with {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input could not be read as a table
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the table layout did not match the field catalog
    pub fn is_missing_column(&self) -> bool {
        matches!(self, AnalysisError::MissingColumn { .. })
    }
}

/// Alias for fallible operations in the coverage crate
pub type AnalysisResult<T> = Result<T, AnalysisError>;

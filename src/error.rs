//! Error types for the analog-forecast library.

use thiserror::Error;

/// Result type alias for analog forecasting operations.
pub type Result<T> = std::result::Result<T, AnalogError>;

/// Errors that can occur while splitting, scoring, selecting or extracting analogs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalogError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The supplied configuration cannot describe a valid run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Candidate and reference windows differ in length under a strict policy.
    #[error("length mismatch: candidate has {candidate} rows, reference has {reference}")]
    LengthMismatch { candidate: usize, reference: usize },

    /// A criterion that needs a reference window was applied without one.
    #[error("length mismatch: no reference window supplied")]
    MissingReference,

    /// A date could not be interpreted.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Column not present in a series.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Index out of bounds.
    #[error("index out of bounds: {index} (size: {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Name not found in a registry.
    #[error("unknown {kind}: {name}")]
    UnknownComponent { kind: &'static str, name: String },

    /// A pipeline stage was triggered before the stage it depends on.
    #[error("stage `{stage}` requires `{requires}` to run first")]
    StageOrder {
        stage: &'static str,
        requires: &'static str,
    },

    /// Failure reported by the artifact store.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failure while encoding or decoding an artifact.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AnalogError {
    /// Whether the error stems from caller configuration rather than from the data.
    ///
    /// Configuration errors abort a run; everything else is a per-combination failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AnalogError::Configuration(_)
                | AnalogError::InvalidParameter(_)
                | AnalogError::UnknownComponent { .. }
                | AnalogError::UnknownColumn(_)
                | AnalogError::StageOrder { .. }
                | AnalogError::InvalidDate(_)
        )
    }
}

impl From<std::io::Error> for AnalogError {
    fn from(err: std::io::Error) -> Self {
        AnalogError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AnalogError {
    fn from(err: serde_json::Error) -> Self {
        AnalogError::Serialization(err.to_string())
    }
}

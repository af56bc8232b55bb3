use crate::model::SubmissionStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {field}: {value} (expected {expected})")]
    OutOfRange {
        field:    &'static str,
        value:    i64,
        expected: &'static str,
    },

    #[error("Invalid period '{0}': expected \"Q<1-4> <YYYY>\"")]
    InvalidPeriod(String),

    #[error("Invalid {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Invalid category pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source:  regex::Error,
    },

    #[error("Regulator '{0}' not found")]
    RegulatorNotFound(String),

    #[error("Illegal submission transition: {from} -> {to}")]
    IllegalTransition {
        from: SubmissionStatus,
        to:   SubmissionStatus,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

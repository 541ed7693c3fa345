//! Error types for rust_methdiff

use thiserror::Error;

/// Main error type for differential methylation calling
#[derive(Error, Debug)]
pub enum MethDiffError {
    #[error("Invalid site record: {reason}")]
    InvalidInput { reason: String },

    #[error("Insufficient data for sample {sample_id}: {reason}")]
    InsufficientSampleData { sample_id: String, reason: String },

    #[error("Insufficient data for group {group}: {reason}")]
    InsufficientGroupData { group: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid sample sheet: {reason}")]
    InvalidSampleSheet { reason: String },

    #[error("Malformed cytosine report {path} at line {line}: {reason}")]
    MalformedReport {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for differential methylation operations
pub type Result<T> = std::result::Result<T, MethDiffError>;

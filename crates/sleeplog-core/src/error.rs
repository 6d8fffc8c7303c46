use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the sleep log tools.
///
/// The log parser itself is total and never fails; these errors only come
/// from file I/O and configuration boundaries.
#[derive(Error, Debug)]
pub enum SleepLogError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A metric table failed validation.
    #[error("Invalid metric table: {0}")]
    InvalidMetricTable(String),

    /// The input path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No log files were found under the given directory.
    #[error("No log files found in {0}")]
    NoLogFiles(PathBuf),

    /// A spreadsheet export is missing its header or timestamp column.
    #[error("Malformed CSV export: {0}")]
    CsvFormat(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the sleeplog crates.
pub type Result<T> = std::result::Result<T, SleepLogError>;

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KronaError {
    #[error("missing required columns in sylph file: {0}")]
    MissingColumns(String),

    #[error("sylph profile is empty (no header line)")]
    EmptyProfile,

    #[error("line {line}: invalid value {value:?} in column {column}")]
    #[diagnostic(help("abundance values must be finite, non-negative numbers"))]
    InvalidAbundance {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: missing value in column {column}")]
    MissingValue { line: usize, column: String },

    #[error("failed to read sylph profile: {0}")]
    ProfileRead(String),

    #[error("failed to read taxonomy table {path}: {message}")]
    TaxonomyRead { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GTDB request failed: {0}")]
    ReleaseHttp(String),

    #[error("GTDB returned status {status}: {message}")]
    ReleaseStatus { status: u16, message: String },

    #[error("could not download taxonomy file {0} from any mirror")]
    DownloadFailed(String),

    #[error("MD5 checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

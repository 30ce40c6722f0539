use std::path::PathBuf;
use thiserror::Error;

use crate::status::{RunStatus, SegmentStatus};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Segment {segment_id} cannot be retried: {reason}")]
    NotRetryable { segment_id: i64, reason: String },

    #[error("Invalid segment transition for segment {segment_id}: {from} -> {to}")]
    InvalidSegmentTransition {
        segment_id: i64,
        from: SegmentStatus,
        to: SegmentStatus,
    },

    #[error("Run {run_id} cannot fail fatally from {status}: {reason}")]
    InvalidRunFailure {
        run_id: i64,
        status: RunStatus,
        reason: String,
    },
}

impl LedgerError {
    /// Returns true if this is a retry-eligibility rejection.
    pub fn is_not_retryable(&self) -> bool {
        matches!(self, LedgerError::NotRetryable { .. })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Input rejected before anything is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Document id must be a positive integer, got '{0}'")]
    InvalidDocumentId(String),

    #[error("Unknown status filter '{0}'")]
    InvalidStatus(String),

    #[error("Page must be a positive integer, got '{0}'")]
    InvalidPage(String),

    #[error("Page size must be between 1 and {max}, got '{value}'")]
    InvalidPageSize { value: String, max: u32 },

    #[error("Invalid page range {start}-{end}")]
    InvalidPageRange { start: u32, end: u32 },

    #[error("Invalid segment layout: {0}")]
    SegmentLayout(String),

    #[error("Filename must not be empty")]
    EmptyFilename,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

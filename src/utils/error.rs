// src/utils/error.rs
use std::time::Duration;
use thiserror::Error;

// Errors raised by the browser automation runtime
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    #[error("Operation not supported by this session: {0}")]
    Unsupported(&'static str),

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),
}

impl BrowserError {
    /// Load/readiness timeouts are transient: the page may still be usable.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Field table is missing a spec for '{0}'")]
    MissingField(&'static str),
}

// Reasons a candidate value is turned down by the validator. Not a failure of the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("no strategy produced a value")]
    Missing,

    #[error("malformed value '{0}'")]
    Malformed(String),

    #[error("value {0} out of range")]
    OutOfRange(String),

    #[error("too short ({len} < {min})")]
    TooShort { len: usize, min: usize },
}

#[derive(Error, Debug)]
pub enum TraversalError {
    #[error("Blocked by anti-automation defenses on page {page} (matched '{indicator}')")]
    Blocked { page: u32, indicator: String },

    #[error("Browser runtime failure: {0}")]
    Browser(#[from] BrowserError),
}

impl TraversalError {
    pub fn is_block(&self) -> bool {
        matches!(self, TraversalError::Blocked { .. })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("Traversal failed: {0}")]
    Traversal(#[from] TraversalError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

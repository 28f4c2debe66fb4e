//! Error types for Tapedeck

use std::io;
use thiserror::Error;

use crate::config::Mode;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, TapedeckError>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum TapedeckError {
    /// I/O error from a storage backend
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored line could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cassette name rejected at construction
    #[error("Invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// A persisted recording cannot be rebuilt into a request/response
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The mode forbids a live call for a request with no recording
    #[error("No recording for {method} {url} and mode '{mode}' does not allow new recordings")]
    RequestNotRecorded {
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// Active mode
        mode: Mode,
    },

    /// Strict cassette ejected before every recording was played
    #[error("Cassette '{name}' was not played entirely: {remaining} recording(s) left")]
    CassetteNotFinished {
        /// Cassette name
        name: String,
        /// Recordings not yet played back
        remaining: usize,
    },

    /// Recorder used without an inserted cassette
    #[error("No cassette inserted")]
    NoCassetteInserted,

    /// Recorder used while turned off
    #[error("Recorder is turned off")]
    RecorderOff,
}

// ===============================
// src/error.rs
// ===============================
use std::time::Duration;
use thiserror::Error;

/// Failures turning a single line into a `Message` (or back).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("invalid enum value for `{field}`: {value}")]
    InvalidEnum { field: &'static str, value: String },
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("no frame within {0:?}")]
    ReadTimeout(Duration),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

impl SessionError {
    /// Frames with an unrecognised `type` are skipped by the event loop; everything else ends it.
    pub fn is_skippable(&self) -> bool {
        matches!(self, SessionError::Codec(CodecError::UnknownType(_)))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("short window ({short}) must be > 0 and < long window ({long})")]
    Windows { short: usize, long: usize },
    #[error("tracked symbol universe is empty")]
    NoSymbols,
    #[error("symbol {0} listed more than once")]
    DuplicateSymbol(String),
}

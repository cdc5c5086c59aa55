//! Unified error types for the ComfortLink host controller.
//!
//! One enum per failure domain, each convertible into the top-level
//! [`Error`].  None of these are allowed to stop the control loop: the
//! service degrades every runtime failure to the IDLE fail-safe.  Only
//! configuration and bootstrap failures at startup surface to `main`.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection: {0}")]
    Connection(#[from] ConnectionError),
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
    #[error("prediction: {0}")]
    Prediction(#[from] PredictionError),
    #[error("training: {0}")]
    Training(#[from] TrainingError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Link layer
// ---------------------------------------------------------------------------

/// Port unavailable or lost.  Retried with backoff, never fatal.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot open {port}: {reason}")]
    OpenFailed { port: String, reason: String },
    #[error("connection lost: {0}")]
    Lost(#[source] std::io::Error),
    #[error("not connected")]
    NotConnected,
}

/// A line that matched neither wire grammar.  Discarded and logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("line is not valid UTF-8")]
    Encoding,
    #[error("line exceeds {0} bytes")]
    TooLong(usize),
    #[error("unrecognised line: {0:?}")]
    Unrecognised(String),
    #[error("bad number {0:?}")]
    BadNumber(String),
    #[error("bad comfort label {0:?}")]
    BadLabel(String),
    #[error("reading out of range: T={temperature} H={humidity}")]
    OutOfRange { temperature: f32, humidity: f32 },
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// The ensemble could not produce a result.  Forces the IDLE fail-safe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    #[error("ensemble has {found} members, expected {expected}")]
    MemberCount { found: usize, expected: usize },
    #[error("non-finite input")]
    NonFiniteInput,
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("need at least {needed} samples, have {have}")]
    InsufficientData { needed: usize, have: usize },
    #[error("{model}: {reason}")]
    Degenerate {
        model: &'static str,
        reason: &'static str,
    },
    /// Candidate ensemble underperformed on the hold-out split.
    #[error("validation accuracy {accuracy:.3} below floor {floor:.3}")]
    ValidationFailed { accuracy: f32, floor: f32 },
    #[error("candidate v{0} superseded by a newer model")]
    Superseded(u64),
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A field failed range validation.  The message names the field.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

//! Core error types for calbridge-core.
//!
//! Per-run fatal failures ([`SyncError`]) are kept separate from per-event
//! recoverable failures ([`FeedError::MalformedEvent`], [`TargetError`]):
//! a run aborts only when the feed is unreachable or the ledger cannot be
//! read or durably committed.

use std::path::PathBuf;
use thiserror::Error;

/// Feed-side errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The feed could not be fetched after exhausting the retry budget.
    /// Fatal for the run: no partial snapshot is ever produced.
    #[error("source feed unavailable after {attempts} attempts: {reason}")]
    SourceUnavailable { attempts: u32, reason: String },

    /// One event in the feed is missing a required property. Per-event:
    /// the event is skipped and the rest of the snapshot survives.
    #[error("malformed event: missing required field '{field}'")]
    MalformedEvent {
        /// UID of the offending event, when the feed provided one.
        uid: Option<String>,
        field: &'static str,
    },

    /// A timestamp value did not match any accepted format.
    #[error("invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },
}

/// Ledger persistence errors. All fatal: the reconciler cannot safely
/// proceed without knowing prior state, and a dropped commit would cause
/// duplicate creates on the next run.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to read ledger at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger at {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("failed to commit ledger at {path}: {source}")]
    CommitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Target-store mutation errors. Always per-event inside the reconciler:
/// the affected ledger record is left untouched so the mutation is
/// retried on the next run.
#[derive(Error, Debug)]
pub enum TargetError {
    /// The API answered with a non-success status.
    #[error("target API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered 2xx but the body was not the expected shape.
    #[error("unexpected target response: {0}")]
    UnexpectedResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Fatal run failures. Per-event errors never appear here; they are
/// counted in the run summary instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias for fatal run failures.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

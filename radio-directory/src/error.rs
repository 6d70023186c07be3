//! Error types for the directory engine.

use radio_directory_protocol::ProtocolViolation;
use thiserror::Error;

/// Errors returned by [`crate::directory::ProgramDirectory`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The chunk broke the update contract and was dropped.
    #[error("Protocol violation: {0}")]
    Violation(#[from] ProtocolViolation),

    /// The listening session has been torn down.
    #[error("Directory session is closed")]
    Closed,
}

/// Errors returned while reading a subscription feed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The subscriber fell behind and missed chunks; it must resynchronize.
    #[error("Subscriber lagged behind by {0} chunk(s)")]
    Lagged(u64),

    /// The directory was dropped or closed.
    #[error("Feed closed")]
    Closed,
}

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

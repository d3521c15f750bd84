//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Errors returned by caller-supplied open/decode/handler functions are not
//! wrapped: the caches hand them back exactly as they were produced.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The bundle database could not be opened (missing, unreadable, or not
    /// a database at all).
    #[display("could not open bundle database: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// Closing a database handle failed. Only ever logged.
    #[display("could not close bundle database: {_0}")]
    Close(#[error(not(source))] String),
    /// A cache that spawns background work was created outside a Tokio runtime.
    #[display("no Tokio runtime available for background close tasks")]
    Runtime,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

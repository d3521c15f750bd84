//! File metadata returned by storage backends.

use std::path::PathBuf;
use time::{Duration, OffsetDateTime};

/// File metadata returned by storage backends.
///
/// This represents a file in the bundle directory as seen by a listing or
/// stat operation. The path is always relative to the backend root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }

    /// Time elapsed between the last modification and `now`.
    ///
    /// Clock skew (a modification time in the future) yields a zero age
    /// rather than a negative one.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        (now - self.modified).max(Duration::ZERO)
    }
}

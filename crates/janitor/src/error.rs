//! Janitor Error Types
//!
//! A failing sub-task never stops the janitor; these errors end up in the
//! logs and the error counter, not in front of a caller.

use derive_more::{Display, Error};

/// A janitor error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for janitor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Listing, stat-ing or deleting bundle files failed.
    #[display("bundle directory error")]
    Storage,
    /// The canonical bundle store could not be queried or pruned.
    #[display("bundle store error")]
    BundleStore,
    /// The filesystem hosting the bundle directory could not be measured.
    #[display("disk usage error")]
    DiskUsage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// The janitor retries everything on its next pass anyway; this is for
    /// [`BundleStore`](crate::BundleStore) implementations wrapping their own
    /// errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BundleStore | Self::DiskUsage)
    }
}

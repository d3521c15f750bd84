//! Filesystem capacity reporting.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;

/// Capacity of the filesystem hosting a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Total size of the filesystem in bytes (block count × block size).
    pub total_bytes: u64,
    /// Bytes available to unprivileged users (available blocks × block size).
    pub available_bytes: u64,
}

impl DiskUsage {
    /// Bytes that must be released before `percent` of the filesystem is free.
    ///
    /// Returns zero when the target is already met.
    ///
    /// ```
    /// use depot_storage::DiskUsage;
    ///
    /// let usage = DiskUsage { total_bytes: 1000, available_bytes: 50 };
    /// assert_eq!(usage.deficit(10), 50);
    /// assert_eq!(usage.deficit(5), 0);
    /// ```
    pub fn deficit(&self, percent: u8) -> u64 {
        let desired = u128::from(self.total_bytes) * u128::from(percent.min(100)) / 100;
        // Infallible: desired <= total_bytes, which already fits in a u64.
        let desired = u64::try_from(desired).unwrap_or(self.total_bytes);
        desired.saturating_sub(self.available_bytes)
    }
}

/// Reports how full the filesystem hosting a directory is.
pub trait DiskSizer: Send + Sync {
    fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// [`DiskSizer`] backed by `statvfs(2)` (or the platform equivalent).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDiskSizer;

impl DiskSizer for FsDiskSizer {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        let stats = fs4::statvfs(path).or_raise(|| ErrorKind::DiskUsage(path.to_path_buf()))?;
        Ok(DiskUsage {
            total_bytes: stats.total_space(),
            available_bytes: stats.available_space(),
        })
    }
}

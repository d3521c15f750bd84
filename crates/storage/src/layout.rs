//! Naming convention for files under the bundle directory.
//!
//! ```text
//! <bundle_dir>/
//! ├── uploads/
//! │   ├── 42.lsif.gz       stitched upload, waiting for conversion
//! │   └── 43.0.lsif.gz     partial upload part #0
//! └── dbs/
//!     └── 41.lsif.db       converted database
//! ```
//!
//! Paths handed out by [`BundleLayout`] are relative to the bundle directory
//! (which is also the root of the [`LocalBackend`](crate::backend::LocalBackend)
//! serving it); use [`BundleLayout::resolve`] when an absolute path is needed,
//! e.g. to open a database.

use crate::BundleId;
use crate::error::{ErrorKind, Result};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

/// Subdirectory holding raw and partial uploads.
pub const UPLOADS_DIR: &str = "uploads";
/// Subdirectory holding converted bundle databases.
pub const DBS_DIR: &str = "dbs";

const UPLOAD_EXTENSION: &str = "lsif.gz";
const DB_EXTENSION: &str = "lsif.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    root: PathBuf,
}

impl BundleLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The bundle directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the bundle directory and both subdirectories if missing.
    ///
    /// Blocking; this runs once at startup.
    pub fn prepare(&self) -> Result<()> {
        for dir in [UPLOADS_DIR, DBS_DIR] {
            let path = self.root.join(dir);
            create_dir_all(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.clone()),
                _ => ErrorKind::Io(e),
            })?;
        }
        Ok(())
    }

    pub fn uploads_dir(&self) -> &'static Path {
        Path::new(UPLOADS_DIR)
    }

    pub fn dbs_dir(&self) -> &'static Path {
        Path::new(DBS_DIR)
    }

    /// Stitched (complete) upload for a bundle.
    pub fn upload_path(&self, id: BundleId) -> PathBuf {
        Path::new(UPLOADS_DIR).join(format!("{id}.{UPLOAD_EXTENSION}"))
    }

    /// One part of a multipart upload that has not been stitched yet.
    pub fn upload_part_path(&self, id: BundleId, index: u32) -> PathBuf {
        Path::new(UPLOADS_DIR).join(format!("{id}.{index}.{UPLOAD_EXTENSION}"))
    }

    /// Converted, queryable database for a bundle.
    pub fn db_path(&self, id: BundleId) -> PathBuf {
        Path::new(DBS_DIR).join(format!("{id}.{DB_EXTENSION}"))
    }

    /// Absolute location of a path relative to the bundle directory.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Recover the bundle id from a file name by its leading digit run.
    ///
    /// Only the final path component is inspected, so both `dbs/12.lsif.db`
    /// and `12.lsif.db` yield `12`. Returns `None` for names that don't start
    /// with a digit or encode a non-positive id.
    ///
    /// ```
    /// use depot_storage::{BundleId, BundleLayout};
    ///
    /// assert_eq!(BundleLayout::bundle_id("dbs/12.lsif.db"), BundleId::new(12));
    /// assert_eq!(BundleLayout::bundle_id("uploads/7.3.lsif.gz"), BundleId::new(7));
    /// assert_eq!(BundleLayout::bundle_id("dbs/.DS_Store"), None);
    /// ```
    pub fn bundle_id(path: impl AsRef<Path>) -> Option<BundleId> {
        let name = path.as_ref().file_name()?.to_str()?;
        let end = name.find(|c: char| !c.is_ascii_digit()).unwrap_or(name.len());
        name[..end].parse().ok()
    }
}

//! On-disk layout and filesystem access for code-intelligence bundles.
//!
//! Every bundle lives under a single bundle directory:
//! - `uploads/` holds raw and partial upload artifacts, named by bundle id.
//! - `dbs/` holds one converted, queryable database per bundle id.
//!
//! [`BundleLayout`] is the only place that knows the naming convention;
//! everything else asks it for paths. [`StorageBackend`] provides the
//! listing/stat/delete primitives the janitor needs, and [`DiskSizer`]
//! reports how full the hosting filesystem is.

pub mod backend;
mod disk;
pub mod error;
pub mod file;
mod id;
mod layout;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::disk::{DiskSizer, DiskUsage, FsDiskSizer};
pub use crate::file::FileInfo;
pub use crate::id::BundleId;
pub use crate::layout::{BundleLayout, DBS_DIR, UPLOADS_DIR};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;

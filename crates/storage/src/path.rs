//! Path validation for paths relative to the bundle directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a path relative to the bundle directory.
///
/// Ensures the path never escapes the bundle directory (`..` may only pop
/// components that were pushed before it) and contains no null bytes.
/// `.` components, repeated separators and trailing slashes are dropped.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use depot_storage::validate_path;
/// assert!(validate_path("dbs/42.lsif.db").is_ok());
/// assert!(validate_path("uploads/../dbs/42.lsif.db").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("dbs/../../42.lsif.db").is_err());
/// assert_eq!(validate_path("./dbs//42.lsif.db/").unwrap(), Path::new("dbs/42.lsif.db"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // the path in the underlying syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

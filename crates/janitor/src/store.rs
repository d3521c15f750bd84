use crate::error::Result;
use async_trait::async_trait;
use depot_storage::BundleId;
use derive_more::Display;
use std::collections::HashMap;

/// Canonical state of a bundle's record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum BundleState {
    #[display("completed")]
    Completed,
    #[display("queued")]
    Queued,
    #[display("processing")]
    Processing,
    /// Conversion failed; the bundle file will never be queried.
    #[display("errored")]
    Errored,
    #[display("{_0}")]
    Other(String),
}

impl From<&str> for BundleState {
    fn from(state: &str) -> Self {
        match state {
            "completed" => Self::Completed,
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "errored" => Self::Errored,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The system of record for bundles.
///
/// The janitor only ever deletes files; records are owned by whoever
/// implements this trait.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Look up the state of each id.
    ///
    /// Ids whose record no longer exists are simply missing from the map.
    async fn states(&self, ids: &[BundleId]) -> Result<HashMap<BundleId, BundleState>>;

    /// Remove the record of the oldest prunable bundle and return its id, or
    /// `None` if nothing can be pruned.
    ///
    /// The janitor deletes the matching database file afterwards.
    async fn prune(&self) -> Result<Option<BundleId>>;
}

//! Background reclamation of disk space in the bundle directory.
//!
//! The [`Janitor`] runs alongside query traffic. It only ever deletes files;
//! open database handles keep working after their file is unlinked, so
//! nothing needs to coordinate with the caches.
//!
//! ```no_run
//! use depot_config::Config;
//! use depot_janitor::{BundleStore, Janitor};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(store: Arc<dyn BundleStore>) -> depot_janitor::error::Result<()> {
//! let config = Config::load(None).expect("configuration");
//! let cancel = CancellationToken::new();
//! let handle = Janitor::from_config(&config, store)?.start(cancel.clone());
//! // ...
//! cancel.cancel();
//! let _ = handle.await;
//! # Ok(())
//! # }
//! ```

mod batch;
mod dead_dumps;
pub mod error;
mod free_space;
mod janitor;
mod metrics;
mod store;
#[cfg(test)]
mod testing;
mod uploads;

pub use crate::batch::batch_ids;
pub use crate::janitor::Janitor;
pub use crate::metrics::{JanitorMetrics, JanitorMetricsSnapshot};
pub use crate::store::{BundleState, BundleStore};

use crate::error::{ErrorKind, Result};
use crate::metrics::JanitorMetrics;
use crate::store::BundleStore;
use depot_config::{Config, JanitorConfig};
use depot_storage::backend::LocalBackend;
use depot_storage::{BackendHandle, BundleLayout, DiskSizer, FsDiskSizer};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodically reclaims space in the bundle directory.
///
/// Each pass runs, in order:
/// 1. removal of uploads that were never converted,
/// 2. removal of databases whose record is gone or errored,
/// 3. eviction of the oldest bundles until enough of the disk is free.
///
/// A failing step is logged and counted; the rest of the pass and all later
/// passes still run.
pub struct Janitor {
    pub(crate) layout: BundleLayout,
    pub(crate) backend: BackendHandle,
    pub(crate) store: Arc<dyn BundleStore>,
    pub(crate) sizer: Arc<dyn DiskSizer>,
    pub(crate) config: JanitorConfig,
    pub(crate) metrics: Arc<JanitorMetrics>,
}

impl Janitor {
    /// `backend` must be rooted at `layout.root()`.
    pub fn new(
        layout: BundleLayout,
        backend: BackendHandle,
        store: Arc<dyn BundleStore>,
        config: JanitorConfig,
    ) -> Self {
        Self {
            layout,
            backend,
            store,
            sizer: Arc::new(FsDiskSizer),
            config,
            metrics: Arc::new(JanitorMetrics::default()),
        }
    }

    /// Janitor for the local bundle directory named in `config`, creating
    /// its subdirectories if needed.
    pub fn from_config(config: &Config, store: Arc<dyn BundleStore>) -> Result<Self> {
        let root = std::path::absolute(&config.bundle_dir).or_raise(|| ErrorKind::Storage)?;
        let layout = BundleLayout::new(&root);
        layout.prepare().or_raise(|| ErrorKind::Storage)?;
        let backend = LocalBackend::new("bundles", &root).or_raise(|| ErrorKind::Storage)?;
        Ok(Self::new(layout, Arc::new(backend), store, config.janitor.clone()))
    }

    pub fn with_disk_sizer(mut self, sizer: Arc<dyn DiskSizer>) -> Self {
        self.sizer = sizer;
        self
    }

    pub fn metrics(&self) -> Arc<JanitorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Run [`run`](Self::run) on a new task.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run a pass immediately, then one every `interval_secs`, until
    /// `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(root = %self.root().display(), interval = ?self.config.interval(), "Janitor started");
        loop {
            self.run_once(&cancel).await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval()) => {},
            }
        }
        tracing::info!(root = %self.root().display(), "Janitor stopped");
    }

    /// Run a single pass.
    pub async fn run_once(&self, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let result = self.clean_old_uploads(cancel).await;
        self.record("clean_old_uploads", result);
        if cancel.is_cancelled() {
            return;
        }
        let result = self.remove_dead_dumps(cancel).await;
        self.record("remove_dead_dumps", result);
        if cancel.is_cancelled() {
            return;
        }
        let result = self.free_space(cancel).await;
        self.record("free_space", result);
    }

    fn record(&self, task: &'static str, result: Result<()>) {
        if let Err(err) = result {
            JanitorMetrics::add(&self.metrics.errors, 1);
            tracing::error!(task, error = ?err, "Janitor task failed");
        }
    }

    /// Delete a file relative to the bundle directory. Returns `false` if it
    /// was already gone.
    pub(crate) async fn remove(&self, path: &Path, counter: &AtomicU64) -> Result<bool> {
        match self.backend.delete(path).await {
            Ok(()) => {
                JanitorMetrics::add(counter, 1);
                Ok(true)
            },
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }
}

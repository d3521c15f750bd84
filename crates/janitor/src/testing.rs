//! In-crate fakes and a temporary bundle directory for janitor tests.

use crate::error::{ErrorKind, Result};
use crate::janitor::Janitor;
use crate::store::{BundleState, BundleStore};
use async_trait::async_trait;
use depot_config::JanitorConfig;
use depot_storage::backend::LocalBackend;
use depot_storage::{BundleId, BundleLayout, DiskSizer, DiskUsage};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub(crate) fn id(n: i64) -> BundleId {
    BundleId::new(n).unwrap()
}

pub(crate) struct Fixture {
    _temp_dir: TempDir,
    pub(crate) layout: BundleLayout,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = BundleLayout::new(temp_dir.path());
        layout.prepare().unwrap();
        Self { _temp_dir: temp_dir, layout }
    }

    /// One-minute upload age limit and the default batch size.
    pub(crate) fn config() -> JanitorConfig {
        JanitorConfig { max_unconverted_upload_age_secs: 60, ..JanitorConfig::default() }
    }

    pub(crate) fn janitor(&self, store: impl Into<Arc<FakeStore>>, sizer: impl Into<Arc<FakeSizer>>) -> Janitor {
        self.janitor_with(Self::config(), store, sizer)
    }

    pub(crate) fn janitor_with(
        &self,
        config: JanitorConfig,
        store: impl Into<Arc<FakeStore>>,
        sizer: impl Into<Arc<FakeSizer>>,
    ) -> Janitor {
        let backend = LocalBackend::new("test", self.layout.root()).unwrap();
        let store: Arc<FakeStore> = store.into();
        let sizer: Arc<FakeSizer> = sizer.into();
        Janitor::new(self.layout.clone(), Arc::new(backend), store, config).with_disk_sizer(sizer)
    }

    pub(crate) fn upload(&self, n: i64) -> PathBuf {
        self.layout.upload_path(id(n))
    }

    pub(crate) fn db(&self, n: i64) -> PathBuf {
        self.layout.db_path(id(n))
    }

    /// Write `size` bytes to a path relative to the bundle directory and
    /// backdate its modification time by `age`.
    pub(crate) fn write(&self, relative: &Path, size: usize, age: Duration) {
        let path = self.layout.resolve(relative);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    pub(crate) fn exists(&self, relative: &Path) -> bool {
        self.layout.resolve(relative).exists()
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    states: HashMap<BundleId, BundleState>,
    /// Zero-based index of the first `states` call that fails.
    fail_states_at: Option<usize>,
    fail_prune: bool,
    prunable: Mutex<VecDeque<BundleId>>,
    pub(crate) state_calls: Mutex<Vec<Vec<BundleId>>>,
    pub(crate) prune_calls: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn with_states(states: impl IntoIterator<Item = (i64, BundleState)>) -> Self {
        Self { states: states.into_iter().map(|(n, s)| (id(n), s)).collect(), ..Self::default() }
    }

    pub(crate) fn prunable(self, ids: impl IntoIterator<Item = i64>) -> Self {
        *self.prunable.lock().unwrap() = ids.into_iter().map(id).collect();
        self
    }

    pub(crate) fn failing_states(self) -> Self {
        self.failing_states_at(0)
    }

    pub(crate) fn failing_states_at(mut self, call: usize) -> Self {
        self.fail_states_at = Some(call);
        self
    }

    pub(crate) fn failing_prune(mut self) -> Self {
        self.fail_prune = true;
        self
    }

    pub(crate) fn prune_calls(&self) -> usize {
        self.prune_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleStore for FakeStore {
    async fn states(&self, ids: &[BundleId]) -> Result<HashMap<BundleId, BundleState>> {
        let call = {
            let mut calls = self.state_calls.lock().unwrap();
            calls.push(ids.to_vec());
            calls.len() - 1
        };
        if self.fail_states_at.is_some_and(|n| call >= n) {
            exn::bail!(ErrorKind::BundleStore);
        }
        Ok(ids.iter().filter_map(|id| self.states.get(id).map(|s| (*id, s.clone()))).collect())
    }

    async fn prune(&self) -> Result<Option<BundleId>> {
        self.prune_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_prune {
            exn::bail!(ErrorKind::BundleStore);
        }
        Ok(self.prunable.lock().unwrap().pop_front())
    }
}

pub(crate) struct FakeSizer {
    usage: Option<DiskUsage>,
}

impl FakeSizer {
    pub(crate) fn new(usage: DiskUsage) -> Self {
        Self { usage: Some(usage) }
    }

    /// Plenty of free space: eviction never runs.
    pub(crate) fn roomy() -> Self {
        Self::new(DiskUsage { total_bytes: 1000, available_bytes: 1000 })
    }

    pub(crate) fn failing() -> Self {
        Self { usage: None }
    }
}

impl DiskSizer for FakeSizer {
    fn usage(&self, path: &Path) -> depot_storage::error::Result<DiskUsage> {
        match self.usage {
            Some(usage) => Ok(usage),
            None => exn::bail!(depot_storage::error::ErrorKind::DiskUsage(path.to_path_buf())),
        }
    }
}

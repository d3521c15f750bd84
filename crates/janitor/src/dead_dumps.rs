use crate::batch::batch_ids;
use crate::error::{ErrorKind, Result};
use crate::janitor::Janitor;
use crate::store::BundleState;
use depot_storage::{BundleId, BundleLayout};
use exn::ResultExt;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

impl Janitor {
    /// Remove converted databases whose record no longer exists or whose
    /// conversion errored.
    ///
    /// States are looked up in batches. Nothing is deleted unless every batch
    /// succeeded: a partial answer can't tell "gone" from "not asked yet".
    #[instrument(skip_all)]
    pub(crate) async fn remove_dead_dumps(&self, cancel: &CancellationToken) -> Result<()> {
        let files = self.backend.list(Some(self.layout.dbs_dir())).await.or_raise(|| ErrorKind::Storage)?;
        let mut paths: BTreeMap<BundleId, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            match BundleLayout::bundle_id(&file.path) {
                Some(id) => paths.entry(id).or_default().push(file.path),
                None => tracing::debug!(path = %file.path.display(), "Ignoring file without a bundle id"),
            }
        }
        if paths.is_empty() {
            return Ok(());
        }

        let ids: Vec<BundleId> = paths.keys().copied().collect();
        let mut states: HashMap<BundleId, BundleState> = HashMap::with_capacity(ids.len());
        for batch in batch_ids(&ids, self.config.dead_dump_batch_size) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            states.extend(self.store.states(batch).await.or_raise(|| ErrorKind::BundleStore)?);
        }

        for (id, paths) in paths {
            let state = states.get(&id);
            if !matches!(state, None | Some(BundleState::Errored)) {
                continue;
            }
            for path in paths {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                if self.remove(&path, &self.metrics.dead_dumps_removed).await? {
                    tracing::info!(bundle_id = %id, path = %path.display(), state = ?state, "Removed dead bundle database");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::BundleState;
    use crate::testing::{FakeSizer, FakeStore, Fixture, id};
    use depot_config::JanitorConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn canonical_states() -> Vec<(i64, BundleState)> {
        vec![
            (1, BundleState::Completed),
            (2, BundleState::Queued),
            (3, BundleState::Completed),
            (4, BundleState::Processing),
            (5, BundleState::Completed),
            (9, BundleState::Errored),
            (10, BundleState::Errored),
        ]
    }

    fn write_dbs(fixture: &Fixture, ids: impl IntoIterator<Item = i64>) {
        for n in ids {
            fixture.write(&fixture.db(n), 10, Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn test_removes_absent_and_errored() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=10);
        let janitor = fixture.janitor(FakeStore::with_states(canonical_states()), FakeSizer::roomy());

        janitor.remove_dead_dumps(&CancellationToken::new()).await.unwrap();

        for n in 1..=5 {
            assert!(fixture.exists(&fixture.db(n)), "bundle {n} should survive");
        }
        for n in 6..=10 {
            assert!(!fixture.exists(&fixture.db(n)), "bundle {n} should be removed");
        }
        assert_eq!(janitor.metrics().snapshot().dead_dumps_removed, 5);
    }

    #[tokio::test]
    async fn test_every_id_is_asked_about_once_in_batches() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=10);
        let store = Arc::new(FakeStore::with_states(canonical_states()));
        let config = JanitorConfig { dead_dump_batch_size: 3, ..Fixture::config() };
        let janitor = fixture.janitor_with(config, Arc::clone(&store), FakeSizer::roomy());

        janitor.remove_dead_dumps(&CancellationToken::new()).await.unwrap();

        let calls = store.state_calls.lock().unwrap().clone();
        assert_eq!(calls.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 3, 1]);
        let mut asked: Vec<_> = calls.concat();
        asked.sort();
        assert_eq!(asked, (1..=10).map(id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_batch_deletes_nothing() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=10);
        // Batches [1..3] and [4..6] succeed, [7..9] fails.
        let store = FakeStore::with_states(canonical_states()).failing_states_at(2);
        let config = JanitorConfig { dead_dump_batch_size: 3, ..Fixture::config() };
        let janitor = fixture.janitor_with(config, store, FakeSizer::roomy());

        let err = janitor.remove_dead_dumps(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, crate::error::ErrorKind::BundleStore));
        for n in 1..=10 {
            assert!(fixture.exists(&fixture.db(n)));
        }
        assert_eq!(janitor.metrics().snapshot().dead_dumps_removed, 0);
    }

    #[tokio::test]
    async fn test_empty_directory_skips_lookup() {
        let fixture = Fixture::new();
        let store = Arc::new(FakeStore::default().failing_states());
        let janitor = fixture.janitor(Arc::clone(&store), FakeSizer::roomy());

        janitor.remove_dead_dumps(&CancellationToken::new()).await.unwrap();
        assert!(store.state_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_files_without_bundle_id_are_ignored() {
        let fixture = Fixture::new();
        let stray = std::path::Path::new("dbs").join("lost+found.db");
        fixture.write(&stray, 10, Duration::ZERO);
        write_dbs(&fixture, [7]);
        let janitor = fixture.janitor(FakeStore::default(), FakeSizer::roomy());

        janitor.remove_dead_dumps(&CancellationToken::new()).await.unwrap();
        assert!(fixture.exists(&stray));
        assert!(!fixture.exists(&fixture.db(7)));
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=3);
        let store = Arc::new(FakeStore::default());
        let janitor = fixture.janitor(Arc::clone(&store), FakeSizer::roomy());
        let cancel = CancellationToken::new();
        cancel.cancel();

        janitor.remove_dead_dumps(&cancel).await.unwrap();
        assert!(store.state_calls.lock().unwrap().is_empty());
        assert!(fixture.exists(&fixture.db(1)));
    }
}

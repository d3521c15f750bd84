use crate::error::{ErrorKind, Result};
use crate::janitor::Janitor;
use exn::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

impl Janitor {
    /// Evict bundles, oldest first as decided by the store, until the
    /// filesystem hosting the bundle directory has the desired share free.
    ///
    /// Stops as soon as enough has been freed or nothing is left to prune.
    /// Usage is measured once up front: the counted bytes are what was
    /// deleted, not what the filesystem reports afterwards.
    #[instrument(skip_all)]
    pub(crate) async fn free_space(&self, cancel: &CancellationToken) -> Result<()> {
        let usage = self.sizer.usage(self.layout.root()).or_raise(|| ErrorKind::DiskUsage)?;
        let deficit = usage.deficit(self.config.desired_percent_free);
        if deficit == 0 {
            return Ok(());
        }
        tracing::info!(
            deficit,
            total = usage.total_bytes,
            available = usage.available_bytes,
            "Evicting bundles to free disk space"
        );

        let mut freed = 0u64;
        while freed < deficit {
            if cancel.is_cancelled() {
                break;
            }
            let Some(id) = self.store.prune().await.or_raise(|| ErrorKind::BundleStore)? else {
                tracing::warn!(freed, deficit, "Nothing left to prune");
                break;
            };
            let path = self.layout.db_path(id);
            let size = match self.backend.stat(&path).await {
                Ok(info) => info.size,
                Err(err) if err.is_not_found() => 0,
                Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
            };
            if self.remove(&path, &self.metrics.evicted_bundles_removed).await? {
                freed = freed.saturating_add(size);
                tracing::info!(bundle_id = %id, size, "Evicted bundle");
            } else {
                tracing::debug!(bundle_id = %id, "Pruned bundle had no database file");
            }
        }
        tracing::info!(freed, deficit, "Finished freeing disk space");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{FakeSizer, FakeStore, Fixture};
    use depot_storage::DiskUsage;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// 10% of 2000 bytes wanted free, 100 available: 100 bytes short.
    fn short_by_100() -> FakeSizer {
        FakeSizer::new(DiskUsage { total_bytes: 2000, available_bytes: 100 })
    }

    fn write_dbs(fixture: &Fixture, ids: impl IntoIterator<Item = i64>) {
        for n in ids {
            fixture.write(&fixture.db(n), 20, Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn test_evicts_until_deficit_is_covered() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=10);
        let store = Arc::new(FakeStore::default().prunable(1..=10));
        let janitor = fixture.janitor(Arc::clone(&store), short_by_100());

        janitor.free_space(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.prune_calls(), 5);
        for n in 1..=5 {
            assert!(!fixture.exists(&fixture.db(n)));
        }
        for n in 6..=10 {
            assert!(fixture.exists(&fixture.db(n)));
        }
        assert_eq!(janitor.metrics().snapshot().evicted_bundles_removed, 5);
    }

    #[tokio::test]
    async fn test_stops_once_freed_bytes_reach_deficit() {
        let fixture = Fixture::new();
        // Database n is n bytes: 1..=13 frees 91, 1..=14 frees 105.
        for n in 1..=20 {
            fixture.write(&fixture.db(n), usize::try_from(n).unwrap(), Duration::ZERO);
        }
        let store = Arc::new(FakeStore::default().prunable(1..=20));
        let janitor = fixture.janitor(Arc::clone(&store), short_by_100());

        janitor.free_space(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.prune_calls(), 14);
        for n in 1..=14 {
            assert!(!fixture.exists(&fixture.db(n)));
        }
        for n in 15..=20 {
            assert!(fixture.exists(&fixture.db(n)));
        }
        assert_eq!(janitor.metrics().snapshot().evicted_bundles_removed, 14);
    }

    #[tokio::test]
    async fn test_stops_when_nothing_left_to_prune() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=2);
        let store = Arc::new(FakeStore::default().prunable(1..=2));
        let janitor = fixture.janitor(Arc::clone(&store), short_by_100());

        janitor.free_space(&CancellationToken::new()).await.unwrap();

        // Two evictions, then the `None` that ends the loop.
        assert_eq!(store.prune_calls(), 3);
        assert!(!fixture.exists(&fixture.db(1)));
        assert!(!fixture.exists(&fixture.db(2)));
    }

    #[tokio::test]
    async fn test_missing_file_frees_nothing() {
        let fixture = Fixture::new();
        // Bundle 1 was pruned but its database never existed.
        write_dbs(&fixture, 2..=10);
        let store = Arc::new(FakeStore::default().prunable(1..=10));
        let janitor = fixture.janitor(Arc::clone(&store), short_by_100());

        janitor.free_space(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.prune_calls(), 6);
        for n in 2..=6 {
            assert!(!fixture.exists(&fixture.db(n)));
        }
        assert!(fixture.exists(&fixture.db(7)));
        assert_eq!(janitor.metrics().snapshot().evicted_bundles_removed, 5);
    }

    #[tokio::test]
    async fn test_enough_space_prunes_nothing() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=2);
        let store = Arc::new(FakeStore::default().prunable(1..=2));
        let janitor = fixture.janitor(Arc::clone(&store), FakeSizer::roomy());

        janitor.free_space(&CancellationToken::new()).await.unwrap();
        assert_eq!(store.prune_calls(), 0);
        assert!(fixture.exists(&fixture.db(1)));
    }

    #[tokio::test]
    async fn test_prune_failure_is_returned() {
        let fixture = Fixture::new();
        let store = FakeStore::default().failing_prune();
        let janitor = fixture.janitor(store, short_by_100());

        let err = janitor.free_space(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, crate::error::ErrorKind::BundleStore));
    }

    #[tokio::test]
    async fn test_disk_usage_failure_is_returned() {
        let fixture = Fixture::new();
        let store = Arc::new(FakeStore::default().prunable([1]));
        let janitor = fixture.janitor(Arc::clone(&store), FakeSizer::failing());

        let err = janitor.free_space(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, crate::error::ErrorKind::DiskUsage));
        assert_eq!(store.prune_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_prunes_nothing() {
        let fixture = Fixture::new();
        write_dbs(&fixture, 1..=3);
        let store = Arc::new(FakeStore::default().prunable(1..=3));
        let janitor = fixture.janitor(Arc::clone(&store), short_by_100());
        let cancel = CancellationToken::new();
        cancel.cancel();

        janitor.free_space(&cancel).await.unwrap();
        assert_eq!(store.prune_calls(), 0);
    }
}

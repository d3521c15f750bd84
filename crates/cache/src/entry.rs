//! A cached database handle with an active-user count and a close-once guard.

use crate::Database;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Notify;

/// Set in `users` once the handle is closing; no further users may join.
const CLOSED: usize = 1 << (usize::BITS - 1);

pub(crate) struct CacheEntry<D: Database> {
    filename: String,
    database: Arc<D>,
    /// Active users, with [`CLOSED`] or'd in once closing has started.
    users: AtomicUsize,
    /// Signalled whenever `users` drops to zero.
    idle: Notify,
    close_requested: AtomicBool,
}

impl<D: Database> CacheEntry<D> {
    /// Wrap a freshly opened handle. The caller is already counted as a user
    /// so the entry can't be closed between insertion and its first use.
    pub(crate) fn new(filename: impl Into<String>, database: D) -> (Arc<Self>, Lease<D>) {
        let entry = Arc::new(Self {
            filename: filename.into(),
            database: Arc::new(database),
            users: AtomicUsize::new(1),
            idle: Notify::new(),
            close_requested: AtomicBool::new(false),
        });
        let lease = Lease { entry: Arc::clone(&entry) };
        (entry, lease)
    }

    /// Register another user, unless the handle has already been closed.
    pub(crate) fn acquire(self: &Arc<Self>) -> Option<Lease<D>> {
        self.users
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| if n & CLOSED != 0 { None } else { Some(n + 1) })
            .ok()
            .map(|_| Lease { entry: Arc::clone(self) })
    }

    fn release(&self) {
        if self.users.fetch_sub(1, Ordering::AcqRel) == 1 {
            // `notify_one` stores a permit if the closer isn't waiting yet.
            self.idle.notify_one();
        }
    }

    /// Ask for the handle to be closed once every current user is done.
    ///
    /// Returns immediately; the wait and the close happen on a detached task.
    /// Only the first request does anything, so eviction and a rejected
    /// insertion can both ask without closing twice.
    pub(crate) fn request_close(self: &Arc<Self>, runtime: &Handle) {
        if self.close_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        let entry = Arc::clone(self);
        runtime.spawn(async move { entry.close_when_idle().await });
    }

    async fn close_when_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.users.compare_exchange(0, CLOSED, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                break;
            }
            idle.await;
        }
        match self.database.close().await {
            Ok(()) => tracing::debug!(filename = %self.filename, "Closed evicted database handle"),
            Err(err) => tracing::warn!(filename = %self.filename, error = ?err, "Failed to close database handle"),
        }
    }

    #[cfg(test)]
    pub(crate) fn users(&self) -> usize {
        self.users.load(Ordering::Acquire) & !CLOSED
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.users.load(Ordering::Acquire) & CLOSED != 0
    }
}

/// One active use of a [`CacheEntry`]; released on drop, whatever the
/// outcome of the handler (including its future being dropped mid-flight).
pub(crate) struct Lease<D: Database> {
    entry: Arc<CacheEntry<D>>,
}

impl<D: Database> Lease<D> {
    pub(crate) fn database(&self) -> Arc<D> {
        Arc::clone(&self.entry.database)
    }
}

impl<D: Database> Drop for Lease<D> {
    fn drop(&mut self) {
        self.entry.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        closes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Database for Counting {
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                exn::bail!(ErrorKind::Close("disk on fire".to_string()));
            }
            Ok(())
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_new_entry_counts_creator() {
        let (entry, lease) = CacheEntry::new("1.lsif.db", Counting::default());
        assert_eq!(entry.users(), 1);
        drop(lease);
        assert_eq!(entry.users(), 0);
    }

    #[tokio::test]
    async fn test_close_waits_for_users() {
        let (entry, lease) = CacheEntry::new("1.lsif.db", Counting::default());
        let second = entry.acquire().unwrap();
        entry.request_close(&Handle::current());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(entry.database.closes.load(Ordering::SeqCst), 0);
        drop(lease);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(entry.database.closes.load(Ordering::SeqCst), 0);
        drop(second);

        wait_until(|| entry.database.closes.load(Ordering::SeqCst) == 1).await;
        assert!(entry.is_closed());
        assert!(entry.acquire().is_none());
    }

    #[tokio::test]
    async fn test_close_runs_once() {
        let (entry, lease) = CacheEntry::new("1.lsif.db", Counting::default());
        entry.request_close(&Handle::current());
        entry.request_close(&Handle::current());
        drop(lease);
        entry.request_close(&Handle::current());

        wait_until(|| entry.is_closed()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(entry.database.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_of_idle_entry_is_immediate() {
        let (entry, lease) = CacheEntry::new("1.lsif.db", Counting::default());
        drop(lease);
        entry.request_close(&Handle::current());
        wait_until(|| entry.database.closes.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let database = Counting { fail: true, ..Default::default() };
        let (entry, lease) = CacheEntry::new("1.lsif.db", database);
        drop(lease);
        entry.request_close(&Handle::current());
        wait_until(|| entry.database.closes.load(Ordering::SeqCst) == 1).await;
        assert!(entry.is_closed());
    }

    #[tokio::test]
    async fn test_lease_released_when_future_is_dropped() {
        let (entry, lease) = CacheEntry::new("1.lsif.db", Counting::default());
        let task = tokio::spawn(async move {
            let _lease = lease;
            std::future::pending::<()>().await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(entry.users(), 1);
        task.abort();
        let _ = task.await;
        assert_eq!(entry.users(), 0);
    }
}

//! Bounded cache of open database handles.

use crate::Database;
use crate::entry::CacheEntry;
use crate::error::{ErrorKind, Result};
use crate::gate::Gates;
use depot_config::CacheConfig;
use exn::OptionExt;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Size-bounded, refcounted cache of open database handles, keyed by
/// filename.
///
/// Capacity is a number of open handles: the scarce resource is open
/// connections, not memory. Admission and eviction are left to the
/// underlying TinyLFU cache; whatever it decides, a handle is closed
/// exactly once, and never while a [`with_database`](Self::with_database)
/// handler is still using it.
pub struct DatabaseCache<D: Database> {
    cache: Cache<String, Arc<CacheEntry<D>>>,
    opening: Gates,
    runtime: Handle,
}

impl<D: Database> DatabaseCache<D> {
    /// Create a cache holding at most `capacity` open handles.
    ///
    /// Must be called from within a Tokio runtime: evicted handles are
    /// closed on background tasks spawned onto it.
    pub fn new(capacity: u64) -> Result<Self> {
        let runtime = Handle::try_current().ok().ok_or_raise(|| ErrorKind::Runtime)?;
        let on_evict = runtime.clone();
        let cache = Cache::builder()
            .max_capacity(capacity)
            // Called for every removal cause, including admission rejection.
            // Must not block.
            .eviction_listener(move |filename: Arc<String>, entry: Arc<CacheEntry<D>>, cause: RemovalCause| {
                tracing::trace!(filename = %filename, ?cause, "Database handle left the cache");
                entry.request_close(&on_evict);
            })
            .build();
        Ok(Self { cache, opening: Gates::default(), runtime })
    }

    /// Create a cache sized by `config.database_capacity`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.database_capacity)
    }

    /// Run `handler` against the open database for `filename`, opening it
    /// with `open` first if it isn't cached.
    ///
    /// - `open` is only called on a miss, and concurrent misses on the same
    ///   filename wait for a single `open` rather than each calling their own.
    ///   If it fails its error is returned as-is to that caller and nothing is
    ///   cached; the next waiter tries again.
    /// - The handle stays open for as long as `handler` runs, even if it is
    ///   evicted in the meantime. `handler` must not keep its `Arc` past
    ///   returning.
    /// - Whatever `handler` returns is returned; an `Err` does not affect
    ///   cache membership.
    ///
    /// No timeout is applied; callers wanting one should wrap the call.
    ///
    /// ```no_run
    /// use depot_cache::{DatabaseCache, SqliteDatabase, error::{ErrorKind, Result}};
    /// use exn::ResultExt;
    ///
    /// # async fn example(cache: &DatabaseCache<SqliteDatabase>) -> Result<()> {
    /// let path = "/lsif-storage/dbs/42.lsif.db";
    /// let count: i64 = cache
    ///     .with_database(path, || SqliteDatabase::open(path), |db| async move {
    ///         let row: (i64,) = sqlx::query_as("SELECT count(*) FROM documents")
    ///             .fetch_one(db.pool())
    ///             .await
    ///             .or_raise(|| ErrorKind::Open(db.path().to_path_buf()))?;
    ///         Ok(row.0)
    ///     })
    ///     .await?;
    /// # let _ = count;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_database<T, E, O, OFut, H, HFut>(&self, filename: &str, open: O, handler: H) -> std::result::Result<T, E>
    where
        O: FnOnce() -> OFut,
        OFut: Future<Output = std::result::Result<D, E>>,
        H: FnOnce(Arc<D>) -> HFut,
        HFut: Future<Output = std::result::Result<T, E>>,
    {
        // An entry can still be handed out by the cache for a moment after it
        // started closing; that's a miss like any other.
        if let Some(lease) = self.cache.get(filename).and_then(|entry| entry.acquire()) {
            tracing::trace!(filename, "Database cache hit");
            return handler(lease.database()).await;
        }

        let gate = self.opening.enter(filename).await;
        // Whoever held the gate before us may have opened it already.
        if let Some(lease) = self.cache.get(filename).and_then(|entry| entry.acquire()) {
            drop(gate);
            tracing::trace!(filename, "Database cache hit after waiting");
            return handler(lease.database()).await;
        }

        tracing::trace!(filename, "Database cache miss");
        let database = open().await?;
        let (entry, lease) = CacheEntry::new(filename, database);
        self.cache.insert(filename.to_string(), Arc::clone(&entry));
        drop(gate);

        let result = handler(lease.database()).await;
        drop(lease);

        // Rejected on admission, or already evicted again. The eviction
        // listener has (or will have) asked for the close as well; only the
        // first request counts.
        if !self.cache.contains_key(filename) {
            entry.request_close(&self.runtime);
        }
        result
    }

    /// Evict every handle. Each one closes as soon as its current users are
    /// done; use on shutdown.
    pub fn clear(&self) {
        // `invalidate_all` notifies lazily; removing key by key notifies now.
        for (filename, _) in self.cache.iter() {
            self.cache.invalidate(filename.as_str());
        }
        self.cache.run_pending_tasks();
    }

    /// Approximate number of cached handles.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending admissions and evictions now instead of lazily.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

use crate::gate::Gates;
use crate::models::{DocumentData, ResultChunkData};
use depot_config::CacheConfig;
use moka::sync::Cache;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// A decoded value that knows how much work caching it saves.
pub trait Weighted: Send + Sync + 'static {
    /// Abstract cost of the value: one for the value itself plus one per
    /// child element. Saturates at `u32::MAX`.
    fn cost(&self) -> u32;
}

pub type DocumentCache = DecodedCache<DocumentData>;
pub type ResultChunkCache = DecodedCache<ResultChunkData>;

impl DocumentCache {
    /// Create a document cache bounded by `config.document_capacity`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.document_capacity)
    }
}

impl ResultChunkCache {
    /// Create a result chunk cache bounded by `config.result_chunk_capacity`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.result_chunk_capacity)
    }
}

/// Key for a decoded value: the bundle database it came from plus the id of
/// the document or result chunk within it.
///
/// ```
/// assert_eq!(depot_cache::cache_key("42.lsif.db", 7), "42.lsif.db::7");
/// ```
pub fn cache_key(filename: &str, id: impl Display) -> String {
    format!("{filename}::{id}")
}

/// Cost-bounded cache of decoded bundle values.
///
/// Unlike [`DatabaseCache`](crate::DatabaseCache) nothing needs to happen on
/// eviction: values are plain data and are dropped with their last `Arc`.
pub struct DecodedCache<V: Weighted> {
    cache: Cache<String, Arc<V>>,
    decoding: Gates,
}

impl<V: Weighted> DecodedCache<V> {
    /// Create a cache bounded by total [`Weighted::cost`].
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .weigher(|_key: &String, value: &Arc<V>| value.cost())
            .build();
        Self { cache, decoding: Gates::default() }
    }

    /// Return the cached value for `key`, decoding it with `factory` on a
    /// miss.
    ///
    /// Concurrent misses on the same key run a single `factory`; the others
    /// wait for it and share its value. A failed decode is returned unchanged
    /// to its caller and leaves nothing behind, so the next caller tries
    /// again.
    pub async fn get_or_create<E, F, Fut>(&self, key: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.cache.get(key) {
            tracing::trace!(key, "Decoded cache hit");
            return Ok(value);
        }
        let _gate = self.decoding.enter(key).await;
        if let Some(value) = self.cache.get(key) {
            tracing::trace!(key, "Decoded cache hit after waiting");
            return Ok(value);
        }
        let value = Arc::new(factory().await?);
        tracing::trace!(key, cost = value.cost(), "Decoded cache miss");
        self.cache.insert(key.to_string(), Arc::clone(&value));
        Ok(value)
    }

    /// Approximate number of cached values.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Approximate total cost of cached values.
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

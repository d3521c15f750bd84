use crate::error::Result;
use async_trait::async_trait;

/// An open bundle database that owns an external resource.
///
/// [`DatabaseCache`](crate::DatabaseCache) calls [`close`](Self::close)
/// exactly once per handle, after the handle has left the cache and every
/// handler that was using it has returned. Nothing awaits the outcome:
/// failures are logged by the cache.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn close(&self) -> Result<()>;
}

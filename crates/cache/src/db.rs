//! Read-only connection to a converted bundle database.

use crate::database::Database;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Each open bundle is one entry in the DatabaseCache; the cache bounds how
// many bundles are open, this bounds how many connections each one holds.
const MAX_CONNECTIONS: u32 = 2;

/// A converted bundle opened for querying.
///
/// Bundles are written once by the converter and never modified afterwards,
/// so connections are read-only and never create the file. The janitor may
/// unlink the file while the pool is still open; existing connections keep
/// working until the pool is closed.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open the bundle database at `path`.
    ///
    /// At least one connection is established before returning, so a missing
    /// or unreadable file fails here rather than on the first query.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            // Readers never contend with a writer, but a bundle can be
            // opened while the converter is still renaming it into place.
            .busy_timeout(Duration::from_millis(500));
        let pool = SqlitePoolOptions::new()
            // Applied to EVERY connection the pool opens, not just the first.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "Opened bundle database");
        Ok(Self { path: path.to_path_buf(), pool })
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA query_only = ON;
                PRAGMA cache_size = -2048;
                PRAGMA temp_store = MEMORY;
                PRAGMA mmap_size = 33554432;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connection pool for running bundle queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    /// Waits for checked-out connections to be returned, then closes them.
    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        tracing::debug!(path = %self.path.display(), "Closed bundle database");
        Ok(())
    }
}

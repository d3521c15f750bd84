//! In-memory caches sitting in front of bundle databases.
//!
//! Opening a bundle database is expensive and decoding its documents and
//! result chunks is not much cheaper, so query handlers go through two kinds
//! of cache:
//!
//! - [`DatabaseCache`]: a bounded, refcounted cache of **open** database
//!   handles. Handles are only ever closed once they have been evicted *and*
//!   the last handler using them has returned.
//! - [`DecodedCache`]: bounded caches of decoded [`DocumentData`] and
//!   [`ResultChunkData`], weighted by how much decode work an entry saves
//!   rather than by its size in bytes.
//!
//! Both are safe to share between any number of concurrent tasks.

mod database;
mod db;
mod decoded;
mod entry;
pub mod error;
mod gate;
mod handles;
pub mod models;

pub use crate::database::Database;
pub use crate::db::SqliteDatabase;
pub use crate::decoded::{DecodedCache, DocumentCache, ResultChunkCache, Weighted, cache_key};
pub use crate::handles::DatabaseCache;
pub use crate::models::{DocumentData, ResultChunkData};

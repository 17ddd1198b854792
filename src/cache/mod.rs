//! Query cache for paginated list results.
//!
//! This module provides the cache service around the merge policy:
//! - [`PageCache`] - get / write (merge-insert) / evict, plus async
//!   cache-first and load-more fetch helpers
//! - [`PageStore`] - pluggable storage backends (memory, SQLite, noop)

mod layer;
mod storage;

pub use layer::{CacheSource, CachedPage, PageCache};
pub use storage::{MemoryStore, NoopStore, PageStore, SqliteStore, StoredPage};

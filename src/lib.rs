//! boardcache - client-side pagination cache for a task-management API.
//!
//! Stores one canonical [`PageResult`] per logical list query (task lists per
//! board, board lists per client, and so on) and reconciles refetches and
//! "load more" fetches through a cursor-aware [`merge`] policy. Which queries
//! append and which replace, and which arguments partition their cache, is
//! configured once at setup via [`PolicySet`].
//!
//! ```no_run
//! use boardcache::{ListQueryKey, MemoryStore, PageCache, PolicySet, QueryPolicy};
//!
//! let policies = PolicySet::new()
//!   .with_query("board_tasks", QueryPolicy::concatenating(&["board_id"]));
//! let cache = PageCache::new(MemoryStore::new(), policies);
//!
//! let key = ListQueryKey::new("board_tasks").with_arg("board_id", 7);
//! # let fetched: boardcache::PageResult<String> = boardcache::PageResult::empty();
//! let canonical = cache.write(&key, Some(fetched)).unwrap();
//! ```

pub mod cache;
pub mod key;
pub mod merge;
pub mod page;
pub mod policy;
pub mod query;

pub use cache::{
  CacheSource, CachedPage, MemoryStore, NoopStore, PageCache, PageStore, SqliteStore, StoredPage,
};
pub use key::ListQueryKey;
pub use merge::merge;
pub use page::{PageInfo, PageResult, Statistics};
pub use policy::{PolicySet, QueryPolicy};
pub use query::{PageQuery, QueryState};

//! Page store trait and backends.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::page::PageResult;

/// A cached page result with its storage timestamp.
#[derive(Debug, Clone)]
pub struct StoredPage<T> {
  pub page: PageResult<T>,
  /// When the page was written, for staleness checks.
  pub cached_at: DateTime<Utc>,
}

/// Storage backend for cached page results, keyed by query hash.
///
/// Individual operations are serialized by the backend's interior lock; the
/// cache layer's read-merge-write cycle assumes one logical writer per entry
/// (see [`crate::merge`] for the duplicate-suppression guard).
pub trait PageStore: Send + Sync {
  /// Get the cached page for a key, if any.
  fn get_page<T>(&self, key: &str) -> Result<Option<StoredPage<T>>>
  where
    T: DeserializeOwned;

  /// Store the canonical page for a key, replacing any previous value.
  fn put_page<T>(&self, key: &str, page: &PageResult<T>) -> Result<()>
  where
    T: Serialize;

  /// Drop the cached page for a key. Missing keys are fine.
  fn evict_page(&self, key: &str) -> Result<()>;

  /// Drop every cached page.
  fn evict_all(&self) -> Result<()>;
}

/// Store that keeps nothing. Used when caching is disabled.
pub struct NoopStore;

impl PageStore for NoopStore {
  fn get_page<T>(&self, _key: &str) -> Result<Option<StoredPage<T>>>
  where
    T: DeserializeOwned,
  {
    Ok(None) // Always miss
  }

  fn put_page<T>(&self, _key: &str, _page: &PageResult<T>) -> Result<()>
  where
    T: Serialize,
  {
    Ok(()) // Discard
  }

  fn evict_page(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn evict_all(&self) -> Result<()> {
    Ok(())
  }
}

/// In-memory store for tests and short-lived processes. Pages are held as
/// JSON values so one store can serve queries with different node types.
#[derive(Default)]
pub struct MemoryStore {
  pages: Mutex<HashMap<String, (serde_json::Value, DateTime<Utc>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl PageStore for MemoryStore {
  fn get_page<T>(&self, key: &str) -> Result<Option<StoredPage<T>>>
  where
    T: DeserializeOwned,
  {
    let pages = self
      .pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match pages.get(key) {
      Some((value, cached_at)) => {
        let page: PageResult<T> = serde_json::from_value(value.clone())
          .map_err(|e| eyre!("Failed to deserialize cached page: {}", e))?;
        Ok(Some(StoredPage {
          page,
          cached_at: *cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put_page<T>(&self, key: &str, page: &PageResult<T>) -> Result<()>
  where
    T: Serialize,
  {
    let value =
      serde_json::to_value(page).map_err(|e| eyre!("Failed to serialize page: {}", e))?;

    let mut pages = self
      .pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    pages.insert(key.to_string(), (value, Utc::now()));
    Ok(())
  }

  fn evict_page(&self, key: &str) -> Result<()> {
    let mut pages = self
      .pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    pages.remove(key);
    Ok(())
  }

  fn evict_all(&self) -> Result<()> {
    let mut pages = self
      .pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    pages.clear();
    Ok(())
  }
}

/// SQLite-backed store, for cache persistence across runs.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the page cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS page_cache (
    query_hash TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    node_count INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("boardcache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

impl PageStore for SqliteStore {
  fn get_page<T>(&self, key: &str) -> Result<Option<StoredPage<T>>>
  where
    T: DeserializeOwned,
  {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT data, cached_at FROM page_cache WHERE query_hash = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
      .ok();

    match row {
      Some((data, cached_at_str)) => {
        let page: PageResult<T> = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cached page: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(StoredPage { page, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn put_page<T>(&self, key: &str, page: &PageResult<T>) -> Result<()>
  where
    T: Serialize,
  {
    let data = serde_json::to_vec(page).map_err(|e| eyre!("Failed to serialize page: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO page_cache (query_hash, data, node_count, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![key, data, page.nodes.len()],
      )
      .map_err(|e| eyre!("Failed to store page: {}", e))?;

    Ok(())
  }

  fn evict_page(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM page_cache WHERE query_hash = ?", params![key])
      .map_err(|e| eyre!("Failed to evict page: {}", e))?;

    Ok(())
  }

  fn evict_all(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM page_cache", [])
      .map_err(|e| eyre!("Failed to clear page cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::page::PageResult;

  fn sample() -> PageResult<String> {
    PageResult::new(vec!["a".to_string(), "b".to_string()], "p1", true)
  }

  #[test]
  fn memory_store_round_trips_pages() {
    let store = MemoryStore::new();
    store.put_page("k1", &sample()).unwrap();

    let stored = store.get_page::<String>("k1").unwrap().unwrap();
    assert_eq!(stored.page, sample());
    assert!(store.get_page::<String>("k2").unwrap().is_none());
  }

  #[test]
  fn memory_store_evicts() {
    let store = MemoryStore::new();
    store.put_page("k1", &sample()).unwrap();
    store.put_page("k2", &sample()).unwrap();

    store.evict_page("k1").unwrap();
    assert!(store.get_page::<String>("k1").unwrap().is_none());
    assert!(store.get_page::<String>("k2").unwrap().is_some());

    store.evict_all().unwrap();
    assert!(store.get_page::<String>("k2").unwrap().is_none());
  }

  #[test]
  fn noop_store_always_misses() {
    let store = NoopStore;
    store.put_page("k1", &sample()).unwrap();
    assert!(store.get_page::<String>("k1").unwrap().is_none());
  }

  #[test]
  fn sqlite_store_round_trips_pages() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("cache.db")).unwrap();

    store.put_page("k1", &sample()).unwrap();
    let stored = store.get_page::<String>("k1").unwrap().unwrap();
    assert_eq!(stored.page, sample());

    // Replacement overwrites
    let replacement = PageResult::new(vec!["c".to_string()], "p2", false);
    store.put_page("k1", &replacement).unwrap();
    let stored = store.get_page::<String>("k1").unwrap().unwrap();
    assert_eq!(stored.page, replacement);
  }

  #[test]
  fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store.put_page("k1", &sample()).unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    let stored = store.get_page::<String>("k1").unwrap().unwrap();
    assert_eq!(stored.page, sample());
  }

  #[test]
  fn sqlite_store_evicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("cache.db")).unwrap();

    store.put_page("k1", &sample()).unwrap();
    store.evict_page("k1").unwrap();
    assert!(store.get_page::<String>("k1").unwrap().is_none());
  }
}

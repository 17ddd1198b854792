//! Cache service wiring storage, per-query policy, and the merge step.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::key::ListQueryKey;
use crate::merge::merge;
use crate::page::PageResult;
use crate::policy::{PolicySet, QueryPolicy};

use super::storage::PageStore;

/// Where a served page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, considered stale
  CacheStale,
  /// Network unavailable, serving cached data
  Offline,
}

/// A page result plus metadata about where it came from.
#[derive(Debug, Clone)]
pub struct CachedPage<T> {
  pub page: PageResult<T>,
  pub source: CacheSource,
  /// When the page was cached (if served from cache).
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CachedPage<T> {
  fn from_network(page: PageResult<T>) -> Self {
    Self {
      page,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  fn from_cache(page: PageResult<T>, cached_at: DateTime<Utc>, stale: bool) -> Self {
    Self {
      page,
      source: if stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }

  fn offline(page: PageResult<T>, cached_at: DateTime<Utc>) -> Self {
    Self {
      page,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

/// Query cache for paginated list results.
///
/// Owns a storage backend and the per-query policies, both fixed at
/// construction; constructed at startup and handed to callers, never a
/// process-wide singleton. Merging is synchronous within each call - the
/// store serializes individual operations, and callers are expected to run
/// at most one logical mutation per entry at a time (out-of-order fetch
/// completions get the merge policy's duplicate suppression, nothing more).
pub struct PageCache<S: PageStore> {
  store: Arc<S>,
  policies: PolicySet,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: PageStore> PageCache<S> {
  /// Create a cache over the given store and query policies.
  pub fn new(store: S, policies: PolicySet) -> Self {
    Self {
      store: Arc::new(store),
      policies,
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached pages.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Resolve a key's policy and storage hash. Partition arguments are
  /// applied here, so call sites can pass every argument they have.
  fn resolve(&self, key: &ListQueryKey) -> (QueryPolicy, String) {
    let policy = self.policies.policy(key.query());
    let hash = key.partitioned(&policy.partition_by).cache_hash();
    (policy, hash)
  }

  /// Read the cached page for a key, if any, with staleness metadata.
  pub fn get<T>(&self, key: &ListQueryKey) -> Result<Option<CachedPage<T>>>
  where
    T: DeserializeOwned,
  {
    let (_, hash) = self.resolve(key);
    let stored = match self.store.get_page::<T>(&hash)? {
      Some(s) => s,
      None => return Ok(None),
    };

    let stale = self.is_stale(stored.cached_at);
    Ok(Some(CachedPage::from_cache(
      stored.page,
      stored.cached_at,
      stale,
    )))
  }

  /// Merge an incoming fetch result into the cache and return the new
  /// canonical page. `None` records a no-op fetch.
  pub fn write<T>(&self, key: &ListQueryKey, incoming: Option<PageResult<T>>) -> Result<PageResult<T>>
  where
    T: Serialize + DeserializeOwned,
  {
    let (policy, hash) = self.resolve(key);
    let existing = self.store.get_page::<T>(&hash)?.map(|s| s.page);
    let merged = merge(existing, incoming, policy.concatenate);
    self.store.put_page(&hash, &merged)?;

    debug!(
      query = %key.description(),
      nodes = merged.nodes.len(),
      concatenate = policy.concatenate,
      "cached page updated"
    );

    Ok(merged)
  }

  /// Drop the cached page for a key.
  pub fn evict(&self, key: &ListQueryKey) -> Result<()> {
    let (_, hash) = self.resolve(key);
    self.store.evict_page(&hash)
  }

  /// Drop every cached page.
  pub fn evict_all(&self) -> Result<()> {
    self.store.evict_all()
  }

  /// Fetch a page with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network and merge under the query's policy
  /// 3. On network failure, return stale cache (offline mode)
  pub async fn fetch_page<T, F, Fut>(&self, key: &ListQueryKey, fetcher: F) -> Result<CachedPage<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<PageResult<T>>>,
  {
    let (policy, hash) = self.resolve(key);

    if let Some(stored) = self.store.get_page::<T>(&hash)? {
      if !self.is_stale(stored.cached_at) {
        debug!(query = %key.description(), "serving fresh cached page");
        return Ok(CachedPage::from_cache(stored.page, stored.cached_at, false));
      }

      // Cache is stale, try to fetch from network
      match fetcher().await {
        Ok(incoming) => {
          let merged = merge(Some(stored.page), Some(incoming), policy.concatenate);
          self.store.put_page(&hash, &merged)?;
          Ok(CachedPage::from_network(merged))
        }
        Err(_) => {
          // Network failed, return stale cache (offline mode)
          debug!(query = %key.description(), "network failed, serving stale page");
          Ok(CachedPage::offline(stored.page, stored.cached_at))
        }
      }
    } else {
      // No cache, must fetch from network
      let incoming = fetcher().await?;
      let merged = merge(None, Some(incoming), policy.concatenate);
      self.store.put_page(&hash, &merged)?;
      Ok(CachedPage::from_network(merged))
    }
  }

  /// Fetch the next page of a list ("load more").
  ///
  /// Always goes to the network. The fetcher receives the cached frontier
  /// cursor (`None` when nothing is cached yet or the cache is at the start
  /// of the list); its result is merged under the query's policy, so
  /// concatenate queries append and the rest replace.
  pub async fn fetch_more<T, F, Fut>(&self, key: &ListQueryKey, fetcher: F) -> Result<CachedPage<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<String>) -> Fut,
    Fut: Future<Output = Result<PageResult<T>>>,
  {
    let (policy, hash) = self.resolve(key);
    let existing = self.store.get_page::<T>(&hash)?.map(|s| s.page);

    let cursor = existing
      .as_ref()
      .and_then(|page| page.page_info.cursor.clone())
      .filter(|c| !c.is_empty());

    let incoming = fetcher(cursor).await?;
    let merged = merge(existing, Some(incoming), policy.concatenate);
    self.store.put_page(&hash, &merged)?;

    Ok(CachedPage::from_network(merged))
  }
}

impl<S: PageStore> Clone for PageCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      policies: self.policies.clone(),
      stale_time: self.stale_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStore;
  use crate::policy::QueryPolicy;
  use color_eyre::eyre::eyre;

  fn cache() -> PageCache<MemoryStore> {
    let policies = PolicySet::new()
      .with_query("board_tasks", QueryPolicy::concatenating(&["board_id"]))
      .with_query("boards", QueryPolicy::replacing(&["client_id"]));
    PageCache::new(MemoryStore::new(), policies)
  }

  fn page(nodes: &[&str], cursor: &str) -> PageResult<String> {
    PageResult::new(nodes.iter().map(|s| s.to_string()).collect(), cursor, true)
  }

  #[test]
  fn write_then_get_serves_the_merged_page() {
    let cache = cache();
    let key = ListQueryKey::new("boards").with_arg("client_id", 3);

    cache.write(&key, Some(page(&["a", "b"], "x"))).unwrap();
    let served = cache.get::<String>(&key).unwrap().unwrap();
    assert_eq!(served.page.nodes, vec!["a", "b"]);
    assert_eq!(served.source, CacheSource::CacheFresh);
  }

  #[test]
  fn partitioned_keys_cache_independently() {
    let cache = cache();
    let board7 = ListQueryKey::new("board_tasks").with_arg("board_id", 7);
    let board8 = ListQueryKey::new("board_tasks").with_arg("board_id", 8);

    cache.write(&board7, Some(page(&["t1"], "p1"))).unwrap();
    cache.write(&board8, Some(page(&["t9"], "p1"))).unwrap();

    assert_eq!(
      cache.get::<String>(&board7).unwrap().unwrap().page.nodes,
      vec!["t1"]
    );
    assert_eq!(
      cache.get::<String>(&board8).unwrap().unwrap().page.nodes,
      vec!["t9"]
    );
  }

  #[test]
  fn non_partition_arguments_share_an_entry() {
    let cache = cache();
    // page_size is not in board_tasks' partition list
    let a = ListQueryKey::new("board_tasks")
      .with_arg("board_id", 7)
      .with_arg("page_size", 25);
    let b = ListQueryKey::new("board_tasks")
      .with_arg("board_id", 7)
      .with_arg("page_size", 50);

    cache.write(&a, Some(page(&["t1"], "p1"))).unwrap();
    let served = cache.get::<String>(&b).unwrap().unwrap();
    assert_eq!(served.page.nodes, vec!["t1"]);
  }

  #[test]
  fn concatenate_query_appends_across_writes() {
    let cache = cache();
    let key = ListQueryKey::new("board_tasks").with_arg("board_id", 7);

    cache.write(&key, Some(page(&["t1", "t2"], "p1"))).unwrap();
    let merged = cache.write(&key, Some(page(&["t3"], "p2"))).unwrap();
    assert_eq!(merged.nodes, vec!["t1", "t2", "t3"]);

    // A fresh first page resets the list
    let merged = cache.write(&key, Some(page(&["t1"], ""))).unwrap();
    assert_eq!(merged.nodes, vec!["t1"]);
  }

  #[test]
  fn evict_drops_a_single_entry() {
    let cache = cache();
    let board7 = ListQueryKey::new("board_tasks").with_arg("board_id", 7);
    let board8 = ListQueryKey::new("board_tasks").with_arg("board_id", 8);

    cache.write(&board7, Some(page(&["t1"], "p1"))).unwrap();
    cache.write(&board8, Some(page(&["t9"], "p1"))).unwrap();

    cache.evict(&board7).unwrap();
    assert!(cache.get::<String>(&board7).unwrap().is_none());
    assert!(cache.get::<String>(&board8).unwrap().is_some());

    cache.evict_all().unwrap();
    assert!(cache.get::<String>(&board8).unwrap().is_none());
  }

  #[tokio::test]
  async fn fetch_page_serves_fresh_cache_without_fetching() {
    let cache = cache();
    let key = ListQueryKey::new("boards").with_arg("client_id", 3);
    cache.write(&key, Some(page(&["a"], "x"))).unwrap();

    let served = cache
      .fetch_page::<String, _, _>(&key, || async {
        Err(eyre!("fetcher should not have been called"))
      })
      .await
      .unwrap();

    assert_eq!(served.source, CacheSource::CacheFresh);
    assert_eq!(served.page.nodes, vec!["a"]);
  }

  #[tokio::test]
  async fn fetch_page_falls_back_to_stale_cache_when_offline() {
    let cache = cache().with_stale_time(Duration::zero());
    let key = ListQueryKey::new("boards").with_arg("client_id", 3);
    cache.write(&key, Some(page(&["a"], "x"))).unwrap();

    let served = cache
      .fetch_page::<String, _, _>(&key, || async { Err(eyre!("network down")) })
      .await
      .unwrap();

    assert_eq!(served.source, CacheSource::Offline);
    assert_eq!(served.page.nodes, vec!["a"]);
  }

  #[tokio::test]
  async fn fetch_page_populates_an_empty_cache() {
    let cache = cache();
    let key = ListQueryKey::new("boards").with_arg("client_id", 3);

    let served = cache
      .fetch_page(&key, || async { Ok(page(&["a", "b"], "x")) })
      .await
      .unwrap();

    assert_eq!(served.source, CacheSource::Network);
    assert_eq!(served.page.nodes, vec!["a", "b"]);
    assert!(cache.get::<String>(&key).unwrap().is_some());
  }

  #[tokio::test]
  async fn fetch_more_hands_the_frontier_cursor_to_the_fetcher() {
    let cache = cache();
    let key = ListQueryKey::new("board_tasks").with_arg("board_id", 7);
    cache.write(&key, Some(page(&["t1"], "p1"))).unwrap();

    let served = cache
      .fetch_more(&key, |cursor| async move {
        assert_eq!(cursor.as_deref(), Some("p1"));
        Ok(page(&["t2"], "p2"))
      })
      .await
      .unwrap();

    assert_eq!(served.page.nodes, vec!["t1", "t2"]);
    assert_eq!(served.page.page_info.cursor.as_deref(), Some("p2"));
  }

  #[tokio::test]
  async fn fetch_more_on_an_empty_cache_starts_from_the_beginning() {
    let cache = cache();
    let key = ListQueryKey::new("board_tasks").with_arg("board_id", 7);

    let served = cache
      .fetch_more(&key, |cursor| async move {
        assert!(cursor.is_none());
        Ok(page(&["t1"], "p1"))
      })
      .await
      .unwrap();

    assert_eq!(served.page.nodes, vec!["t1"]);
  }
}

//! Poll-based page queries for event-loop callers.
//!
//! A `PageQuery` owns the in-flight fetch for one list query. The fetch runs
//! on a background task; `poll()` picks up its completion and folds the
//! result into the cache through the query's merge policy, so the state
//! always holds the canonical merged page. Multiple in-flight fetches for
//! the same query can complete out of order; the merge policy's cursor-based
//! duplicate suppression is the only guard, and a stale continuation with a
//! different cursor will still merge when it arrives.
//!
//! # Example
//!
//! ```ignore
//! let mut query = PageQuery::new(cache.clone(), key, move |cursor| {
//!   let api = api.clone();
//!   async move { api.board_tasks(cursor).await.map_err(|e| e.to_string()) }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!   // State changed, trigger re-render
//! }
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::cache::{PageCache, PageStore};
use crate::key::ListQueryKey;
use crate::page::PageResult;

/// The state of a page query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed; holds the canonical merged page
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that resolves to a fetched page
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<PageResult<T>, String>> + Send>>;

/// Factory producing fetch futures. Receives the continuation cursor, or
/// `None` for a fresh load from the start of the list.
type FetcherFn<T> = Box<dyn Fn(Option<String>) -> BoxFuture<T> + Send + Sync>;

/// In-flight fetch handle for one list query, merging completions into the
/// cache.
pub struct PageQuery<T, S: PageStore> {
  cache: PageCache<S>,
  key: ListQueryKey,
  state: QueryState<PageResult<T>>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<PageResult<T>, String>>>,
}

impl<T, S> PageQuery<T, S>
where
  T: Serialize + DeserializeOwned + Send + 'static,
  S: PageStore,
{
  /// Create a query over a cache and key with the given fetcher.
  ///
  /// If the cache already holds a page for this key, the query starts in
  /// `Success` with it, so callers have data to show before the first fetch
  /// lands.
  pub fn new<F, Fut>(cache: PageCache<S>, key: ListQueryKey, fetcher: F) -> Self
  where
    F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageResult<T>, String>> + Send + 'static,
  {
    let state = match cache.get::<T>(&key) {
      Ok(Some(cached)) => QueryState::Success(cached.page),
      _ => QueryState::Idle,
    };

    Self {
      cache,
      key,
      state,
      fetcher: Box::new(move |cursor| Box::pin(fetcher(cursor))),
      receiver: None,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<PageResult<T>> {
    &self.state
  }

  /// Get the merged page if the query has one.
  pub fn data(&self) -> Option<&PageResult<T>> {
    self.state.data()
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start a fresh load if not already loading.
  pub fn fetch(&mut self) {
    if self.is_loading() {
      return;
    }
    self.start(None);
  }

  /// Force a refetch from the start of the list, even if already loading.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start(None);
  }

  /// Fetch the next page from the cached frontier cursor.
  pub fn fetch_more(&mut self) {
    if self.is_loading() {
      return;
    }
    let cursor = self
      .cache
      .get::<T>(&self.key)
      .ok()
      .flatten()
      .and_then(|cached| cached.page.page_info.cursor)
      .filter(|c| !c.is_empty());
    self.start(cursor);
  }

  /// Poll for a completed fetch.
  ///
  /// Returns `true` if the state changed. A completed fetch is merged into
  /// the cache first; the new state holds the canonical result of that
  /// merge, not the raw response.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(incoming)) => {
        self.receiver = None;
        self.state = match self.cache.write(&self.key, Some(incoming)) {
          Ok(merged) => QueryState::Success(merged),
          Err(e) => QueryState::Error(e.to_string()),
        };
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Fetch was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start(&mut self, cursor: Option<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)(cursor);
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T, S> std::fmt::Debug for PageQuery<T, S>
where
  T: std::fmt::Debug,
  S: PageStore,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PageQuery")
      .field("key", &self.key)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

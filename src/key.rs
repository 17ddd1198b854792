//! Cache keys for list queries.
//!
//! A key names the logical query plus the arguments that partition its cache
//! (e.g. task lists per board, board lists per client). Which arguments count
//! is decided by the query's policy at cache setup, not by call sites: callers
//! supply every argument they have, and the cache keeps only the configured
//! ones before hashing.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Key for a logical list query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQueryKey {
  query: String,
  args: BTreeMap<String, String>,
}

impl ListQueryKey {
  /// Key for a query with no arguments.
  pub fn new(query: &str) -> Self {
    Self {
      query: query.to_string(),
      args: BTreeMap::new(),
    }
  }

  /// Add an argument. Values are normalized (trimmed) before hashing.
  pub fn with_arg(mut self, name: &str, value: impl ToString) -> Self {
    self.args.insert(name.to_string(), value.to_string());
    self
  }

  /// Query name, used to look up the query's policy.
  pub fn query(&self) -> &str {
    &self.query
  }

  /// Keep only the arguments named by the query's partition list. Arguments
  /// outside it do not partition the cache.
  pub fn partitioned(&self, partition_by: &[String]) -> Self {
    if partition_by.is_empty() {
      return self.clone();
    }
    Self {
      query: self.query.clone(),
      args: self
        .args
        .iter()
        .filter(|(name, _)| partition_by.iter().any(|p| p == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect(),
    }
  }

  /// Stable, fixed-length key for storage lookups.
  pub fn cache_hash(&self) -> String {
    let mut input = self.query.trim().to_string();
    for (name, value) in &self.args {
      // BTreeMap iteration gives a stable argument order.
      let _ = write!(input, ":{}={}", name.trim(), value.trim());
    }

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for logs.
  pub fn description(&self) -> String {
    if self.args.is_empty() {
      return self.query.clone();
    }
    let args = self
      .args
      .iter()
      .map(|(name, value)| format!("{}={}", name, value))
      .collect::<Vec<_>>()
      .join(", ");
    format!("{} ({})", self.query, args)
  }
}

//! Per-query merge and partition configuration.
//!
//! Resolved once when the cache is constructed - call sites never decide
//! merge behavior. Policies can be built in code or loaded from a YAML file:
//!
//! ```yaml
//! queries:
//!   board_tasks:
//!     concatenate: true
//!     partition_by: [board_id]
//!   boards:
//!     partition_by: [client_id]
//! ```

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Merge and partition settings for one logical query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPolicy {
  /// Append continuation pages to the cached nodes (infinite scroll).
  /// Off by default: each fetch replaces the node list.
  #[serde(default)]
  pub concatenate: bool,
  /// Argument names that partition this query's cache.
  #[serde(default)]
  pub partition_by: Vec<String>,
}

impl QueryPolicy {
  /// Append mode, partitioned by the given argument names.
  pub fn concatenating(partition_by: &[&str]) -> Self {
    Self {
      concatenate: true,
      partition_by: partition_by.iter().map(|s| s.to_string()).collect(),
    }
  }

  /// Replace mode, partitioned by the given argument names.
  pub fn replacing(partition_by: &[&str]) -> Self {
    Self {
      concatenate: false,
      partition_by: partition_by.iter().map(|s| s.to_string()).collect(),
    }
  }
}

/// Policies for every configured query. Unconfigured queries get the
/// default: replace mode, no partition arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicySet {
  #[serde(default)]
  queries: BTreeMap<String, QueryPolicy>,
}

impl PolicySet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add or replace the policy for a query.
  pub fn with_query(mut self, query: &str, policy: QueryPolicy) -> Self {
    self.queries.insert(query.to_string(), policy);
    self
  }

  /// Resolve the policy for a query name.
  pub fn policy(&self, query: &str) -> QueryPolicy {
    self.queries.get(query).cloned().unwrap_or_default()
  }

  /// Load policies from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./boardcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/boardcache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Policy file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      // No file means no configured queries; defaults apply everywhere.
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("boardcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("boardcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read policy file {}: {}", path.display(), e))?;

    let policies: PolicySet = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse policy file {}: {}", path.display(), e))?;

    Ok(policies)
  }
}

//! Page result types for cursor-paginated list queries.
//!
//! A `PageResult` is the unit the cache stores: the nodes loaded so far for
//! one logical list query, plus the pagination frontier. Node content is
//! opaque to the cache (tasks, boards, comments - whatever the query returns).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auxiliary summary values attached to a list query (e.g. per-status counts).
/// Orthogonal to pagination; carried alongside the nodes.
pub type Statistics = BTreeMap<String, serde_json::Value>;

/// Pagination state of a list query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
  /// Opaque token marking the last-seen position. Absent or empty means
  /// "start of list" (first page or full refetch), never a continuation.
  #[serde(default)]
  pub cursor: Option<String>,
  /// Whether more records exist after this page.
  #[serde(default)]
  pub has_next_page: bool,
  /// Total record count across all pages, when the server reports one.
  #[serde(default)]
  pub total_count: Option<i64>,
}

impl PageInfo {
  /// Whether this page info marks the start of the list.
  pub fn is_first_page(&self) -> bool {
    self.cursor.as_deref().unwrap_or("").is_empty()
  }

  /// Cursor equality, with absent and empty treated as the same position.
  pub fn same_cursor(&self, other: &PageInfo) -> bool {
    self.cursor.as_deref().unwrap_or("") == other.cursor.as_deref().unwrap_or("")
  }
}

/// Result of a list query: nodes in server order plus page info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
  /// Records in server-determined order. The cache never reorders these.
  // `default = "Vec::new"` instead of bare `default` so the derived
  // Deserialize impl doesn't pick up a spurious `T: Default` bound.
  #[serde(default = "Vec::new")]
  pub nodes: Vec<T>,
  #[serde(default)]
  pub page_info: PageInfo,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub statistics: Option<Statistics>,
}

impl<T> Default for PageResult<T> {
  fn default() -> Self {
    Self {
      nodes: Vec::new(),
      page_info: PageInfo::default(),
      statistics: None,
    }
  }
}

impl<T> PageResult<T> {
  /// An empty first-page result: no nodes, cursor at start of list.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Build a result from nodes and a cursor, for callers assembling
  /// responses by hand (tests, fixtures).
  pub fn new(nodes: Vec<T>, cursor: impl Into<String>, has_next_page: bool) -> Self {
    let cursor: String = cursor.into();
    Self {
      nodes,
      page_info: PageInfo {
        cursor: if cursor.is_empty() { None } else { Some(cursor) },
        has_next_page,
        total_count: None,
      },
      statistics: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_and_absent_cursor_are_the_same_position() {
    let absent = PageInfo::default();
    let empty = PageInfo {
      cursor: Some(String::new()),
      ..Default::default()
    };
    let real = PageInfo {
      cursor: Some("p1".to_string()),
      ..Default::default()
    };

    assert!(absent.is_first_page());
    assert!(empty.is_first_page());
    assert!(!real.is_first_page());
    assert!(absent.same_cursor(&empty));
    assert!(!absent.same_cursor(&real));
  }

  #[test]
  fn deserializes_partial_json() {
    // Responses may omit any of the optional fields; defaults apply.
    let page: PageResult<String> = serde_json::from_str(r#"{"nodes": ["a"]}"#).unwrap();
    assert_eq!(page.nodes, vec!["a".to_string()]);
    assert!(page.page_info.is_first_page());
    assert_eq!(page.page_info.total_count, None);
    assert!(page.statistics.is_none());
  }

  #[test]
  fn uses_wire_field_names() {
    let page = PageResult::new(vec![1, 2], "p1", true);
    let json = serde_json::to_value(&page).unwrap();
    assert!(json.get("pageInfo").is_some());
    assert_eq!(json["pageInfo"]["hasNextPage"], serde_json::json!(true));
  }
}

//! Merge policy for paginated list results.
//!
//! Reconciles an existing cached [`PageResult`] with an incoming fetch result
//! for the same logical query. Pure and total: absent inputs default to an
//! empty page and nothing here fails or panics - this runs on every fetch
//! completion, where a fault would take the caller's UI down with it.
//!
//! Two modes, chosen per query at cache setup (see [`crate::policy`]):
//! - replace (default): each fetch is a full replacement, used for
//!   filter/sort-driven list views
//! - concatenate: continuation fetches append, used for infinite scroll

use crate::page::{PageInfo, PageResult};

/// Merge `incoming` into `existing`, producing the new canonical cached value.
///
/// Rules, in order:
/// 1. Absent `incoming` is a no-op fetch: the existing value (or an empty
///    page) is returned unchanged.
/// 2. Absent `existing` starts from an empty page; the incoming result is
///    taken as-is.
/// 3. Equal cursors (absent and empty are the same position) mean a
///    redelivery of a page already held: existing is returned unchanged.
/// 4. Replace mode swaps the node list wholesale; page info is merged field
///    by field with incoming winning, except a `total_count` incoming omits
///    keeps the cached one.
/// 5. Concatenate mode appends nodes when both sides carry a real cursor.
///    If either side is at the start of the list, the incoming result
///    replaces outright (first page or explicit refetch). A first-page
///    result landing after later pages were appended also takes this path
///    and drops the appended nodes; callers racing a refetch against a
///    load-more get best-effort ordering, nothing stronger.
///
/// Nodes are never reordered and never de-duplicated; an overlapping page
/// redelivered by the server shows up twice.
pub fn merge<T>(
  existing: Option<PageResult<T>>,
  incoming: Option<PageResult<T>>,
  concatenate: bool,
) -> PageResult<T> {
  let incoming = match incoming {
    Some(inc) => inc,
    None => return existing.unwrap_or_default(),
  };

  let existing = match existing {
    Some(ex) => ex,
    None => return incoming,
  };

  if existing.page_info.same_cursor(&incoming.page_info) {
    return existing;
  }

  if !concatenate {
    return PageResult {
      nodes: incoming.nodes,
      page_info: PageInfo {
        cursor: incoming.page_info.cursor,
        has_next_page: incoming.page_info.has_next_page,
        total_count: incoming
          .page_info
          .total_count
          .or(existing.page_info.total_count),
      },
      statistics: incoming.statistics.or(existing.statistics),
    };
  }

  if incoming.page_info.is_first_page() || existing.page_info.is_first_page() {
    // Fresh load: replace, don't append.
    return PageResult {
      nodes: incoming.nodes,
      page_info: incoming.page_info,
      statistics: incoming.statistics.or(existing.statistics),
    };
  }

  // Genuine continuation: append in arrival order. The incoming page info
  // supersedes entirely - it is the new frontier.
  let mut nodes = existing.nodes;
  nodes.extend(incoming.nodes);
  PageResult {
    nodes,
    page_info: incoming.page_info,
    statistics: incoming.statistics.or(existing.statistics),
  }
}

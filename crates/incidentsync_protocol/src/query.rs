//! The forward query sent to the incident source.

use crate::incident::IncidentStatus;

/// Sort directive: ascending by creation time.
pub const SORT_BY_START_TIME: &str = "+start_time";

/// An inclusive, zero-based item range for the source's pagination header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRange {
    /// First item index.
    pub first: u32,
    /// Last item index (inclusive).
    pub last: u32,
}

impl ItemRange {
    /// The first page holding exactly one item.
    pub const fn single() -> Self {
        Self { first: 0, last: 0 }
    }

    /// Number of items the range asks for.
    pub fn item_count(&self) -> usize {
        self.last.saturating_sub(self.first) as usize + 1
    }

    /// Renders the `Range` header value, e.g. `items=0-0`.
    pub fn header_value(&self) -> String {
        format!("items={}-{}", self.first, self.last)
    }
}

/// Query for incidents newer than the cursor.
///
/// # Invariants
///
/// - Only incidents with `id > after_id` match
/// - Results are sorted ascending by creation time
/// - The forward loop always uses [`ItemRange::single`], so at most one
///   incident is processed per cycle and a sink outage can never cause
///   out-of-order processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentQuery {
    /// Exclusive lower bound on the incident id.
    pub after_id: u64,
    /// Required status.
    pub status: IncidentStatus,
    /// Pagination.
    pub range: ItemRange,
}

impl IncidentQuery {
    /// The forward-loop query: the earliest open incident after `cursor`.
    pub fn open_after(cursor: u64) -> Self {
        Self {
            after_id: cursor,
            status: IncidentStatus::Open,
            range: ItemRange::single(),
        }
    }

    /// Renders the source filter expression.
    pub fn filter(&self) -> String {
        format!("status={} and id > {}", self.status, self.after_id)
    }

    /// Returns the sort directive.
    pub fn sort(&self) -> &'static str {
        SORT_BY_START_TIME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_query_shape() {
        let query = IncidentQuery::open_after(9);
        assert_eq!(query.filter(), "status=OPEN and id > 9");
        assert_eq!(query.sort(), "+start_time");
        assert_eq!(query.range.header_value(), "items=0-0");
        assert_eq!(query.range.item_count(), 1);
    }

    #[test]
    fn range_item_count() {
        let range = ItemRange { first: 0, last: 49 };
        assert_eq!(range.item_count(), 50);
        assert_eq!(range.header_value(), "items=0-49");
        assert_eq!(ItemRange { first: 5, last: 5 }.item_count(), 1);
    }
}

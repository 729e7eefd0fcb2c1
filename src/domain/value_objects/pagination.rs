//! Offset pagination for collection queries.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Limit/offset window applied by repository `list` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    /// Build a window, clamping `limit` into `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Slice a full, already ordered collection down to this window.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let page = Pagination::default();
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
        assert_eq!(Pagination::new(Some(1000), None).limit, MAX_LIMIT);
    }

    #[test]
    fn apply_windows_items() {
        let items: Vec<u32> = (0..20).collect();
        let page = Pagination::new(Some(5), Some(10));
        assert_eq!(page.apply(&items), vec![10, 11, 12, 13, 14]);
    }
}

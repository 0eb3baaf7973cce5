//! View-time helpers over the album forest.
//!
//! Traversal that needs locking (cycle checks, subtree collection) lives in
//! the repository layer, where it walks with an explicit frontier of ids so
//! only the affected rows are ever touched. What remains here is the pure
//! transform listings apply per viewer.

use std::collections::HashSet;

/// Rewrite stored parents into the parents one viewer actually sees: an album
/// whose parent falls outside `visible` is shown as a top-level entry.
///
/// This is a view-time transform only. Stored parents are never touched, so a
/// member gaining access to the parent later sees the original nesting.
pub fn effective_parent(visible: &HashSet<i64>, parent_id: Option<i64>) -> Option<i64> {
    parent_id.filter(|p| visible.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_parent_hides_invisible_ancestors() {
        let visible = HashSet::from([2, 3]);
        // Parent 1 is not visible: the album surfaces at top level.
        assert_eq!(effective_parent(&visible, Some(1)), None);
        assert_eq!(effective_parent(&visible, Some(2)), Some(2));
        assert_eq!(effective_parent(&visible, None), None);
    }

    #[test]
    fn test_effective_parent_keeps_visible_chain() {
        let visible = HashSet::from([1, 2, 3]);
        assert_eq!(effective_parent(&visible, Some(3)), Some(3));
    }
}

//! Slide-selection decision against a user-supplied deletion filter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The ordered list of tags the user asked to delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionFilter {
    /// Filter entries in the order the user supplied them. Not
    /// deduplicated; each entry is tried once.
    pub tags: Vec<String>,
}

impl DeletionFilter {
    /// Parse a comma-separated argument into a filter.
    ///
    /// Matches the reference semantics of splitting the raw argument:
    /// an empty string yields a single empty-string entry, not an empty
    /// filter.
    pub fn from_arg(arg: &str) -> Self {
        Self {
            tags: arg.split(',').map(str::to_string).collect(),
        }
    }
}

/// Decide whether a slide should be deleted.
///
/// A slide is deleted only when it has at least one tag and *every* tag
/// on it appears in the filter. This is a subset-covering test, not an
/// any-intersection test: a slide tagged `{A, B}` survives a filter of
/// just `["A"]`. Extra filter entries that match nothing on the slide
/// are harmless. A slide with no tags is never auto-deleted.
pub fn should_delete_slide(slide_tags: &BTreeSet<String>, filter: &[String]) -> bool {
    if slide_tags.is_empty() {
        return false;
    }

    let mut remaining = slide_tags.clone();
    for tag in filter {
        remaining.remove(tag.as_str());
    }
    remaining.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn filter(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_tag_set_never_deleted() {
        assert!(!should_delete_slide(&set(&[]), &filter(&["draft"])));
        assert!(!should_delete_slide(&set(&[]), &filter(&[""])));
        assert!(!should_delete_slide(&set(&[]), &[]));
    }

    #[test]
    fn test_fully_covered_deleted() {
        assert!(should_delete_slide(
            &set(&["draft", "internal"]),
            &filter(&["draft", "internal", "extra"])
        ));
    }

    #[test]
    fn test_partially_covered_kept() {
        assert!(!should_delete_slide(
            &set(&["draft", "internal"]),
            &filter(&["draft"])
        ));
    }

    #[test]
    fn test_single_tag_exact_match() {
        assert!(should_delete_slide(&set(&["draft"]), &filter(&["draft"])));
        assert!(!should_delete_slide(&set(&["draft"]), &filter(&["final"])));
    }

    #[test]
    fn test_filter_order_irrelevant() {
        assert!(should_delete_slide(
            &set(&["a", "b"]),
            &filter(&["b", "a"])
        ));
    }

    #[test]
    fn test_deleted_implies_covered() {
        let tags = set(&["x", "y"]);
        let f = filter(&["y", "z", "x"]);
        if should_delete_slide(&tags, &f) {
            for tag in &tags {
                assert!(f.contains(tag));
            }
        }
    }

    #[test]
    fn test_from_arg_splits_on_commas() {
        assert_eq!(
            DeletionFilter::from_arg("draft,internal").tags,
            vec!["draft", "internal"]
        );
    }

    #[test]
    fn test_from_arg_empty_yields_one_empty_entry() {
        assert_eq!(DeletionFilter::from_arg("").tags, vec![""]);
    }

    #[test]
    fn test_empty_filter_entry_does_not_delete_tagged_slides() {
        let f = DeletionFilter::from_arg("");
        assert!(!should_delete_slide(&set(&["draft"]), &f.tags));
    }
}

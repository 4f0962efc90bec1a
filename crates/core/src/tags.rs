//! Tag annotation parsing for speaker notes.
//!
//! Slide authors embed JSON objects like `{"tags": ["draft", "internal"]}`
//! anywhere in a slide's notes text. This module finds those blocks,
//! extracts the tag set, and strips the blocks back out of the text.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeSet;

/// Find every maximal balanced-brace substring in `text`, in order of
/// appearance.
///
/// This is a plain bracket-counting scan: nesting depth goes up on `{`
/// and down on `}`, and a block is emitted each time the depth returns
/// to zero. Nested braces stay inside their enclosing block. Unmatched
/// braces yield nothing. No JSON validity check happens here.
pub fn find_annotation_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        blocks.push(&text[start..i + c.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Extract the deduplicated tag set from all annotation blocks in `text`.
///
/// Blocks that are not valid JSON are skipped silently; not every
/// brace-balanced region of prose is an annotation. A block that *is*
/// valid JSON but has no `tags` key is an authoring mistake and fails
/// the whole extraction. The `tags` value may be a single string or an
/// array of strings.
pub fn extract_tags(text: &str) -> Result<BTreeSet<String>> {
    let mut tags = BTreeSet::new();

    for block in find_annotation_blocks(text) {
        let value: Value = match serde_json::from_str(block) {
            Ok(v) => v,
            Err(_) => {
                log::debug!("Skipping non-JSON brace block: {}", block);
                continue;
            }
        };

        let tag_value = value.get("tags").ok_or_else(|| Error::MissingTags {
            block: block.to_string(),
        })?;

        match tag_value {
            Value::String(s) => {
                tags.insert(s.clone());
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => {
                            tags.insert(s.clone());
                        }
                        _ => {
                            return Err(Error::InvalidTags {
                                block: block.to_string(),
                            })
                        }
                    }
                }
            }
            _ => {
                return Err(Error::InvalidTags {
                    block: block.to_string(),
                })
            }
        }
    }

    Ok(tags)
}

/// Return `text` with every detected annotation block removed.
///
/// Removal is exact substring removal; the surrounding text and its
/// whitespace are left as they are.
pub fn strip_annotations(text: &str) -> String {
    let mut result = text.to_string();
    for block in find_annotation_blocks(text) {
        result = result.replace(block, "");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_blocks_none() {
        assert!(find_annotation_blocks("no braces here").is_empty());
        assert!(find_annotation_blocks("").is_empty());
    }

    #[test]
    fn test_find_blocks_simple() {
        let blocks = find_annotation_blocks("before {\"tags\": \"a\"} after");
        assert_eq!(blocks, vec!["{\"tags\": \"a\"}"]);
    }

    #[test]
    fn test_find_blocks_nested() {
        let blocks = find_annotation_blocks("x {\"a\": {\"b\": 1}} y");
        assert_eq!(blocks, vec!["{\"a\": {\"b\": 1}}"]);
    }

    #[test]
    fn test_find_blocks_multiple_in_order() {
        let blocks = find_annotation_blocks("{\"a\":1} mid {\"b\":2}");
        assert_eq!(blocks, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_find_blocks_unmatched_braces() {
        assert!(find_annotation_blocks("open { only").is_empty());
        assert!(find_annotation_blocks("close } only").is_empty());
        // A stray close before a balanced pair does not break the scan
        assert_eq!(find_annotation_blocks("} {\"x\":1}"), vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_extract_tags_list() {
        let tags =
            extract_tags("Note text {\"tags\": [\"draft\",\"internal\"]} more text").unwrap();
        assert_eq!(tags, set(&["draft", "internal"]));
    }

    #[test]
    fn test_extract_tags_single_string() {
        let tags = extract_tags("{\"tags\": \"solo\"}").unwrap();
        assert_eq!(tags, set(&["solo"]));
    }

    #[test]
    fn test_extract_tags_deduplicates_across_blocks() {
        let tags =
            extract_tags("{\"tags\": [\"a\", \"b\"]} and {\"tags\": [\"b\", \"c\"]}").unwrap();
        assert_eq!(tags, set(&["a", "b", "c"]));
    }

    #[test]
    fn test_extract_tags_skips_invalid_json() {
        // Brace-balanced prose is not an annotation
        let tags = extract_tags("set {a, b} and {\"tags\": [\"keep\"]}").unwrap();
        assert_eq!(tags, set(&["keep"]));
    }

    #[test]
    fn test_extract_tags_no_blocks() {
        assert!(extract_tags("plain speaker notes").unwrap().is_empty());
    }

    #[test]
    fn test_extract_tags_missing_key_is_error() {
        let err = extract_tags("{\"other\": 1}").unwrap_err();
        assert!(matches!(err, Error::MissingTags { .. }));
        assert!(err.to_string().contains("{\"other\": 1}"));
    }

    #[test]
    fn test_extract_tags_non_string_value_is_error() {
        assert!(matches!(
            extract_tags("{\"tags\": 7}").unwrap_err(),
            Error::InvalidTags { .. }
        ));
        assert!(matches!(
            extract_tags("{\"tags\": [\"ok\", 7]}").unwrap_err(),
            Error::InvalidTags { .. }
        ));
    }

    #[test]
    fn test_extract_tags_idempotent() {
        let text = "a {\"tags\": [\"x\"]} b {\"tags\": \"y\"} c";
        assert_eq!(extract_tags(text).unwrap(), extract_tags(text).unwrap());
    }

    #[test]
    fn test_strip_annotations() {
        let stripped = strip_annotations("keep {\"tags\": [\"a\"]} this");
        assert_eq!(stripped, "keep  this");
    }

    #[test]
    fn test_strip_annotations_no_blocks_unchanged() {
        assert_eq!(strip_annotations("untouched text"), "untouched text");
    }

    #[test]
    fn test_strip_annotations_removes_all_valid_json() {
        let text = "a {\"tags\": [\"x\"]} b {\"tags\": \"y\"} c";
        let stripped = strip_annotations(text);
        for block in find_annotation_blocks(&stripped) {
            assert!(serde_json::from_str::<Value>(block).is_err());
        }
        assert_eq!(stripped, "a  b  c");
    }
}

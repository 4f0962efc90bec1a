//! Core domain logic for slide-deck tailoring: tag annotation parsing,
//! slide-selection decisions, and logo background trimming.

pub mod error;
pub mod select;
pub mod tags;
pub mod trim;

pub use error::{Error, Result};
pub use select::{should_delete_slide, DeletionFilter};
pub use tags::{extract_tags, find_annotation_blocks, strip_annotations};
pub use trim::trim_background;

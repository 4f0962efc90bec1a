//! PPTX document layer: reading slide structure and speaker notes,
//! applying edits (slide removal, notes rewrite, logo placement), and
//! saving the modified archive.

pub mod deck;
pub mod notes;
pub mod rels;
pub mod xml;

pub use deck::{Logo, PptxDeck, Slide};
pub use rels::Relationship;

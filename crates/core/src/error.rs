//! Error types shared across the deck-tailor crates.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tailoring a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error (PPTX container).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or rewriting error (PPTX parts).
    #[error("XML error: {0}")]
    XmlError(String),

    /// A required archive part is absent.
    #[error("Missing part in archive: {0}")]
    MissingPart(String),

    /// A slide number does not exist in the deck.
    #[error("No slide number {0} in presentation")]
    SlideNotFound(usize),

    /// A valid JSON annotation block has no "tags" key.
    #[error("Annotation block has no \"tags\" key: {block}")]
    MissingTags { block: String },

    /// The "tags" value is neither a string nor an array of strings.
    #[error("Annotation block has an unusable \"tags\" value: {block}")]
    InvalidTags { block: String },
}

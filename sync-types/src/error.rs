//! Error types for the offline data model.

use thiserror::Error;

use crate::ContentType;

/// Errors raised while interpreting content or catalog data.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Content type name is not one of course, lesson, lab or assessment.
    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    /// Server JSON did not match the expected shape for its content type.
    #[error("invalid {content_type} content: {source}")]
    InvalidContent {
        /// The content type the JSON was decoded as.
        content_type: ContentType,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Encoding a record back to JSON failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

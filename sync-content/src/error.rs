//! Error types for sync-content.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in local storage and blob transfer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Blob not found in store.
    #[error("blob not found: {name}")]
    NotFound {
        /// Name of the missing blob.
        name: String,
    },

    /// Blob name cannot be used as a storage key.
    #[error("invalid blob name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded.
    #[error("corrupt value under key {key}: {source}")]
    Corrupt {
        /// Storage key holding the value.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote blob transfer failed.
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// Source URL.
        url: String,
        /// Failure description.
        reason: String,
    },

    /// Store backend reported a failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = StoreError::Fetch {
            url: "https://cdn/x.mp4".into(),
            reason: "HTTP 404".into(),
        };
        assert_eq!(err.to_string(), "fetch failed for https://cdn/x.mp4: HTTP 404");

        let err = StoreError::InvalidName {
            name: "../etc".into(),
        };
        assert!(err.to_string().contains("\"../etc\""));
    }
}

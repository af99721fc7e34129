//! Client errors.
//!
//! Used inside the client; public operations convert them into reports.

use sync_content::StoreError;
use sync_core::QueueError;
use sync_types::{ContentType, ModelError};
use thiserror::Error;

use crate::api::ApiError;

/// Errors inside offline operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Item is not in the offline catalog.
    #[error("Content not found")]
    NotFound {
        /// Requested type.
        content_type: ContentType,
        /// Requested id.
        content_id: String,
    },

    /// Offline downloads are switched off in settings.
    #[error("Offline mode is disabled")]
    OfflineModeDisabled,

    /// Content record could not be decoded.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Local storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Remote collaborator failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Download queue rejected the request.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

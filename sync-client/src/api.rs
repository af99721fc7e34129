//! Remote collaborators the offline layer depends on.
//!
//! The content API, the connectivity probe and the progress server are
//! implemented elsewhere (an HTTP backend, a platform network monitor). The
//! traits here are the seams; [`crate::mock`] provides test doubles.

use async_trait::async_trait;
use serde_json::Value;
use sync_types::{ContentType, ProgressMap};
use thiserror::Error;

/// Errors reported by remote collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or completed.
    #[error("request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status.
    #[error("HTTP error: {0}")]
    Status(u16),

    /// The requested item does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server answered with something we cannot use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Source of full content records.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch the full nested record of one item
    /// (modules → lessons → sections for courses).
    async fn fetch_detail(&self, content_type: ContentType, id: &str) -> Result<Value, ApiError>;
}

/// Snapshot of the device's network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityStatus {
    /// A network interface is up.
    pub is_connected: bool,
    /// The internet is reachable, when the platform can tell.
    pub is_internet_reachable: Option<bool>,
}

impl ConnectivityStatus {
    /// Connected with reachability unknown.
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: None,
        }
    }

    /// Not connected.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Connected, and not known to be unreachable.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Some(false)
    }
}

/// Network probe.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Current network state.
    async fn status(&self) -> ConnectivityStatus;
}

/// Server side of progress sync.
#[async_trait]
pub trait ProgressServer: Send + Sync {
    /// Send local progress and receive the server's current map.
    async fn exchange(&self, local: &ProgressMap) -> Result<ProgressMap, ApiError>;

    /// Store the resolved map as the server's source of truth.
    async fn push(&self, resolved: &ProgressMap) -> Result<(), ApiError>;
}

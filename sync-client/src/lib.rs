//! # sync-client
//!
//! Offline content downloads and progress sync for learning apps.
//!
//! This is the library applications use to take content offline and keep
//! learner progress until the device is back online.
//!
//! ## Features
//!
//! - **Content downloads**: courses with their lessons, images and videos,
//!   stored idempotently in a local blob store
//! - **Progress tracking**: offline progress merged locally, synced later
//! - **Conflict resolution**: per-attribute merge rules from sync-core
//! - **Pure State Machine**: the sync cycle is driven by sync-core events
//! - **Pluggable collaborators**: content API, connectivity and progress
//!   server are traits; reqwest implementations behind the `http` feature
//!
//! ## Example
//!
//! ```ignore
//! use offline_sync_client::{Collaborators, OfflineConfig, OfflineService};
//! use sync_types::ContentType;
//!
//! let service = OfflineService::new(collaborators, OfflineConfig::default());
//! service.init().await?;
//!
//! // Take a course and its lessons offline
//! let report = service.download(ContentType::Course, "42", true, None).await;
//!
//! // Later, back online
//! let report = service.sync_changes().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod downloader;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod logging;
pub mod mock;
pub mod orchestrator;
pub mod progress;
pub mod remover;
pub mod report;
pub mod service;

pub use api::{ApiError, Connectivity, ConnectivityStatus, ContentApi, ProgressServer};
pub use config::{ConfigError, OfflineConfig};
pub use downloader::ContentDownloader;
pub use error::ClientError;
#[cfg(feature = "http")]
pub use http::HttpCollaborator;
pub use logging::init_logging;
pub use mock::{MockConnectivity, MockContentApi, MockProgressServer};
pub use orchestrator::SyncOrchestrator;
pub use progress::ProgressTracker;
pub use remover::ContentRemover;
pub use report::{Degradation, DownloadReport, RemoveReport, StorageReport, SyncReport};
pub use service::{Collaborators, OfflineService, OfflineSettings};

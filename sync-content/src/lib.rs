//! # sync-content
//!
//! Local storage for offline learning content.
//!
//! Two stores sit under the sync layer:
//!
//! ```text
//! ContentApi ──► catalog / progress JSON ──► LocalStore ──► KeyValueStore
//! BlobSource ──► image / video bytes     ──► BlobFetcher ─► BlobStore
//! ```
//!
//! - [`KeyValueStore`] holds whole JSON documents under the well-known keys
//!   [`CATALOG_KEY`], [`PROGRESS_KEY`] and [`SETTINGS_KEY`]; [`LocalStore`]
//!   encodes and decodes them.
//! - [`BlobStore`] holds media under names from `sync_types::naming`.
//! - [`BlobFetcher`] downloads a blob only if it is not already stored.
//!
//! Memory implementations are provided for tests; [`FileKvStore`] and
//! [`FsBlobStore`] persist to a directory.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blob;
mod error;
mod fetch;
mod kv;
mod local;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::StoreError;
pub use fetch::{BlobFetcher, BlobSource, FetchOutcome, MemoryBlobSource, ProgressFn};
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use local::{LocalStore, CATALOG_KEY, PROGRESS_KEY, SETTINGS_KEY};

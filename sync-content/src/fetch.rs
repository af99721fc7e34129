//! Remote blob download into the local blob store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::blob::BlobStore;
use crate::error::StoreError;

/// Callback receiving transfer progress as a fraction in `[0, 1]`.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Trait for downloading remote blobs by URL.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Download the bytes at `url`.
    ///
    /// Implementations call `on_progress` with bytes received over the
    /// expected length as data arrives.
    async fn fetch(&self, url: &str, on_progress: &ProgressFn) -> Result<Vec<u8>, StoreError>;
}

/// In-memory blob source for testing.
///
/// Serves registered URLs, records every fetch, and can be told to fail
/// specific URLs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobSource {
    inner: Arc<Mutex<MemorySourceInner>>,
}

#[derive(Debug, Default)]
struct MemorySourceInner {
    responses: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    fetched: Vec<String>,
}

impl MemoryBlobSource {
    /// Create a new empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `url`.
    pub fn insert(&self, url: &str, data: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .insert(url.to_string(), data.into());
    }

    /// Make every fetch of `url` fail.
    pub fn fail_url(&self, url: &str) {
        self.inner.lock().unwrap().failing.insert(url.to_string());
    }

    /// Every URL fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.inner.lock().unwrap().fetched.clone()
    }

    /// How many times `url` was fetched.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .fetched
            .iter()
            .filter(|u| *u == url)
            .count()
    }
}

#[async_trait]
impl BlobSource for MemoryBlobSource {
    async fn fetch(&self, url: &str, on_progress: &ProgressFn) -> Result<Vec<u8>, StoreError> {
        let data = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetched.push(url.to_string());
            if inner.failing.contains(url) {
                return Err(StoreError::Fetch {
                    url: url.to_string(),
                    reason: "connection reset".into(),
                });
            }
            inner
                .responses
                .get(url)
                .cloned()
                .ok_or_else(|| StoreError::Fetch {
                    url: url.to_string(),
                    reason: "HTTP 404".into(),
                })?
        };

        // Two chunks, like a small streamed body.
        if data.len() > 1 {
            on_progress((data.len() / 2) as f64 / data.len() as f64);
        }
        on_progress(1.0);
        Ok(data)
    }
}

/// Outcome of [`BlobFetcher::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The blob was downloaded and stored.
    Downloaded {
        /// Bytes stored.
        bytes: u64,
    },
    /// A blob with this name was already stored; nothing was fetched.
    AlreadyPresent,
}

/// Idempotent "download unless already stored" over a source and a store.
#[derive(Clone)]
pub struct BlobFetcher {
    store: Arc<dyn BlobStore>,
    source: Arc<dyn BlobSource>,
}

impl BlobFetcher {
    /// Create a fetcher writing into `store` from `source`.
    pub fn new(store: Arc<dyn BlobStore>, source: Arc<dyn BlobSource>) -> Self {
        Self { store, source }
    }

    /// Make sure blob `name` exists, downloading it from `url` if not.
    pub async fn ensure(
        &self,
        url: &str,
        name: &str,
        on_progress: &ProgressFn,
    ) -> Result<FetchOutcome, StoreError> {
        if self.store.exists(name).await? {
            debug!(blob = name, "blob already stored, skipping download");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let data = self.source.fetch(url, on_progress).await?;
        self.store.put(name, &data).await?;
        debug!(blob = name, bytes = data.len(), "blob stored");

        Ok(FetchOutcome::Downloaded {
            bytes: data.len() as u64,
        })
    }

    /// The store blobs are written into.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;

    fn no_progress(_: f64) {}

    fn fetcher() -> (BlobFetcher, MemoryBlobStore, MemoryBlobSource) {
        let store = MemoryBlobStore::new();
        let source = MemoryBlobSource::new();
        let fetcher = BlobFetcher::new(Arc::new(store.clone()), Arc::new(source.clone()));
        (fetcher, store, source)
    }

    #[tokio::test]
    async fn ensure_downloads_once() {
        let (fetcher, store, source) = fetcher();
        source.insert("https://cdn/img.png", b"image".to_vec());

        let first = fetcher
            .ensure("https://cdn/img.png", "course_1_image", &no_progress)
            .await
            .unwrap();
        let second = fetcher
            .ensure("https://cdn/img.png", "course_1_image", &no_progress)
            .await
            .unwrap();

        assert_eq!(first, FetchOutcome::Downloaded { bytes: 5 });
        assert_eq!(second, FetchOutcome::AlreadyPresent);
        assert_eq!(source.fetch_count("https://cdn/img.png"), 1);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn ensure_reports_progress() {
        let (fetcher, _store, source) = fetcher();
        source.insert("https://cdn/v.mp4", vec![0u8; 10]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_progress = move |p: f64| sink.lock().unwrap().push(p);

        fetcher
            .ensure("https://cdn/v.mp4", "lesson_1_video_s1", &on_progress)
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![0.5, 1.0]);
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[tokio::test]
    async fn failed_fetch_stores_nothing() {
        let (fetcher, store, source) = fetcher();
        source.fail_url("https://cdn/broken");

        let result = fetcher
            .ensure("https://cdn/broken", "lab_1_image", &no_progress)
            .await;

        assert!(matches!(result, Err(StoreError::Fetch { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_url_is_an_error() {
        let (fetcher, _store, _source) = fetcher();
        let result = fetcher
            .ensure("https://cdn/nothing", "lab_2_image", &no_progress)
            .await;
        assert!(matches!(result, Err(StoreError::Fetch { ref reason, .. }) if reason == "HTTP 404"));
    }
}

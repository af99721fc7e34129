//! Mock collaborators for testing.
//!
//! Each mock shares its state between clones, so a test keeps one handle to
//! script responses and inspect calls while the code under test owns another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sync_types::{ContentType, ProgressMap};
use tokio::sync::Notify;

use crate::api::{ApiError, ContentApi, Connectivity, ConnectivityStatus, ProgressServer};

/// Mock content API serving registered detail payloads.
#[derive(Debug, Default, Clone)]
pub struct MockContentApi {
    inner: Arc<Mutex<MockContentApiInner>>,
}

#[derive(Debug, Default)]
struct MockContentApiInner {
    details: HashMap<(ContentType, String), Value>,
    failing: HashSet<(ContentType, String)>,
    calls: Vec<(ContentType, String)>,
    fail_next_fetch: Option<String>,
}

impl MockContentApi {
    /// Create a new mock with no content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `detail` for the given item.
    pub fn insert(&self, content_type: ContentType, id: &str, detail: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.details.insert((content_type, id.to_string()), detail);
    }

    /// Make every fetch of this item fail.
    pub fn fail_item(&self, content_type: ContentType, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing.insert((content_type, id.to_string()));
    }

    /// Cause the next fetch_detail() to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error.to_string());
    }

    /// Every item fetched so far, in order.
    pub fn calls(&self) -> Vec<(ContentType, String)> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// How many times this item was fetched.
    pub fn call_count(&self, content_type: ContentType, id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(ct, i)| *ct == content_type && i == id)
            .count()
    }
}

#[async_trait]
impl ContentApi for MockContentApi {
    async fn fetch_detail(&self, content_type: ContentType, id: &str) -> Result<Value, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (content_type, id.to_string());
        inner.calls.push(key.clone());

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(ApiError::Request(error));
        }
        if inner.failing.contains(&key) {
            return Err(ApiError::Status(500));
        }

        inner
            .details
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("{content_type} {id}")))
    }
}

/// Mock connectivity probe with a switchable state.
#[derive(Debug, Clone)]
pub struct MockConnectivity {
    status: Arc<Mutex<ConnectivityStatus>>,
}

impl MockConnectivity {
    /// Create a probe reporting online or offline.
    pub fn new(online: bool) -> Self {
        let status = if online {
            ConnectivityStatus::online()
        } else {
            ConnectivityStatus::offline()
        };
        Self {
            status: Arc::new(Mutex::new(status)),
        }
    }

    /// Switch between online and offline.
    pub fn set_online(&self, online: bool) {
        *self.status.lock().unwrap() = if online {
            ConnectivityStatus::online()
        } else {
            ConnectivityStatus::offline()
        };
    }

    /// Report an exact status.
    pub fn set_status(&self, status: ConnectivityStatus) {
        *self.status.lock().unwrap() = status;
    }
}

impl Default for MockConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Connectivity for MockConnectivity {
    async fn status(&self) -> ConnectivityStatus {
        *self.status.lock().unwrap()
    }
}

/// Mock progress server holding one progress map.
///
/// `exchange` returns the held map; `push` replaces it.
#[derive(Debug, Default, Clone)]
pub struct MockProgressServer {
    inner: Arc<Mutex<MockServerInner>>,
}

#[derive(Debug, Default)]
struct MockServerInner {
    progress: ProgressMap,
    exchanged: Vec<ProgressMap>,
    pushed: Vec<ProgressMap>,
    fail_next_exchange: Option<String>,
    fail_next_push: Option<String>,
    gate: Option<Arc<Notify>>,
}

impl MockProgressServer {
    /// Create a server with no progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the server's progress map.
    pub fn set_progress(&self, progress: ProgressMap) {
        self.inner.lock().unwrap().progress = progress;
    }

    /// The server's current progress map.
    pub fn progress(&self) -> ProgressMap {
        self.inner.lock().unwrap().progress.clone()
    }

    /// Local maps received by `exchange`, in order.
    pub fn exchanged(&self) -> Vec<ProgressMap> {
        self.inner.lock().unwrap().exchanged.clone()
    }

    /// Maps received by `push`, in order.
    pub fn pushed(&self) -> Vec<ProgressMap> {
        self.inner.lock().unwrap().pushed.clone()
    }

    /// Cause the next exchange() to fail with the given error.
    pub fn fail_next_exchange(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_exchange = Some(error.to_string());
    }

    /// Cause the next push() to fail with the given error.
    pub fn fail_next_push(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_push = Some(error.to_string());
    }

    /// Hold every exchange() until [`MockProgressServer::release`] is called.
    pub fn hold_exchanges(&self) {
        self.inner.lock().unwrap().gate = Some(Arc::new(Notify::new()));
    }

    /// Let one held exchange() proceed.
    pub fn release(&self) {
        if let Some(gate) = self.inner.lock().unwrap().gate.as_ref() {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl ProgressServer for MockProgressServer {
    async fn exchange(&self, local: &ProgressMap) -> Result<ProgressMap, ApiError> {
        let gate = self.inner.lock().unwrap().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.exchanged.push(local.clone());
        if let Some(error) = inner.fail_next_exchange.take() {
            return Err(ApiError::Request(error));
        }
        Ok(inner.progress.clone())
    }

    async fn push(&self, resolved: &ProgressMap) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_push.take() {
            return Err(ApiError::Request(error));
        }
        inner.pushed.push(resolved.clone());
        inner.progress = resolved.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn content_api_serves_and_counts() {
        let api = MockContentApi::new();
        api.insert(ContentType::Course, "1", json!({"id": "1"}));

        assert_eq!(
            api.fetch_detail(ContentType::Course, "1").await.unwrap(),
            json!({"id": "1"})
        );
        assert!(matches!(
            api.fetch_detail(ContentType::Lab, "1").await,
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(api.call_count(ContentType::Course, "1"), 1);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn content_api_failure_hooks() {
        let api = MockContentApi::new();
        api.insert(ContentType::Lesson, "2", json!({"id": "2"}));

        api.fail_next_fetch("timeout");
        assert!(api.fetch_detail(ContentType::Lesson, "2").await.is_err());
        assert!(api.fetch_detail(ContentType::Lesson, "2").await.is_ok());

        api.fail_item(ContentType::Lesson, "2");
        assert!(matches!(
            api.fetch_detail(ContentType::Lesson, "2").await,
            Err(ApiError::Status(500))
        ));
    }

    #[tokio::test]
    async fn connectivity_switches() {
        let probe = MockConnectivity::new(false);
        assert!(!probe.status().await.is_online());

        let handle = probe.clone();
        handle.set_online(true);
        assert!(probe.status().await.is_online());
    }

    #[tokio::test]
    async fn progress_server_push_replaces_state() {
        let server = MockProgressServer::new();
        let mut resolved = ProgressMap::new();
        resolved.insert("a_1_score", json!(3));

        assert!(server.exchange(&resolved).await.unwrap().is_empty());
        server.push(&resolved).await.unwrap();

        assert_eq!(server.progress(), resolved);
        assert_eq!(server.exchanged().len(), 1);
        assert_eq!(server.pushed(), vec![resolved]);
    }
}

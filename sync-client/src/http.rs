//! HTTP collaborators over reqwest.
//!
//! One client serves content records, media and progress sync from a single
//! base URL:
//! - `GET {base}/{collection}/{id}` for content detail
//! - `POST {base}/progress/sync` to exchange progress maps
//! - `PUT {base}/progress` to store the resolved map
//!
//! Media URLs are absolute and fetched as given.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sync_content::{BlobSource, ProgressFn, StoreError};
use sync_types::{ContentType, ProgressMap};

use crate::api::{ApiError, ContentApi, ProgressServer};
use crate::config::HttpConfig;

/// reqwest-backed [`ContentApi`], [`BlobSource`] and [`ProgressServer`].
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: Client,
    base_url: String,
}

impl HttpCollaborator {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("offline-sync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the `[http]` config section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, ApiError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::Request("no base_url configured".into()))?;
        Self::new(base_url, Duration::from_secs(config.timeout_secs))
    }

    /// The base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn detail_url(&self, content_type: ContentType, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, content_type.collection(), id)
    }

    fn exchange_url(&self) -> String {
        format!("{}/progress/sync", self.base_url)
    }

    fn push_url(&self) -> String {
        format!("{}/progress", self.base_url)
    }
}

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 8 << 20;

fn initial_capacity(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOC) as usize
}

fn request_error(e: reqwest::Error) -> ApiError {
    ApiError::Request(e.to_string())
}

fn check_status(status: StatusCode, what: &str) -> Result<(), ApiError> {
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    Ok(())
}

#[async_trait]
impl ContentApi for HttpCollaborator {
    async fn fetch_detail(&self, content_type: ContentType, id: &str) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(self.detail_url(content_type, id))
            .send()
            .await
            .map_err(request_error)?;
        check_status(response.status(), &format!("{content_type} {id}"))?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl BlobSource for HttpCollaborator {
    async fn fetch(&self, url: &str, on_progress: &ProgressFn) -> Result<Vec<u8>, StoreError> {
        let fetch_error = |reason: String| StoreError::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status().as_u16())));
        }

        let expected = response.content_length().filter(|len| *len > 0);
        let mut data = Vec::with_capacity(initial_capacity(expected));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
        {
            data.extend_from_slice(&chunk);
            if let Some(total) = expected {
                on_progress((data.len() as f64 / total as f64).min(1.0));
            }
        }
        if expected.is_none() {
            on_progress(1.0);
        }

        Ok(data)
    }
}

#[async_trait]
impl ProgressServer for HttpCollaborator {
    async fn exchange(&self, local: &ProgressMap) -> Result<ProgressMap, ApiError> {
        let response = self
            .client
            .post(self.exchange_url())
            .json(local)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response.status(), "progress")?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn push(&self, resolved: &ProgressMap) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.push_url())
            .json(resolved)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response.status(), "progress")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_base() {
        let http = HttpCollaborator::new("https://api.example.com/v1/", Duration::from_secs(5))
            .unwrap();

        assert_eq!(http.base_url(), "https://api.example.com/v1");
        assert_eq!(
            http.detail_url(ContentType::Course, "42"),
            "https://api.example.com/v1/courses/42"
        );
        assert_eq!(http.exchange_url(), "https://api.example.com/v1/progress/sync");
        assert_eq!(http.push_url(), "https://api.example.com/v1/progress");
    }

    #[test]
    fn from_config_requires_base_url() {
        assert!(HttpCollaborator::from_config(&HttpConfig::default()).is_err());

        let config = HttpConfig {
            base_url: Some("http://localhost:3000".into()),
            timeout_secs: 1,
        };
        let http = HttpCollaborator::from_config(&config).unwrap();
        assert_eq!(http.base_url(), "http://localhost:3000");
    }

    #[test]
    fn preallocation_is_capped() {
        assert_eq!(initial_capacity(None), 0);
        assert_eq!(initial_capacity(Some(1024)), 1024);
        assert_eq!(initial_capacity(Some(u64::MAX)), 8 << 20);
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(StatusCode::OK, "x").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "course 1"),
            Err(ApiError::NotFound(what)) if what == "course 1"
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "x"),
            Err(ApiError::Status(502))
        ));
    }
}

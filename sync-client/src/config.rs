//! Configuration loading for the offline service.
//!
//! Configuration is loaded from a TOML file (e.g. `offline.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use sync_content::{FileKvStore, FsBlobStore, StoreError};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineConfig {
    /// Where documents and blobs live on disk.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Download queue behaviour.
    #[serde(default)]
    pub downloads: DownloadsConfig,
    /// Progress sync behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP collaborator settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory of the key-value documents (default: `offline/data`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory of downloaded blobs (default: `offline/blobs`).
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,
}

/// Download queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadsConfig {
    /// Maximum queued downloads, including the active one (default: 50).
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Fetch a course's lessons with it unless told otherwise (default: true).
    #[serde(default = "default_true")]
    pub include_related: bool,
}

/// Sync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Allow sync on reconnect; the stored setting must agree (default: true).
    #[serde(default = "default_true")]
    pub auto_sync: bool,
    /// Unread sync events kept per subscriber (default: 16).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    /// (default: `info`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// HTTP collaborator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the content and progress API.
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("offline/data")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("offline/blobs")
}

fn default_max_queue_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_event_buffer() -> usize {
    16
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            blob_dir: default_blob_dir(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            include_related: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OfflineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl StorageConfig {
    /// Open the file-backed document and blob stores, creating the
    /// directories if needed.
    pub async fn open(&self) -> Result<(FileKvStore, FsBlobStore), StoreError> {
        let kv = FileKvStore::open(self.data_dir.clone()).await?;
        let blobs = FsBlobStore::open(self.blob_dir.clone()).await?;
        Ok((kv, blobs))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = OfflineConfig::default();
        assert_eq!(config.storage.data_dir, PathBuf::from("offline/data"));
        assert_eq!(config.downloads.max_queue_size, 50);
        assert!(config.downloads.include_related);
        assert!(config.sync.auto_sync);
        assert_eq!(config.sync.event_buffer, 16);
        assert_eq!(config.logging.filter, "info");
        assert!(config.http.base_url.is_none());
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml = r#"
[storage]
blob_dir = "/var/lib/app/blobs"

[downloads]
max_queue_size = 5

[http]
base_url = "https://api.example.com"
"#;

        let config: OfflineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("offline/data"));
        assert_eq!(config.storage.blob_dir, PathBuf::from("/var/lib/app/blobs"));
        assert_eq!(config.downloads.max_queue_size, 5);
        assert!(config.downloads.include_related);
        assert!(config.sync.auto_sync);
        assert_eq!(config.http.base_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn empty_toml_is_default() {
        let config: OfflineConfig = toml::from_str("").unwrap();
        assert_eq!(config.downloads.max_queue_size, 50);
    }

    #[test]
    fn from_file_reads_and_reports_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nauto_sync = false").unwrap();
        let config = OfflineConfig::from_file(file.path()).unwrap();
        assert!(!config.sync.auto_sync);

        let missing = OfflineConfig::from_file(Path::new("/nonexistent/offline.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[downloads]\nmax_queue_size = \"many\"").unwrap();
        let parsed = OfflineConfig::from_file(bad.path());
        assert!(matches!(parsed, Err(ConfigError::ParseError { .. })));
    }

    #[tokio::test]
    async fn storage_opens_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            data_dir: dir.path().join("data"),
            blob_dir: dir.path().join("blobs"),
        };

        let (kv, blobs) = storage.open().await.unwrap();
        assert!(kv.dir().is_dir());
        assert!(blobs.dir().is_dir());
    }
}

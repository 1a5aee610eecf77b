//! Run configuration
//!
//! Configuration is merged from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Optional TOML config file (`--config`)
//! 3. CLI flags
//!
//! The result is an immutable [`Config`] that is validated once and passed
//! into the reconciler.

mod credentials;
mod defaults;

pub use credentials::{
    resolve_credentials, resolve_from_env, ADC_ENV_VAR, GCE_PRODUCT_NAME_FILE,
    METADATA_HOST_ENV_VAR, TOKEN_ENV_VAR,
};
pub use defaults::{gcs_bucket_url, BuiltinDefaults};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::store::{FsObjectStore, GcsObjectStore, ObjectStore, StoreError};

/// Errors raised while building the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("empty {0} given")]
    MissingOption(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid credentials in {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },

    #[error("failed to open storage: {0}")]
    Storage(#[from] StoreError),
}

/// One configuration layer; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub url: Option<String>,
    pub dst: Option<PathBuf>,
    pub auth_path: Option<PathBuf>,
    pub index_object: Option<String>,
    pub delimiter: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overlay `over` on top of `self`; set fields in `over` win
    pub fn merge(self, over: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            bucket: over.bucket.or(self.bucket),
            project: over.project.or(self.project),
            url: over.url.or(self.url),
            dst: over.dst.or(self.dst),
            auth_path: over.auth_path.or(self.auth_path),
            index_object: over.index_object.or(self.index_object),
            delimiter: over.delimiter.or(self.delimiter),
            endpoint: over.endpoint.or(self.endpoint),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
        }
    }
}

/// Where chart archives and the existing index live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// A Google Cloud Storage bucket
    Gcs { bucket: String },
    /// A local directory mirroring a bucket
    Local { root: PathBuf },
}

impl StorageLocation {
    /// Parse `gs://bucket`, a bare bucket name, or `file:///path`
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingOption("bucket"));
        }

        if raw.starts_with("file:") {
            let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
                field: "bucket",
                reason: e.to_string(),
            })?;
            let root = url.to_file_path().map_err(|_| ConfigError::InvalidValue {
                field: "bucket",
                reason: format!("'{}' is not a local directory URL", raw),
            })?;
            return Ok(StorageLocation::Local { root });
        }

        let bucket = raw.strip_prefix("gs://").unwrap_or(raw).trim_end_matches('/');
        if bucket.is_empty() || bucket.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "bucket",
                reason: format!("'{}' is not a bucket name", raw),
            });
        }
        Ok(StorageLocation::Gcs {
            bucket: bucket.to_string(),
        })
    }

    /// Base URL used for entry URLs when none is configured
    pub fn default_base_url(&self) -> Result<Url, ConfigError> {
        match self {
            StorageLocation::Gcs { bucket } => {
                Url::parse(&gcs_bucket_url(bucket)).map_err(|e| ConfigError::InvalidValue {
                    field: "bucket",
                    reason: e.to_string(),
                })
            }
            StorageLocation::Local { root } => {
                let absolute = if root.is_absolute() {
                    root.clone()
                } else {
                    std::env::current_dir()
                        .map_err(|e| ConfigError::Io {
                            path: root.clone(),
                            source: e,
                        })?
                        .join(root)
                };
                Url::from_directory_path(&absolute).map_err(|_| ConfigError::InvalidValue {
                    field: "bucket",
                    reason: format!("cannot build a URL for {}", absolute.display()),
                })
            }
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Gcs { bucket } => write!(f, "gs://{}", bucket),
            StorageLocation::Local { root } => write!(f, "{}", root.display()),
        }
    }
}

/// Destination of the regenerated index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    Stdout,
    File(PathBuf),
}

/// Fully resolved, immutable run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageLocation,
    pub project: String,
    /// Base for entry URLs
    pub base_url: Url,
    pub output: OutputSink,
    pub auth_path: Option<PathBuf>,
    /// Name of the existing index object inside the storage location
    pub index_object: String,
    pub delimiter: String,
    pub endpoint: Url,
    pub timeout: Duration,
}

impl Config {
    /// Validate a merged layer against the built-in defaults
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let defaults = BuiltinDefaults::default();

        let storage = StorageLocation::parse(layer.bucket.as_deref().unwrap_or_default())?;

        let project = layer.project.unwrap_or_default().trim().to_string();
        if project.is_empty() {
            return Err(ConfigError::MissingOption("project"));
        }

        let base_url = match layer.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                    field: "url",
                    reason: e.to_string(),
                })?
            }
            _ => storage.default_base_url()?,
        };

        let endpoint_raw = layer.endpoint.unwrap_or(defaults.endpoint);
        let endpoint = Url::parse(&endpoint_raw).map_err(|e| ConfigError::InvalidValue {
            field: "endpoint",
            reason: e.to_string(),
        })?;

        let delimiter = layer.delimiter.unwrap_or(defaults.delimiter);
        let index_object = layer.index_object.unwrap_or(defaults.index_object);
        if index_object.trim().is_empty() {
            return Err(ConfigError::MissingOption("index object"));
        }

        let timeout_secs = layer.timeout_secs.unwrap_or(defaults.timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: "timeout must be at least one second".to_string(),
            });
        }

        let output = match layer.dst {
            Some(path) if !path.as_os_str().is_empty() => OutputSink::File(path),
            _ => OutputSink::Stdout,
        };

        Ok(Config {
            storage,
            project,
            base_url,
            output,
            auth_path: layer.auth_path.filter(|p| !p.as_os_str().is_empty()),
            index_object,
            delimiter,
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Open the configured object store
    pub fn open_store(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        match &self.storage {
            StorageLocation::Gcs { bucket } => {
                let credentials = resolve_from_env(self.auth_path.as_deref())?;
                tracing::debug!(?credentials, bucket = %bucket, "opening bucket");
                let store =
                    GcsObjectStore::new(bucket, self.endpoint.clone(), &credentials, self.timeout)?;
                Ok(Box::new(store))
            }
            StorageLocation::Local { root } => Ok(Box::new(FsObjectStore::new(root.clone())?)),
        }
    }
}

//! Object store access
//!
//! The indexer only needs three things from storage: list object names by
//! prefix, read an object's bytes, and tell "object does not exist" apart from
//! every other failure. [`ObjectStore`] captures exactly that; retries and
//! authentication are the implementation's business.

pub mod auth;
mod fs;
mod gcs;
mod memory;

pub use fs::FsObjectStore;
pub use auth::{AuthorizedUser, Credentials, ServiceAccountKey};
pub use gcs::{GcsObjectStore, DEFAULT_ENDPOINT};
pub use memory::MemoryObjectStore;

use std::io;

/// Errors returned by object store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("IO error on '{object}': {source}")]
    Io {
        object: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP request for '{object}' failed: {source}")]
    Http {
        object: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("storage returned status {status} for '{object}': {message}")]
    Status {
        object: String,
        status: u16,
        message: String,
    },

    #[error("invalid object name '{0}'")]
    InvalidName(String),

    #[error("failed to obtain access token from {endpoint}: {reason}")]
    Auth { endpoint: String, reason: String },
}

impl StoreError {
    /// Whether this error means the object simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Read-only view of a bucket
pub trait ObjectStore {
    /// All object names starting with `prefix`, at any depth.
    ///
    /// Names are returned in the store's canonical form and are directly
    /// usable with [`read`](Self::read).
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Full contents of object `name`
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        (**self).read(name)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        (**self).read(name)
    }
}

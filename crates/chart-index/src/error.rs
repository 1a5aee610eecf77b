//! Error types for the index document model.

use std::io;

use semver::Version;

/// Errors raised while loading or writing an index document.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("malformed index document: {0}")]
    Malformed(#[source] serde_yaml::Error),

    #[error("index lists '{project}' version {version} more than once")]
    DuplicateEntry { project: String, version: Version },

    #[error("failed to serialize index document: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

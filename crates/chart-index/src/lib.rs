//! Chart Repository Index
//!
//! Defines the Helm chart repository index document (`index.yaml`): chart
//! metadata, per-version entries, and the per-project entry lists that the
//! indexer reconciles against bucket contents.

pub mod document;
pub mod entry;
pub mod error;
pub mod metadata;

pub use document::{entry_url, IndexDocument, API_VERSION};
pub use entry::IndexEntry;
pub use error::IndexError;
pub use metadata::{ChartMetadata, Maintainer};

/// Semantic version type used for chart versions throughout the index.
pub use semver::Version;

/// File name of the index document inside a chart repository.
pub const INDEX_FILE: &str = "index.yaml";

//! Chart Indexer - Helm repository index reconciliation
//!
//! Keeps the `index.yaml` of a Helm chart repository in agreement with the
//! chart archives actually present in an object store: archives missing from
//! the index are loaded and added, and entries whose archive is gone are
//! pruned.

pub mod config;
pub mod inventory;
pub mod loader;
pub mod reconcile;
pub mod signal;
pub mod store;
pub mod version;

pub use config::{Config, ConfigError, ConfigLayer, OutputSink, StorageLocation};
pub use inventory::{scan_inventory, Inventory, ScanError};
pub use loader::{ArtifactLoader, LoadError, LoadedArtifact};
pub use reconcile::{ReconcileError, ReconcileReport, Reconciler, Stage};
pub use signal::{CancelToken, SignalHandler, EXIT_CODE_CANCELLED};
pub use store::{
    Credentials, FsObjectStore, GcsObjectStore, MemoryObjectStore, ObjectStore, StoreError,
};
pub use version::{extract_version, ArtifactVersion, VersionError};

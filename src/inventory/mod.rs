//! Artifact inventory
//!
//! Scans the bucket for a project's chart archives and maps each semantic
//! version to the object that holds it. A scan either accounts for every
//! archive under the project prefix or fails as a whole.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use semver::Version;

use crate::store::{ObjectStore, StoreError};
use crate::version::{extract_version, VersionError, ARCHIVE_EXTENSION};

/// Errors that can occur while scanning the inventory
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to list objects under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StoreError,
    },

    #[error("inventory scan failed at '{object}': {source}")]
    InventoryScanFailed {
        object: String,
        #[source]
        source: VersionError,
    },

    #[error("version {version} is stored twice: '{first}' and '{second}'")]
    DuplicateVersionDetected {
        version: Version,
        first: String,
        second: String,
    },
}

/// Stored archives of one project, keyed by version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    objects: BTreeMap<Version, String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `object` as the archive for `version`.
    ///
    /// Fails if another object already claims the same version.
    pub fn insert(&mut self, version: Version, object: String) -> Result<(), ScanError> {
        match self.objects.entry(version) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(())
            }
            btree_map::Entry::Occupied(slot) => Err(ScanError::DuplicateVersionDetected {
                version: slot.key().clone(),
                first: slot.get().clone(),
                second: object,
            }),
        }
    }

    /// Set of stored versions
    pub fn versions(&self) -> BTreeSet<Version> {
        self.objects.keys().cloned().collect()
    }

    /// (version, object) pairs in ascending version order
    pub fn iter(&self) -> impl Iterator<Item = (&Version, &str)> {
        self.objects.iter().map(|(v, o)| (v, o.as_str()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Build the inventory of `project` from every object whose name starts with
/// the project name. Objects that are not `.tgz` archives are skipped.
pub fn scan_inventory<S: ObjectStore + ?Sized>(
    store: &S,
    project: &str,
    delimiter: &str,
) -> Result<Inventory, ScanError> {
    let names = store.list(project).map_err(|e| ScanError::Listing {
        prefix: project.to_string(),
        source: e,
    })?;

    let mut inventory = Inventory::new();
    for name in names {
        if !name.ends_with(ARCHIVE_EXTENSION) {
            tracing::debug!(object = %name, "skipping non-archive object");
            continue;
        }

        let parsed = extract_version(project, delimiter, &name).map_err(|e| {
            ScanError::InventoryScanFailed {
                object: name.clone(),
                source: e,
            }
        })?;

        inventory.insert(parsed.version, parsed.object_name)?;
    }

    tracing::debug!(project, archives = inventory.len(), "inventory scanned");
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn store_with(names: &[&str]) -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for name in names {
            store.insert(*name, b"archive".to_vec());
        }
        store
    }

    #[test]
    fn test_scan_maps_versions() {
        let store = store_with(&["demo-1.0.0.tgz", "demo-1.1.0.tgz", "demo-2.0.0-beta.1.tgz"]);
        let inventory = scan_inventory(&store, "demo", "-").unwrap();

        let pairs: Vec<_> = inventory.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (&v("1.0.0"), "demo-1.0.0.tgz"),
                (&v("1.1.0"), "demo-1.1.0.tgz"),
                (&v("2.0.0-beta.1"), "demo-2.0.0-beta.1.tgz"),
            ]
        );
    }

    #[test]
    fn test_scan_skips_non_archives() {
        let store = store_with(&["demo-1.0.0.tgz", "demo-1.0.0.tgz.prov", "demo-notes.txt", "index.yaml"]);
        let inventory = scan_inventory(&store, "demo", "-").unwrap();

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.versions(), BTreeSet::from([v("1.0.0")]));
    }

    #[test]
    fn test_scan_ignores_other_prefixes() {
        let store = store_with(&["demo-1.0.0.tgz", "other-3.0.0.tgz"]);
        let inventory = scan_inventory(&store, "demo", "-").unwrap();
        assert_eq!(inventory.versions(), BTreeSet::from([v("1.0.0")]));
    }

    #[test]
    fn test_scan_fails_on_bad_version() {
        let store = store_with(&["demo-1.0.0.tgz", "demo-notaversion.tgz"]);
        let err = scan_inventory(&store, "demo", "-").unwrap_err();

        match err {
            ScanError::InventoryScanFailed { object, source } => {
                assert_eq!(object, "demo-notaversion.tgz");
                assert!(matches!(source, VersionError::InvalidVersionFormat { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scan_fails_on_sibling_project() {
        // "demo-extras-1.0.0.tgz" shares the prefix but is not a demo version
        let store = store_with(&["demo-1.0.0.tgz", "demo-extras-1.0.0.tgz"]);
        assert!(matches!(
            scan_inventory(&store, "demo", "-"),
            Err(ScanError::InventoryScanFailed { .. })
        ));
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let mut inventory = Inventory::new();
        inventory.insert(v("1.0.0"), "demo-1.0.0.tgz".to_string()).unwrap();
        let err = inventory
            .insert(v("1.0.0"), "nested/demo-1.0.0.tgz".to_string())
            .unwrap_err();

        match err {
            ScanError::DuplicateVersionDetected { version, first, second } => {
                assert_eq!(version, v("1.0.0"));
                assert_eq!(first, "demo-1.0.0.tgz");
                assert_eq!(second, "nested/demo-1.0.0.tgz");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryObjectStore::new();
        let inventory = scan_inventory(&store, "demo", "-").unwrap();
        assert!(inventory.is_empty());
    }
}

//! In-memory object store.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{ObjectStore, StoreError};

/// Object store backed by a map, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `name`, replacing any previous object
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), data.into());
    }

    /// Delete `name`; returns whether it existed
    pub fn remove(&self, name: &str) -> bool {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_by_prefix() {
        let store = MemoryObjectStore::new();
        store.insert("demo-1.0.0.tgz", b"a".to_vec());
        store.insert("demo-2.0.0.tgz", b"b".to_vec());
        store.insert("other-1.0.0.tgz", b"c".to_vec());

        let names = store.list("demo").unwrap();
        assert_eq!(names, vec!["demo-1.0.0.tgz", "demo-2.0.0.tgz"]);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.read("index.yaml").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove() {
        let store = MemoryObjectStore::new();
        store.insert("a", b"1".to_vec());
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }
}

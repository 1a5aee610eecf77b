//! Local directory acting as a bucket.
//!
//! Object names are paths relative to the root, joined with `/` on every
//! platform, so a mirrored bucket lists the same names as the real one.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::{ObjectStore, StoreError};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store over `root`; the directory must exist
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Io {
                object: root.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "bucket directory does not exist"),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object name to a path below the root
    fn object_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(name);
        let safe = !name.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

fn object_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl ObjectStore for FsObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry.map_err(|e| StoreError::Io {
                object: prefix.to_string(),
                source: e.into(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };

            let name = object_name(rel);
            if name.starts_with(prefix) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                StoreError::Io {
                    object: name.to_string(),
                    source: e,
                }
            }
        })
    }
}

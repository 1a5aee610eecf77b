//! Artifact loading
//!
//! Reads a chart archive from the store exactly once and hands the same
//! immutable buffer to both the metadata parser and the digester, so the
//! recorded digest always describes the bytes the metadata came from.

mod digest;
mod parser;

pub use digest::{ContentDigester, Sha256Digester};
pub use parser::{ArchiveParser, ParseError, TgzChartParser, CHART_FILE};

use std::io;

use chart_index::ChartMetadata;

use crate::store::{ObjectStore, StoreError};

/// Errors for artifact loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read artifact '{object}': {source}")]
    ArtifactReadFailed {
        object: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to parse artifact '{object}': {source}")]
    ArtifactParseFailed {
        object: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to digest artifact '{object}': {source}")]
    DigestComputationFailed {
        object: String,
        #[source]
        source: io::Error,
    },
}

/// Metadata and digest of one archive, both taken from the same bytes
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub object_name: String,
    pub metadata: ChartMetadata,
    pub digest: String,
    /// Archive size in bytes
    pub size: usize,
}

/// Loads chart archives from an object store
pub struct ArtifactLoader<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    parser: Box<dyn ArchiveParser>,
    digester: Box<dyn ContentDigester>,
}

impl<'s, S: ObjectStore + ?Sized> ArtifactLoader<'s, S> {
    /// Loader using the `.tgz` chart parser and SHA-256 digests
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            parser: Box::new(TgzChartParser),
            digester: Box::new(Sha256Digester),
        }
    }

    /// Replace the archive parser
    pub fn with_parser(mut self, parser: impl ArchiveParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Replace the digester
    pub fn with_digester(mut self, digester: impl ContentDigester + 'static) -> Self {
        self.digester = Box::new(digester);
        self
    }

    /// Read `object` once, then parse and digest the same buffer
    pub fn load(&self, object: &str) -> Result<LoadedArtifact, LoadError> {
        let bytes = self
            .store
            .read(object)
            .map_err(|e| LoadError::ArtifactReadFailed {
                object: object.to_string(),
                source: e,
            })?;

        let metadata = self
            .parser
            .parse(&bytes)
            .map_err(|e| LoadError::ArtifactParseFailed {
                object: object.to_string(),
                source: e,
            })?;

        let digest = self
            .digester
            .digest(&bytes)
            .map_err(|e| LoadError::DigestComputationFailed {
                object: object.to_string(),
                source: e,
            })?;

        Ok(LoadedArtifact {
            object_name: object.to_string(),
            metadata,
            digest,
            size: bytes.len(),
        })
    }
}

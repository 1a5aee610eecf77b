//! A single chart version listed in the index.

use std::fmt;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::metadata::{ChartMetadata, MetadataFields};

/// One row of the index: chart metadata plus where to fetch the archive and
/// how to verify it.
///
/// Entries are created once, when a version is first discovered, and are not
/// edited afterwards. `created` therefore records first-seen time even after
/// many reconciliation runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub metadata: ChartMetadata,

    /// Retrieval URLs for the chart archive
    pub urls: Vec<String>,

    /// When this version was first indexed
    pub created: DateTime<Utc>,

    /// Legacy removal flag; never set by this crate
    #[serde(skip_serializing_if = "is_false")]
    pub removed: bool,

    /// SHA-256 of the archive bytes (lowercase hex)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl IndexEntry {
    /// Create a new entry stamped with the current time
    pub fn new(metadata: ChartMetadata, urls: Vec<String>, digest: String) -> Self {
        Self {
            metadata,
            urls,
            created: Utc::now(),
            removed: false,
            digest,
        }
    }

    /// Chart version of this entry
    pub fn version(&self) -> &Version {
        &self.metadata.version
    }

    /// Chart name of this entry
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

// Entry keys and chart metadata keys share one mapping. Anything that is not
// an entry key is handed to the metadata collector.
impl<'de> Deserialize<'de> for IndexEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = IndexEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an index entry mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<IndexEntry, A::Error> {
                let mut metadata = MetadataFields::default();
                let mut urls = None;
                let mut created = None;
                let mut removed = None;
                let mut digest = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "urls" => urls = map.next_value()?,
                        "created" => created = map.next_value()?,
                        "removed" => removed = map.next_value()?,
                        "digest" => digest = map.next_value()?,
                        _ => metadata.visit(key, &mut map)?,
                    }
                }

                Ok(IndexEntry {
                    metadata: metadata.finish()?,
                    urls: urls.unwrap_or_default(),
                    created: created.unwrap_or_default(),
                    removed: removed.unwrap_or(false),
                    digest: digest.unwrap_or_default(),
                })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

//! The index document (`index.yaml`)
//!
//! An [`IndexDocument`] is read once at the start of a run, edited in memory,
//! and written once at the end.
//!
//! Only the section of the project being reconciled is parsed into
//! [`IndexEntry`] values. Within that section every version appears at most
//! once, and [`IndexDocument::sort_entries`] orders it from newest to oldest.
//! Sections of other projects are kept as raw YAML and written back as they
//! were read, so entries this crate could not parse (non-semver versions,
//! duplicates left by another tool) never block a run. Unknown top-level keys
//! such as `serverInfo` are carried through the same way.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::de::{DeserializeSeed, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{de, Deserializer, Serialize, Serializer};
use url::Url;

use crate::entry::IndexEntry;
use crate::error::IndexError;
use crate::metadata::ChartMetadata;

/// Index document API version
pub const API_VERSION: &str = "v1";

/// Chart repository index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub api_version: String,

    /// Parsed sections: project name -> entries
    pub entries: BTreeMap<String, Vec<IndexEntry>>,

    /// Sections of other projects, verbatim
    pub foreign: BTreeMap<String, serde_yaml::Value>,

    /// When the document was last regenerated
    pub generated: DateTime<Utc>,

    pub public_keys: Vec<String>,

    /// Top-level keys not modelled above (`serverInfo`, `annotations`, ...)
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for IndexDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexDocument {
    /// Fresh, empty document with a zero-value `generated` timestamp
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            entries: BTreeMap::new(),
            foreign: BTreeMap::new(),
            generated: DateTime::<Utc>::default(),
            public_keys: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Parse a serialized index for editing `project`.
    ///
    /// A blank document yields an empty index. The section for `project` is
    /// validated for duplicate versions and sorted; every other section is
    /// kept opaque.
    pub fn load(raw: &[u8], project: &str) -> Result<Self, IndexError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        let deserializer = serde_yaml::Deserializer::from_slice(raw);
        let mut doc = DocumentSeed { project }
            .deserialize(deserializer)
            .map_err(IndexError::Malformed)?;
        doc.validate()?;
        doc.sort_entries();
        Ok(doc)
    }

    /// Parse `raw` if a prior index exists, otherwise start empty
    pub fn load_or_default(raw: Option<&[u8]>, project: &str) -> Result<Self, IndexError> {
        match raw {
            Some(raw) => Self::load(raw, project),
            None => Ok(Self::new()),
        }
    }

    fn validate(&self) -> Result<(), IndexError> {
        for (project, entries) in &self.entries {
            let mut seen = BTreeSet::new();
            for entry in entries {
                if !seen.insert(entry.version()) {
                    return Err(IndexError::DuplicateEntry {
                        project: project.clone(),
                        version: entry.version().clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Raw section of a project that was not parsed
    pub fn foreign_section(&self, project: &str) -> Option<&serde_yaml::Value> {
        self.foreign.get(project)
    }

    /// True iff `project` has an entry for exactly `version`
    pub fn has(&self, project: &str, version: &Version) -> bool {
        self.get(project, version).is_some()
    }

    /// Entry for `project` at `version`
    pub fn get(&self, project: &str, version: &Version) -> Option<&IndexEntry> {
        self.entries
            .get(project)
            .and_then(|entries| entries.iter().find(|e| e.version() == version))
    }

    /// All entries recorded for `project`
    pub fn project_entries(&self, project: &str) -> &[IndexEntry] {
        self.entries.get(project).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a newly discovered chart version.
    ///
    /// The entry URL is `base_url` joined with `object_name`. Ordering is not
    /// normalized until [`sort_entries`](Self::sort_entries).
    pub fn add(
        &mut self,
        project: &str,
        metadata: ChartMetadata,
        object_name: &str,
        base_url: &Url,
        digest: String,
    ) -> &IndexEntry {
        let urls = vec![entry_url(base_url, object_name)];
        let entries = self.section_mut(project);
        entries.push(IndexEntry::new(metadata, urls, digest));
        &entries[entries.len() - 1]
    }

    /// Keep only the entries of `project` whose version is in `live`.
    ///
    /// The project key is always present afterwards, even if empty. Returns
    /// the removed entries.
    pub fn prune(&mut self, project: &str, live: &BTreeSet<Version>) -> Vec<IndexEntry> {
        let entries = self.section_mut(project);
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(entries)
            .into_iter()
            .partition(|e| live.contains(e.version()));
        *entries = kept;
        removed
    }

    // An edited project is always written from `entries`; any raw copy of
    // its section is discarded.
    fn section_mut(&mut self, project: &str) -> &mut Vec<IndexEntry> {
        if self.foreign.remove(project).is_some() {
            tracing::warn!(project, "replacing unparsed section of edited project");
        }
        self.entries.entry(project.to_string()).or_default()
    }

    /// Set `generated` to now
    pub fn stamp(&mut self) {
        self.generated = Utc::now();
    }

    /// Order every project's entries by version, newest first
    pub fn sort_entries(&mut self) {
        for entries in self.entries.values_mut() {
            entries.sort_by(|a, b| b.version().cmp(a.version()));
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, IndexError> {
        serde_yaml::to_string(self).map_err(IndexError::Serialize)
    }

    /// Write YAML to `writer`
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), IndexError> {
        let yaml = self.to_yaml()?;
        writer.write_all(yaml.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Write to `path`, replacing any previous file atomically
    pub fn write_file(&self, path: &Path) -> Result<(), IndexError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write_to(&mut tmp)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
        tracing::debug!(path = %path.display(), "wrote index document");
        Ok(())
    }
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("apiVersion", &self.api_version)?;
        map.serialize_entry(
            "entries",
            &Sections {
                parsed: &self.entries,
                foreign: &self.foreign,
            },
        )?;
        map.serialize_entry("generated", &self.generated)?;
        if !self.public_keys.is_empty() {
            map.serialize_entry("publicKeys", &self.public_keys)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Parsed and raw sections merged back into one mapping, ordered by project
struct Sections<'a> {
    parsed: &'a BTreeMap<String, Vec<IndexEntry>>,
    foreign: &'a BTreeMap<String, serde_yaml::Value>,
}

impl Serialize for Sections<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let projects: BTreeSet<&String> = self.parsed.keys().chain(self.foreign.keys()).collect();
        let mut map = serializer.serialize_map(Some(projects.len()))?;
        for project in projects {
            match self.parsed.get(project) {
                Some(entries) => map.serialize_entry(project, entries)?,
                None => {
                    if let Some(raw) = self.foreign.get(project) {
                        map.serialize_entry(project, raw)?;
                    }
                }
            }
        }
        map.end()
    }
}

/// Reads a whole document, parsing only `project`'s section
struct DocumentSeed<'p> {
    project: &'p str,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = IndexDocument;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<IndexDocument, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = IndexDocument;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an index document mapping")
    }

    fn visit_unit<E: de::Error>(self) -> Result<IndexDocument, E> {
        Ok(IndexDocument::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<IndexDocument, A::Error> {
        let mut doc = IndexDocument::new();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "apiVersion" => {
                    if let Some(api_version) = map.next_value::<Option<String>>()? {
                        doc.api_version = api_version;
                    }
                }
                "entries" => {
                    let (parsed, foreign) = map.next_value_seed(SectionsSeed {
                        project: self.project,
                    })?;
                    doc.entries = parsed;
                    doc.foreign = foreign;
                }
                "generated" => doc.generated = map.next_value::<Option<_>>()?.unwrap_or_default(),
                "publicKeys" => {
                    doc.public_keys = map.next_value::<Option<_>>()?.unwrap_or_default()
                }
                _ => {
                    let value = map.next_value()?;
                    doc.extra.insert(key, value);
                }
            }
        }
        Ok(doc)
    }
}

type SplitSections = (
    BTreeMap<String, Vec<IndexEntry>>,
    BTreeMap<String, serde_yaml::Value>,
);

/// Reads the `entries` mapping, splitting `project` from everything else
struct SectionsSeed<'p> {
    project: &'p str,
}

impl<'de> DeserializeSeed<'de> for SectionsSeed<'_> {
    type Value = SplitSections;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<SplitSections, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for SectionsSeed<'_> {
    type Value = SplitSections;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of project names to entry lists")
    }

    fn visit_unit<E: de::Error>(self) -> Result<SplitSections, E> {
        Ok((BTreeMap::new(), BTreeMap::new()))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SplitSections, A::Error> {
        let mut parsed = BTreeMap::new();
        let mut foreign = BTreeMap::new();
        while let Some(project) = map.next_key::<String>()? {
            if project == self.project {
                let entries: Option<Vec<IndexEntry>> = map.next_value()?;
                parsed.insert(project, entries.unwrap_or_default());
            } else {
                let raw: serde_yaml::Value = map.next_value()?;
                foreign.insert(project, raw);
            }
        }
        Ok((parsed, foreign))
    }
}

/// Retrieval URL for `object_name` under `base_url`.
///
/// The base is treated as a directory whether or not it ends in `/`.
pub fn entry_url(base_url: &Url, object_name: &str) -> String {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    match base.join(object_name) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base, object_name),
    }
}

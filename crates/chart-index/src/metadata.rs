//! Chart metadata as declared in a chart's `Chart.yaml`.
//!
//! The same structure is embedded in every index entry. Keys this crate does
//! not model are kept in [`ChartMetadata::extra`] so that entries produced by
//! other tools survive a load/write cycle unchanged.
//!
//! Deserialization reads each known key straight from the YAML document
//! instead of going through `#[serde(flatten)]`. Flattening buffers values as
//! generic YAML first, which turns an unquoted `appVersion: 1.10` into the
//! float `1.1` before a string field ever sees it.

use std::collections::BTreeMap;
use std::fmt;

use semver::Version;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A chart maintainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Descriptive attributes of one chart version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart name
    pub name: String,

    /// Project home page URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Source code URLs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Chart version (semantic version)
    pub version: Version,

    /// One-sentence description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    /// Template engine (Helm v2 only, defaults to gotpl)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Chart API version (`v1` or `v2`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,

    /// Version of the packaged application, exactly as written. Often left
    /// unquoted in Chart.yaml (`appVersion: 1.10`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiller_version: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    /// Keys not modelled above (`dependencies`, `type`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Metadata fields collected one key at a time.
///
/// Shared with [`IndexEntry`](crate::IndexEntry), whose YAML mapping mixes
/// entry keys and metadata keys at the same level.
#[derive(Debug, Default)]
pub(crate) struct MetadataFields {
    name: Option<String>,
    home: Option<String>,
    sources: Vec<String>,
    version: Option<Version>,
    description: Option<String>,
    keywords: Vec<String>,
    maintainers: Vec<Maintainer>,
    engine: Option<String>,
    icon: Option<String>,
    api_version: Option<String>,
    condition: Option<String>,
    tags: Option<String>,
    app_version: Option<String>,
    deprecated: bool,
    tiller_version: Option<String>,
    annotations: BTreeMap<String, String>,
    kube_version: Option<String>,
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl MetadataFields {
    /// Consume the value for `key` from `map`
    pub(crate) fn visit<'de, A>(&mut self, key: String, map: &mut A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        match key.as_str() {
            "name" => self.name = Some(map.next_value()?),
            "home" => self.home = map.next_value()?,
            "sources" => self.sources = map.next_value::<Option<_>>()?.unwrap_or_default(),
            "version" => self.version = Some(map.next_value()?),
            "description" => self.description = map.next_value()?,
            "keywords" => self.keywords = map.next_value::<Option<_>>()?.unwrap_or_default(),
            "maintainers" => {
                self.maintainers = map.next_value::<Option<_>>()?.unwrap_or_default()
            }
            "engine" => self.engine = map.next_value()?,
            "icon" => self.icon = map.next_value()?,
            "apiVersion" => self.api_version = map.next_value()?,
            "condition" => self.condition = map.next_value()?,
            "tags" => self.tags = map.next_value()?,
            "appVersion" => self.app_version = map.next_value()?,
            "deprecated" => self.deprecated = map.next_value::<Option<_>>()?.unwrap_or(false),
            "tillerVersion" => self.tiller_version = map.next_value()?,
            "annotations" => {
                self.annotations = map.next_value::<Option<_>>()?.unwrap_or_default()
            }
            "kubeVersion" => self.kube_version = map.next_value()?,
            _ => {
                let value = map.next_value()?;
                self.extra.insert(key, value);
            }
        }
        Ok(())
    }

    pub(crate) fn finish<E: de::Error>(self) -> Result<ChartMetadata, E> {
        Ok(ChartMetadata {
            name: self.name.ok_or_else(|| E::missing_field("name"))?,
            home: self.home,
            sources: self.sources,
            version: self.version.ok_or_else(|| E::missing_field("version"))?,
            description: self.description,
            keywords: self.keywords,
            maintainers: self.maintainers,
            engine: self.engine,
            icon: self.icon,
            api_version: self.api_version,
            condition: self.condition,
            tags: self.tags,
            app_version: self.app_version,
            deprecated: self.deprecated,
            tiller_version: self.tiller_version,
            annotations: self.annotations,
            kube_version: self.kube_version,
            extra: self.extra,
        })
    }
}

impl<'de> Deserialize<'de> for ChartMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetadataVisitor;

        impl<'de> Visitor<'de> for MetadataVisitor {
            type Value = ChartMetadata;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a chart metadata mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ChartMetadata, A::Error> {
                let mut fields = MetadataFields::default();
                while let Some(key) = map.next_key::<String>()? {
                    fields.visit(key, &mut map)?;
                }
                fields.finish()
            }
        }

        deserializer.deserialize_map(MetadataVisitor)
    }
}

impl ChartMetadata {
    /// Minimal metadata with only name and version set
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            home: None,
            sources: Vec::new(),
            version,
            description: None,
            keywords: Vec::new(),
            maintainers: Vec::new(),
            engine: None,
            icon: None,
            api_version: None,
            condition: None,
            tags: None,
            app_version: None,
            deprecated: false,
            tiller_version: None,
            annotations: BTreeMap::new(),
            kube_version: None,
            extra: BTreeMap::new(),
        }
    }

    /// Parse a `Chart.yaml` document
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

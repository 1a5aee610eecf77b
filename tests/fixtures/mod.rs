//! Shared fixtures for the reconciliation tests
//!
//! Chart archives are built in memory with the same layout `helm package`
//! produces: a single top-level directory named after the chart holding
//! `Chart.yaml` and friends.

#![allow(dead_code)]

use std::path::Path;

use chart_indexer::{Config, ConfigLayer, MemoryObjectStore, ObjectStore, StoreError};
use flate2::write::GzEncoder;
use flate2::Compression;

pub const BUCKET: &str = "test-charts";
pub const PROJECT: &str = "demo";

/// Chart.yaml for `name` at `version`
pub fn chart_yaml(name: &str, version: &str) -> String {
    format!(
        "apiVersion: v2\nname: {}\nversion: {}\ndescription: A demo chart\nappVersion: \"1.16\"\n",
        name, version
    )
}

/// A packaged chart for `name` at `version`
pub fn chart_archive(name: &str, version: &str) -> Vec<u8> {
    chart_archive_with(name, &chart_yaml(name, version))
}

/// A packaged chart with arbitrary Chart.yaml content under `dir/`
pub fn chart_archive_with(dir: &str, chart_yaml: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append_file(&mut builder, &format!("{}/Chart.yaml", dir), chart_yaml.as_bytes());
    append_file(&mut builder, &format!("{}/values.yaml", dir), b"replicaCount: 1\n");
    append_file(
        &mut builder,
        &format!("{}/templates/deployment.yaml", dir),
        b"kind: Deployment\n",
    );

    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .expect("finish chart archive")
}

/// An archive with no Chart.yaml at all
pub fn archive_without_chart(dir: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append_file(&mut builder, &format!("{}/values.yaml", dir), b"replicaCount: 1\n");
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .expect("finish archive")
}

fn append_file<W: std::io::Write>(builder: &mut tar::Builder<W>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, path, data)
        .expect("append tar entry");
}

/// Archive object name for the demo project
pub fn object_name(version: &str) -> String {
    format!("{}-{}.tgz", PROJECT, version)
}

/// Memory store pre-populated with demo charts at `versions`
pub fn store_with_charts(versions: &[&str]) -> MemoryObjectStore {
    let store = MemoryObjectStore::new();
    for version in versions {
        store.insert(object_name(version), chart_archive(PROJECT, version));
    }
    store
}

/// Configuration for the demo project in the test bucket
pub fn config() -> Config {
    Config::resolve(ConfigLayer {
        bucket: Some(BUCKET.to_string()),
        project: Some(PROJECT.to_string()),
        ..Default::default()
    })
    .expect("valid test config")
}

/// Configuration for the demo project in a local directory bucket
pub fn local_config(root: &Path, dst: Option<&Path>) -> Config {
    let url = url::Url::from_directory_path(root).expect("absolute directory");
    Config::resolve(ConfigLayer {
        bucket: Some(url.to_string()),
        project: Some(PROJECT.to_string()),
        dst: dst.map(Path::to_path_buf),
        ..Default::default()
    })
    .expect("valid local config")
}

/// Download URL the default test config assigns to `object`
pub fn public_url(object: &str) -> String {
    format!("https://{}.storage.googleapis.com/{}", BUCKET, object)
}

/// Store whose listing or reads fail with a server error, delegating
/// everything else to an in-memory bucket
pub struct FailingStore {
    pub inner: MemoryObjectStore,
    pub fail_list: bool,
    pub fail_read: bool,
}

impl FailingStore {
    pub fn failing_reads(inner: MemoryObjectStore) -> Self {
        Self { inner, fail_list: false, fail_read: true }
    }

    pub fn failing_lists(inner: MemoryObjectStore) -> Self {
        Self { inner, fail_list: true, fail_read: false }
    }

    fn unavailable(object: &str) -> StoreError {
        StoreError::Status {
            object: object.to_string(),
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

impl ObjectStore for FailingStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if self.fail_list {
            return Err(Self::unavailable(prefix));
        }
        self.inner.list(prefix)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_read {
            return Err(Self::unavailable(name));
        }
        self.inner.read(name)
    }
}

/// Configuration writing the index to `dst`
pub fn config_with_dst(dst: &Path) -> Config {
    Config::resolve(ConfigLayer {
        bucket: Some(BUCKET.to_string()),
        project: Some(PROJECT.to_string()),
        dst: Some(dst.to_path_buf()),
        ..Default::default()
    })
    .expect("valid test config")
}

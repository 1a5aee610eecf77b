//! Index reconciliation
//!
//! One run is a single linear pass:
//!
//! Load -> Scan -> Diff -> LoadArtifact* -> Prune -> StampAndSort -> Persist
//!
//! Any failure aborts the run before Persist, so the previously published
//! index is left untouched. Missing artifacts are loaded one at a time and
//! the first failure ends the run.

use std::fmt;
use std::io::{self, Write};

use chart_index::{IndexDocument, IndexError, Version};
use chrono::{DateTime, Utc};

use crate::config::{Config, OutputSink};
use crate::inventory::{scan_inventory, Inventory, ScanError};
use crate::loader::{ArtifactLoader, LoadError};
use crate::signal::CancelToken;
use crate::store::{ObjectStore, StoreError};

/// Stages of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Scan,
    Diff,
    LoadArtifact,
    Prune,
    StampAndSort,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Scan => "scan",
            Stage::Diff => "diff",
            Stage::LoadArtifact => "load-artifact",
            Stage::Prune => "prune",
            Stage::StampAndSort => "stamp-and-sort",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to read index '{object}': {source}")]
    IndexReadFailed {
        object: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to load index '{object}': {source}")]
    IndexLoadFailed {
        object: String,
        #[source]
        source: IndexError,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("'{object}' is named as version {file_version} but its chart declares {chart_version}")]
    VersionMismatch {
        object: String,
        file_version: Version,
        chart_version: Version,
    },

    #[error("failed to persist index: {0}")]
    PersistFailed(#[source] IndexError),

    #[error("run cancelled during {stage}")]
    Cancelled { stage: Stage },
}

/// What a run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Versions newly added to the index
    pub added: Vec<Version>,
    /// Versions dropped because their archive is gone
    pub pruned: Vec<Version>,
    /// Entries for the project after reconciliation
    pub total: usize,
    /// Timestamp stamped on the document
    pub generated: DateTime<Utc>,
}

impl ReconcileReport {
    /// True if the entry set changed (the timestamp always does)
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.pruned.is_empty()
    }
}

/// Brings one project's index section into agreement with storage
pub struct Reconciler<'a, S: ObjectStore + ?Sized> {
    config: &'a Config,
    store: &'a S,
    loader: ArtifactLoader<'a, S>,
    cancel: CancelToken,
}

impl<'a, S: ObjectStore + ?Sized> Reconciler<'a, S> {
    pub fn new(config: &'a Config, store: &'a S) -> Self {
        Self {
            config,
            store,
            loader: ArtifactLoader::new(store),
            cancel: CancelToken::new(),
        }
    }

    /// Abort at the next checkpoint once `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Use a custom artifact loader (parser/digester)
    pub fn with_loader(mut self, loader: ArtifactLoader<'a, S>) -> Self {
        self.loader = loader;
        self
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            tracing::warn!(%stage, "cancellation requested");
            return Err(ReconcileError::Cancelled { stage });
        }
        tracing::debug!(%stage, "entering stage");
        Ok(())
    }

    /// Read the existing index; a missing index object is an empty index.
    ///
    /// Only the configured project's section is parsed strictly.
    pub fn load_index(&self) -> Result<IndexDocument, ReconcileError> {
        let object = self.config.index_object.as_str();
        let raw = match self.store.read(object) {
            Ok(raw) => Some(raw),
            Err(e) if e.is_not_found() => {
                tracing::info!(object, "no existing index, starting empty");
                None
            }
            Err(e) => {
                return Err(ReconcileError::IndexReadFailed {
                    object: object.to_string(),
                    source: e,
                })
            }
        };

        IndexDocument::load_or_default(raw.as_deref(), &self.config.project).map_err(|e| {
            ReconcileError::IndexLoadFailed {
                object: object.to_string(),
                source: e,
            }
        })
    }

    /// Run every stage except Persist and return the reconciled document
    pub fn reconcile(&self) -> Result<(IndexDocument, ReconcileReport), ReconcileError> {
        let project = self.config.project.as_str();
        let mut report = ReconcileReport::default();

        self.checkpoint(Stage::Load)?;
        let mut index = self.load_index()?;

        self.checkpoint(Stage::Scan)?;
        let inventory = scan_inventory(self.store, project, &self.config.delimiter)?;
        tracing::info!(project, archives = inventory.len(), "scanned storage");

        self.checkpoint(Stage::Diff)?;
        let missing: Vec<(&Version, &str)> = inventory
            .iter()
            .filter(|(version, _)| !index.has(project, version))
            .collect();
        tracing::info!(project, missing = missing.len(), "versions missing from index");

        for (version, object) in missing {
            self.checkpoint(Stage::LoadArtifact)?;
            self.add_artifact(&mut index, version, object)?;
            report.added.push(version.clone());
        }

        self.checkpoint(Stage::Prune)?;
        report.pruned = self.prune(&mut index, &inventory);

        self.checkpoint(Stage::StampAndSort)?;
        index.stamp();
        index.sort_entries();

        report.total = index.project_entries(project).len();
        report.generated = index.generated;
        tracing::info!(
            project,
            added = report.added.len(),
            pruned = report.pruned.len(),
            total = report.total,
            generated = %report.generated,
            "reconciled index"
        );
        Ok((index, report))
    }

    fn add_artifact(
        &self,
        index: &mut IndexDocument,
        version: &Version,
        object: &str,
    ) -> Result<(), ReconcileError> {
        let project = self.config.project.as_str();
        let artifact = self.loader.load(object)?;

        if artifact.metadata.version != *version {
            return Err(ReconcileError::VersionMismatch {
                object: object.to_string(),
                file_version: version.clone(),
                chart_version: artifact.metadata.version,
            });
        }
        if artifact.metadata.name != project {
            tracing::warn!(
                object,
                chart = %artifact.metadata.name,
                project,
                "chart name differs from project; indexing under the project"
            );
        }

        tracing::info!(%version, object, digest = %artifact.digest, "adding entry");
        index.add(
            project,
            artifact.metadata,
            object,
            &self.config.base_url,
            artifact.digest,
        );
        Ok(())
    }

    fn prune(&self, index: &mut IndexDocument, inventory: &Inventory) -> Vec<Version> {
        let removed = index.prune(&self.config.project, &inventory.versions());
        removed
            .into_iter()
            .map(|entry| {
                tracing::info!(version = %entry.version(), "pruning entry without archive");
                entry.version().clone()
            })
            .collect()
    }

    /// Reconcile and write the result to the configured output
    pub fn run(&self) -> Result<ReconcileReport, ReconcileError> {
        let (index, report) = self.reconcile()?;
        self.checkpoint(Stage::Persist)?;
        persist(&index, &self.config.output)?;
        Ok(report)
    }
}

/// Write `index` to `sink`
pub fn persist(index: &IndexDocument, sink: &OutputSink) -> Result<(), ReconcileError> {
    match sink {
        OutputSink::File(path) => {
            index.write_file(path).map_err(ReconcileError::PersistFailed)?;
            tracing::info!(path = %path.display(), "index written");
        }
        OutputSink::Stdout => {
            write_index(index, io::stdout().lock())?;
        }
    }
    Ok(())
}

/// Write `index` to any writer
pub fn write_index<W: Write>(index: &IndexDocument, writer: W) -> Result<(), ReconcileError> {
    index.write_to(writer).map_err(ReconcileError::PersistFailed)
}

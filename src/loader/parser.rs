//! Chart archive parsing.

use std::io::{self, Read};
use std::path::{Component, Path};

use chart_index::ChartMetadata;
use flate2::read::GzDecoder;
use tar::Archive;

/// Name of the metadata file at the top of every chart
pub const CHART_FILE: &str = "Chart.yaml";

/// Errors from reading chart metadata out of an archive
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read archive: {0}")]
    Archive(#[from] io::Error),

    #[error("chart metadata (Chart.yaml) missing")]
    MissingChartFile,

    #[error("invalid Chart.yaml: {0}")]
    InvalidChartFile(#[from] serde_yaml::Error),

    #[error("Chart.yaml does not declare a chart name")]
    EmptyName,
}

/// Extracts chart metadata from archive bytes
pub trait ArchiveParser {
    fn parse(&self, archive: &[u8]) -> Result<ChartMetadata, ParseError>;
}

/// Parser for gzip-compressed tar chart packages (`helm package` output)
#[derive(Debug, Clone, Copy, Default)]
pub struct TgzChartParser;

/// `<chart-dir>/Chart.yaml`, ignoring `./` components. Subchart metadata
/// under `<chart-dir>/charts/` does not match.
fn is_top_level_chart_file(path: &Path) -> bool {
    let parts: Vec<_> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    matches!(
        parts.as_slice(),
        [Component::Normal(_), Component::Normal(file)] if *file == CHART_FILE
    )
}

impl ArchiveParser for TgzChartParser {
    fn parse(&self, archive: &[u8]) -> Result<ChartMetadata, ParseError> {
        let mut archive = Archive::new(GzDecoder::new(archive));

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            if !is_top_level_chart_file(&entry.path()?) {
                continue;
            }

            let mut yaml = String::new();
            entry.read_to_string(&mut yaml)?;

            let metadata = ChartMetadata::from_yaml(&yaml)?;
            if metadata.name.trim().is_empty() {
                return Err(ParseError::EmptyName);
            }
            return Ok(metadata);
        }

        Err(ParseError::MissingChartFile)
    }
}

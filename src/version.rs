//! Version extraction from archive object names
//!
//! Chart archives are stored as `<project><delimiter><version>.tgz`, e.g.
//! `demo-1.2.3.tgz` or `demo-2.0.0-rc.1.tgz`.

use semver::Version;

/// File extension of chart archives
pub const ARCHIVE_EXTENSION: &str = ".tgz";

/// Default separator between project name and version
pub const DEFAULT_DELIMITER: &str = "-";

/// A semantic version paired with the object it was parsed from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactVersion {
    pub version: Version,
    pub object_name: String,
}

/// Errors from parsing an archive name
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("'{file}' does not start with '{prefix}'")]
    MissingPrefix { file: String, prefix: String },

    #[error("'{file}' does not end with '.tgz'")]
    MissingExtension { file: String },

    #[error("invalid version format in '{file}': {source}")]
    InvalidVersionFormat {
        file: String,
        #[source]
        source: semver::Error,
    },
}

impl VersionError {
    /// Object name that failed to parse
    pub fn file(&self) -> &str {
        match self {
            VersionError::MissingPrefix { file, .. }
            | VersionError::MissingExtension { file }
            | VersionError::InvalidVersionFormat { file, .. } => file,
        }
    }
}

/// Parse the version out of `file`, which must be
/// `<project><delimiter><semver>.tgz`.
pub fn extract_version(
    project: &str,
    delimiter: &str,
    file: &str,
) -> Result<ArtifactVersion, VersionError> {
    let prefix = format!("{}{}", project, delimiter);

    let rest = file
        .strip_prefix(prefix.as_str())
        .ok_or_else(|| VersionError::MissingPrefix {
            file: file.to_string(),
            prefix: prefix.clone(),
        })?;

    let raw = rest
        .strip_suffix(ARCHIVE_EXTENSION)
        .ok_or_else(|| VersionError::MissingExtension {
            file: file.to_string(),
        })?;

    let version = Version::parse(raw).map_err(|e| VersionError::InvalidVersionFormat {
        file: file.to_string(),
        source: e,
    })?;

    Ok(ArtifactVersion {
        version,
        object_name: file.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_version() {
        let av = extract_version("demo", "-", "demo-1.0.0.tgz").unwrap();
        assert_eq!(av.version, Version::new(1, 0, 0));
        assert_eq!(av.object_name, "demo-1.0.0.tgz");
    }

    #[test]
    fn test_prerelease_and_build() {
        let av = extract_version("demo", "-", "demo-2.0.0-rc.1+build.5.tgz").unwrap();
        assert_eq!(av.version.to_string(), "2.0.0-rc.1+build.5");
    }

    #[test]
    fn test_hyphenated_project() {
        let av = extract_version("my-chart", "-", "my-chart-0.3.1.tgz").unwrap();
        assert_eq!(av.version, Version::new(0, 3, 1));
    }

    #[test]
    fn test_custom_delimiter() {
        let av = extract_version("demo", "_", "demo_1.2.3.tgz").unwrap();
        assert_eq!(av.version, Version::new(1, 2, 3));
    }

    #[test]
    fn test_not_a_version() {
        let err = extract_version("demo", "-", "demo-notaversion.tgz").unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersionFormat { .. }));
        assert_eq!(err.file(), "demo-notaversion.tgz");
        assert!(err.to_string().contains("demo-notaversion.tgz"));
    }

    #[test]
    fn test_partial_version_rejected() {
        let err = extract_version("demo", "-", "demo-1.0.tgz").unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersionFormat { .. }));
    }

    #[test]
    fn test_missing_prefix() {
        let err = extract_version("demo", "-", "other-1.0.0.tgz").unwrap_err();
        assert!(matches!(err, VersionError::MissingPrefix { .. }));
    }

    #[test]
    fn test_missing_extension() {
        let err = extract_version("demo", "-", "demo-1.0.0.tar.gz").unwrap_err();
        assert!(matches!(err, VersionError::MissingExtension { .. }));
    }

    #[test]
    fn test_ordering_is_semantic() {
        let a = extract_version("demo", "-", "demo-1.10.0.tgz").unwrap();
        let b = extract_version("demo", "-", "demo-1.9.0.tgz").unwrap();
        assert!(a > b);
    }
}

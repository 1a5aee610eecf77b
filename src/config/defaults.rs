//! Built-in defaults (lowest-precedence layer)

use chart_index::INDEX_FILE;

use crate::store::DEFAULT_ENDPOINT;
use crate::version::DEFAULT_DELIMITER;

/// Built-in default configuration values
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinDefaults {
    /// Name of the index object in the bucket (default: "index.yaml")
    pub index_object: String,

    /// Separator between project name and version (default: "-")
    pub delimiter: String,

    /// GCS JSON API endpoint
    pub endpoint: String,

    /// Per-request HTTP timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            index_object: INDEX_FILE.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Public download URL of a GCS bucket
pub fn gcs_bucket_url(bucket: &str) -> String {
    format!("https://{}.storage.googleapis.com/", bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.index_object, "index.yaml");
        assert_eq!(defaults.delimiter, "-");
        assert_eq!(defaults.endpoint, "https://storage.googleapis.com");
        assert_eq!(defaults.timeout_secs, 60);
    }

    #[test]
    fn test_gcs_bucket_url() {
        assert_eq!(
            gcs_bucket_url("my-charts"),
            "https://my-charts.storage.googleapis.com/"
        );
    }
}

//! Storage credentials
//!
//! Credentials are looked up in this order, first match wins:
//! 1. `--auth-path`: a raw access token, a JSON object with `access_token`,
//!    a service account key, or `authorized_user` credentials
//! 2. `GOOGLE_OAUTH_ACCESS_TOKEN`
//! 3. The file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! 4. gcloud's `application_default_credentials.json`
//! 5. The metadata server, when running on Compute Engine
//! 6. Anonymous access

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ConfigError;
use crate::store::auth::METADATA_HOST;
use crate::store::{AuthorizedUser, Credentials, ServiceAccountKey};

/// Environment variable holding a ready-made access token
pub const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Environment variable naming an application default credentials file
pub const ADC_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Overrides the metadata server host and forces its use
pub const METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

/// DMI product name; reads "Google Compute Engine" on GCE
pub const GCE_PRODUCT_NAME_FILE: &str = "/sys/class/dmi/id/product_name";

const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    access_token: Option<String>,
}

/// Resolve credentials from the process environment
pub fn resolve_from_env(auth_path: Option<&Path>) -> Result<Credentials, ConfigError> {
    resolve_credentials(
        auth_path,
        |name| std::env::var(name).ok(),
        Path::new(GCE_PRODUCT_NAME_FILE),
    )
}

/// Resolve credentials from an explicit file or the ambient environment.
///
/// `var` looks up environment variables; `product_name` is the DMI file used
/// to detect Compute Engine.
pub fn resolve_credentials<F>(
    auth_path: Option<&Path>,
    var: F,
    product_name: &Path,
) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(path) = auth_path {
        tracing::debug!(path = %path.display(), "using credential file");
        return read_credential_file(path);
    }
    if let Some(token) = var(TOKEN_ENV_VAR) {
        tracing::debug!("using access token from {}", TOKEN_ENV_VAR);
        return Ok(Credentials::AccessToken(token));
    }
    if let Some(path) = var(ADC_ENV_VAR) {
        tracing::debug!(path = %path, "using application default credentials");
        return read_credential_file(Path::new(&path));
    }
    if let Some(path) = well_known_file(&var).filter(|p| p.is_file()) {
        tracing::debug!(path = %path.display(), "using gcloud default credentials");
        return read_credential_file(&path);
    }
    if let Some(host) = var(METADATA_HOST_ENV_VAR) {
        return Ok(Credentials::MetadataServer(host));
    }
    if on_compute_engine(product_name) {
        return Ok(Credentials::MetadataServer(METADATA_HOST.to_string()));
    }

    tracing::debug!("no credentials found, using anonymous access");
    Ok(Credentials::Anonymous)
}

fn well_known_file(var: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(dir) = var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(dir).join(WELL_KNOWN_FILE));
    }
    #[cfg(windows)]
    let dir = var("APPDATA").map(|d| PathBuf::from(d).join("gcloud"));
    #[cfg(not(windows))]
    let dir = var("HOME").map(|d| PathBuf::from(d).join(".config").join("gcloud"));
    dir.map(|d| d.join(WELL_KNOWN_FILE))
}

fn on_compute_engine(product_name: &Path) -> bool {
    fs::read_to_string(product_name)
        .map(|name| name.contains("Google"))
        .unwrap_or(false)
}

fn read_credential_file(path: &Path) -> Result<Credentials, ConfigError> {
    let invalid = |reason: String| ConfigError::Credentials {
        path: path.to_path_buf(),
        reason,
    };

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw = raw.trim();

    if !raw.starts_with('{') {
        if raw.is_empty() {
            return Err(invalid("file is empty".to_string()));
        }
        return Ok(Credentials::AccessToken(raw.to_string()));
    }

    let file: CredentialFile =
        serde_json::from_str(raw).map_err(|e| invalid(format!("invalid JSON: {}", e)))?;
    match file.kind.as_deref() {
        Some("service_account") => {
            let key: ServiceAccountKey = serde_json::from_str(raw)
                .map_err(|e| invalid(format!("invalid service account key: {}", e)))?;
            Ok(Credentials::ServiceAccount(key))
        }
        Some("authorized_user") => {
            let user: AuthorizedUser = serde_json::from_str(raw)
                .map_err(|e| invalid(format!("invalid authorized_user credentials: {}", e)))?;
            Ok(Credentials::AuthorizedUser(user))
        }
        kind => match file.access_token {
            Some(token) if !token.trim().is_empty() => {
                Ok(Credentials::AccessToken(token.trim().to_string()))
            }
            _ => Err(invalid(match kind {
                Some(kind) => format!("unsupported credential type '{}'", kind),
                None => "no access_token field".to_string(),
            })),
        },
    }
}

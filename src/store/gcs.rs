//! Google Cloud Storage over the JSON API.
//!
//! Uses blocking `reqwest` with a per-request timeout, so a cancelled run
//! never waits on a hung connection for longer than that timeout.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::auth::{self, Credentials};
use super::{ObjectStore, StoreError};

/// Public GCS JSON API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Page size requested from the listing API
const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

/// A GCS bucket
pub struct GcsObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl std::fmt::Debug for GcsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsObjectStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl GcsObjectStore {
    /// Create a client for `bucket`, obtaining an access token up front.
    ///
    /// With [`Credentials::Anonymous`], requests carry no token and only
    /// public buckets work.
    pub fn new(
        bucket: &str,
        endpoint: Url,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chart-indexer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Http {
                object: bucket.to_string(),
                source: e,
            })?;
        let token = auth::access_token(&client, credentials)?;

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.to_string(),
            token,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `<endpoint>/storage/v1/b/<bucket>/o[/<name>]`
    fn objects_url(&self, name: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidName(self.endpoint.to_string()))?;
            segments.pop_if_empty();
            segments.extend(["storage", "v1", "b", self.bucket.as_str(), "o"]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder, object: &str) -> Result<Response, StoreError> {
        let response = request.send().map_err(|e| StoreError::Http {
            object: object.to_string(),
            source: e,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(object.to_string()));
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(StoreError::Status {
                object: object.to_string(),
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        Ok(response)
    }
}

impl ObjectStore for GcsObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let url = self.objects_url(None)?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = LIST_PAGE_SIZE.to_string();

        loop {
            let mut query = vec![
                ("prefix", prefix),
                ("fields", "items(name),nextPageToken"),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let request = self.get(url.clone()).query(&query);
            // A 404 here means the bucket itself is missing, which is not the
            // "object not found" condition callers tolerate.
            let response = match self.send(request, prefix) {
                Err(StoreError::NotFound(_)) => {
                    return Err(StoreError::Status {
                        object: prefix.to_string(),
                        status: StatusCode::NOT_FOUND.as_u16(),
                        message: format!("bucket '{}' not found", self.bucket),
                    })
                }
                other => other?,
            };

            let page: ListResponse = response.json().map_err(|e| StoreError::Http {
                object: prefix.to_string(),
                source: e,
            })?;

            tracing::trace!(count = page.items.len(), "listed page");
            names.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.objects_url(Some(name))?;
        let request = self.get(url).query(&[("alt", "media")]);
        let response = self.send(request, name)?;

        let bytes = response.bytes().map_err(|e| StoreError::Http {
            object: name.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

//! Google Cloud Storage backend
//!
//! Talks to the GCS JSON API directly. Requests are billed to
//! `user_project`, which must be set for requester-pays buckets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::{BlobInfo, BlobStore, StorageError, StorageResult};

const API_BASE: &str = "https://storage.googleapis.com";
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    updated: DateTime<Utc>,
}

pub struct GcsBlobStore {
    http: Client,
    base: Url,
    bucket: String,
    user_project: Option<String>,
    token: OnceCell<String>,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>, user_project: Option<String>) -> StorageResult<Self> {
        let base = Url::parse(API_BASE).map_err(|e| StorageError::Backend(e.to_string()))?;
        Self::with_base_url(base, bucket, user_project)
    }

    /// Point at a different endpoint (e.g. a local emulator)
    pub fn with_base_url(
        base: Url,
        bucket: impl Into<String>,
        user_project: Option<String>,
    ) -> StorageResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("gh-pr-rollout/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            bucket: bucket.into(),
            user_project,
            token: OnceCell::new(),
        })
    }

    /// Use a fixed access token instead of resolving one
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: OnceCell::new_with(Some(token.into())),
            ..self
        }
    }

    /// `<base>/<prefix...>/b/<bucket>/o[/<object>]`
    fn object_url(&self, prefix: &[&str], object: Option<&str>) -> StorageResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Backend(format!("invalid base URL {}", self.base)))?;
            segments.pop_if_empty();
            segments.extend(prefix);
            segments.extend(["b", self.bucket.as_str(), "o"]);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    async fn access_token(&self) -> StorageResult<&str> {
        let token = self.token.get_or_try_init(resolve_access_token).await?;
        Ok(token.as_str())
    }

    async fn send(&self, request: RequestBuilder, key: &str) -> StorageResult<Response> {
        let mut request = request.bearer_auth(self.access_token().await?);
        if let Some(project) = &self.user_project {
            request = request.query(&[("userProject", project.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Backend(format!(
            "gs://{}/{}: {} {}",
            self.bucket,
            key,
            status,
            body.trim()
        )))
    }
}

/// Token from the environment, else from the gcloud CLI
async fn resolve_access_token() -> StorageResult<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            debug!("Using GCS access token from {}", TOKEN_ENV);
            return Ok(token);
        }
    }

    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await?;

    if !output.status.success() {
        return Err(StorageError::Backend(format!(
            "gcloud auth print-access-token failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(StorageError::Backend(
            "gcloud returned an empty access token, run 'gcloud auth login'".to_string(),
        ));
    }
    debug!("Using GCS access token from gcloud");
    Ok(token)
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> StorageResult<()> {
        let url = self.object_url(&["upload", "storage", "v1"], None)?;
        let request = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request, key).await?;
        debug!("Uploaded gs://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let url = self.object_url(&["storage", "v1"], Some(key))?;
        let request = self.http.get(url).query(&[("alt", "media")]);
        let response = self.send(request, key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn list(&self) -> StorageResult<Vec<BlobInfo>> {
        let url = self.object_url(&["storage", "v1"], None)?;
        let mut blobs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ObjectList = self.send(request, "").await?.json().await?;

            blobs.extend(page.items.into_iter().map(|object| BlobInfo {
                key: object.name,
                updated: object.updated,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} objects in gs://{}", blobs.len(), self.bucket);
        Ok(blobs)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let url = self.object_url(&["storage", "v1"], Some(key))?;
        self.send(self.http.delete(url), key).await?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("gs://{}", self.bucket)
    }
}

//! JetBrains Space HTTP API client
//!
//! Only two endpoints are used: the project's repository list (names only)
//! and the per-repository clone URL lookup.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::discovery::Discovery;

/// Errors from the Space HTTP API
#[derive(Debug, Error)]
pub enum SpaceApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{reason}")]
    Status { status: StatusCode, reason: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Response has no `{0}` field")]
    MissingField(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SpaceApiError {
    fn from_status(status: StatusCode) -> Self {
        let reason = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string());
        Self::Status { status, reason }
    }
}

/// Client for one Space project, authenticated with a bearer token
pub struct SpaceClient {
    client: Client,
    base_url: String,
    project_key: String,
    token: String,
}

impl SpaceClient {
    pub fn new(
        base_url: impl Into<String>,
        project_key: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_key: project_key.into(),
            token: token.into(),
        }
    }

    pub fn from_session(session: &SessionConfig) -> Self {
        Self::new(
            session.service_url.as_str(),
            session.project_key.as_str(),
            session.bearer_token.as_str(),
        )
    }

    fn project_url(&self) -> String {
        format!("{}/api/http/projects/key:{}", self.base_url, self.project_key)
    }

    /// URL listing the project's repositories, with only `name` selected
    pub fn repositories_url(&self) -> String {
        format!("{}?$fields=repos(name)", self.project_url())
    }

    /// URL resolving the clone URLs of one repository
    ///
    /// The name is percent-encoded as a single path segment.
    pub fn clone_url_url(&self, repo_name: &str) -> Result<Url, SpaceApiError> {
        let project_url = self.project_url();
        let mut url = Url::parse(&project_url)
            .map_err(|e| SpaceApiError::InvalidUrl(format!("{}: {}", project_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SpaceApiError::InvalidUrl(project_url.clone()))?
            .extend(["repositories", repo_name, "url"]);
        Ok(url)
    }

    async fn get_json(&self, url: &str) -> Result<Value, SpaceApiError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpaceApiError::from_status(status));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// List repository names of the project, in API order
    pub async fn fetch_repository_names(&self) -> Result<Vec<String>, SpaceApiError> {
        let body = self.get_json(&self.repositories_url()).await?;
        parse_repository_names(&body)
    }

    /// Resolve the HTTP clone URL of a repository
    pub async fn fetch_clone_url(&self, repo_name: &str) -> Result<String, SpaceApiError> {
        let url = self.clone_url_url(repo_name)?;
        let body = self.get_json(url.as_str()).await?;
        parse_clone_url(&body)
    }
}

/// Extract `repos[].name` from a project response
///
/// Entries without a string `name` are skipped.
pub fn parse_repository_names(body: &Value) -> Result<Vec<String>, SpaceApiError> {
    let repos = body
        .get("repos")
        .and_then(Value::as_array)
        .ok_or(SpaceApiError::MissingField("repos"))?;

    let names = repos
        .iter()
        .filter_map(|repo| {
            let name = repo.get("name").and_then(Value::as_str);
            if name.is_none() {
                warn!("Ignoring repository entry without a name: {}", repo);
            }
            name.map(str::to_string)
        })
        .collect();

    Ok(names)
}

/// Clone URLs of one repository; only the HTTP one is used
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryUrls {
    http_url: Option<String>,
}

/// Extract `httpUrl` from a repository URL response
///
/// An empty `httpUrl` counts as missing.
pub fn parse_clone_url(body: &Value) -> Result<String, SpaceApiError> {
    RepositoryUrls::deserialize(body)?
        .http_url
        .filter(|url| !url.is_empty())
        .ok_or(SpaceApiError::MissingField("httpUrl"))
}

#[async_trait]
impl Discovery for SpaceClient {
    async fn list_repository_names(&self) -> Vec<String> {
        match self.fetch_repository_names().await {
            Ok(names) => {
                info!(
                    "Found {} repositories in project {}",
                    names.len(),
                    self.project_key
                );
                names
            }
            Err(e) => {
                warn!("Failed to retrieve repositories: {}", e);
                Vec::new()
            }
        }
    }

    async fn resolve_clone_url(&self, repo_name: &str) -> Option<String> {
        match self.fetch_clone_url(repo_name).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Failed to get clone URL for repository {}: {}", repo_name, e);
                None
            }
        }
    }
}

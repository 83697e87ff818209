//! Terraform Cloud workspace client.
//!
//! Only the two calls the orchestrator needs: create a workspace (local
//! execution mode, state only) and read a workspace's current outputs.

use crate::config::Settings;
use crate::outputs::WorkspaceOutputs;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

const JSON_API: &str = "application/vnd.api+json";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TfcError {
    #[error("TFC_TOKEN is not set: create a Terraform Cloud API token and export TFC_TOKEN")]
    Unauthenticated,

    #[error("workspace '{0}' already exists")]
    Conflict(String),

    #[error("Terraform Cloud rejected the token (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("workspace '{0}' has no state outputs yet")]
    NotFound(String),

    #[error("Terraform Cloud returned a non-200 status code {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid output '{output}' in workspace '{workspace}': {message}")]
    Decode {
        workspace: String,
        output: String,
        message: String,
    },

    #[error("request to Terraform Cloud failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TfcError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, TfcError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TfcError::NotFound(_))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceHandle {
    pub id: String,
    pub name: String,
    pub execution_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct WorkspaceData {
    id: String,
    attributes: WorkspaceAttributes,
}

#[derive(Debug, Deserialize)]
struct WorkspaceAttributes {
    name: String,
    #[serde(rename = "execution-mode", default)]
    execution_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputData {
    attributes: OutputAttributes,
}

#[derive(Debug, Deserialize)]
struct OutputAttributes {
    name: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    sensitive: bool,
}

impl From<WorkspaceData> for WorkspaceHandle {
    fn from(data: WorkspaceData) -> Self {
        Self {
            id: data.id,
            name: data.attributes.name,
            execution_mode: data.attributes.execution_mode,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TfcClient {
    /// Base URL without trailing slash, e.g. `https://app.terraform.io`.
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl TfcClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TfcError> {
        let http = Client::builder()
            .user_agent(concat!("stackctl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            http,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TfcError> {
        Self::new(
            settings.tfc_address(),
            settings.tfc_token().map(str::to_string),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2{path}", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap, TfcError> {
        let token = self.token.as_deref().ok_or(TfcError::Unauthenticated)?;
        let mut headers = HeaderMap::new();
        let bearer =
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| TfcError::Unauthenticated)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
        Ok(headers)
    }

    /// Create `name` under `org`. An existing workspace yields
    /// [`TfcError::Conflict`], which callers treat as success.
    pub async fn create_workspace(&self, org: &str, name: &str) -> Result<WorkspaceHandle, TfcError> {
        let headers = self.headers()?;
        let body = json!({
            "data": {
                "type": "workspaces",
                "attributes": {
                    "name": name,
                    "execution-mode": "local"
                }
            }
        });
        let resp = self
            .http
            .post(self.url(&format!("/organizations/{org}/workspaces")))
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let doc: Document<WorkspaceData> = resp.json().await?;
            tracing::debug!("created workspace {name} ({})", doc.data.id);
            return Ok(doc.data.into());
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("taken") {
            return Err(TfcError::Conflict(name.to_string()));
        }
        Err(status_error(status, body))
    }

    pub async fn get_workspace(&self, org: &str, name: &str) -> Result<WorkspaceHandle, TfcError> {
        let headers = self.headers()?;
        let resp = self
            .http
            .get(self.url(&format!("/organizations/{org}/workspaces/{name}")))
            .headers(headers)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TfcError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(status, resp.text().await.unwrap_or_default()));
        }
        let doc: Document<WorkspaceData> = resp.json().await?;
        Ok(doc.data.into())
    }

    /// Current state outputs of `name`. A workspace that does not exist or
    /// has never been applied yields [`TfcError::NotFound`].
    pub async fn get_outputs(&self, org: &str, name: &str) -> Result<WorkspaceOutputs, TfcError> {
        let workspace = self.get_workspace(org, name).await?;
        let resp = self
            .http
            .get(self.url(&format!(
                "/workspaces/{}/current-state-version-outputs",
                workspace.id
            )))
            .headers(self.headers()?)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TfcError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(status, resp.text().await.unwrap_or_default()));
        }

        let doc: Document<Vec<OutputData>> = resp.json().await?;
        if doc.data.is_empty() {
            return Err(TfcError::NotFound(name.to_string()));
        }
        let pairs = doc.data.into_iter().filter_map(|o| {
            if o.attributes.value.is_null() {
                tracing::debug!(
                    "skipping output {} of {name} (sensitive: {})",
                    o.attributes.name,
                    o.attributes.sensitive
                );
                None
            } else {
                Some((o.attributes.name, o.attributes.value))
            }
        });
        WorkspaceOutputs::decode(pairs).map_err(|(output, e)| TfcError::Decode {
            workspace: name.to_string(),
            output,
            message: e.to_string(),
        })
    }
}

fn status_error(status: StatusCode, body: String) -> TfcError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TfcError::Unauthorized {
            status: status.as_u16(),
        },
        _ => TfcError::Http {
            status: status.as_u16(),
            body,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

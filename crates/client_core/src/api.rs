//! HTTP access to the findings backend.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::ApiError,
    protocol::{DecisionRequest, DecisionResponse, IngestSummary, SimulationRequest, SimulationResult},
};
use tracing::info;
use url::Url;

use crate::{error::ClientError, sse::HttpEventSource};

const API_PREFIX: &str = "api/v1/";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request/response calls the interactive workflows depend on.
#[async_trait]
pub trait FindingsApi: Send + Sync {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResult, ClientError>;
    async fn submit_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<DecisionResponse, ClientError>;
}

pub struct MissingFindingsApi;

#[async_trait]
impl FindingsApi for MissingFindingsApi {
    async fn simulate(&self, _request: &SimulationRequest) -> Result<SimulationResult, ClientError> {
        Err(ApiError::new(503, "findings backend is unavailable").into())
    }

    async fn submit_decision(
        &self,
        _request: &DecisionRequest,
    ) -> Result<DecisionResponse, ClientError> {
        Err(ApiError::new(503, "findings backend is unavailable").into())
    }
}

#[derive(Clone)]
pub struct HttpFindingsApi {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpFindingsApi {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let base_url = normalize_server_url(server_url)?;
        // No overall timeout on the client: the findings stream stays open for
        // the whole scan. Plain requests set their own.
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self
            .base_url
            .join(&format!("{API_PREFIX}{}", path.trim_start_matches('/')))?)
    }

    /// A fresh, not yet opened subscription to the findings stream.
    pub fn findings_source(&self) -> Result<HttpEventSource, ClientError> {
        Ok(HttpEventSource::new(self.http.clone(), self.endpoint("findings")?))
    }

    /// Uploads the assignments CSV and, optionally, a policies CSV.
    pub async fn ingest(
        &self,
        assignments: &Path,
        policies: Option<&Path>,
    ) -> Result<IngestSummary, ClientError> {
        let mut form = multipart::Form::new().part("assignments", csv_part(assignments).await?);
        if let Some(policies) = policies {
            form = form.part("policies", csv_part(policies).await?);
        }
        let request = self.http.post(self.endpoint("ingest")?).multipart(form);
        let summary: IngestSummary = self.execute(request).await?;
        info!(
            valid_assignment_rows = summary.valid_assignment_rows,
            valid_policies = summary.valid_policies,
            "api: ingest accepted"
        );
        Ok(summary)
    }

    /// Downloads the audit evidence document as raw JSON.
    pub async fn evidence(&self) -> Result<serde_json::Value, ClientError> {
        let request = self.http.get(self.endpoint("evidence")?);
        self.execute(request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)?).json(body);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.timeout(self.request_timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl FindingsApi for HttpFindingsApi {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResult, ClientError> {
        self.post_json("simulate", request).await
    }

    async fn submit_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<DecisionResponse, ClientError> {
        self.post_json("decisions", request).await
    }
}

/// Parses the server root and guarantees a trailing slash so endpoint paths
/// join underneath it.
pub fn normalize_server_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::UnsupportedScheme(raw.trim().to_string()));
    }
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

async fn csv_part(path: &Path) -> Result<multipart::Part, ClientError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !file_name.to_ascii_lowercase().ends_with(".csv") {
        return Err(ClientError::InvalidUpload(format!(
            "{} must be a .csv file",
            path.display()
        )));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::Upload {
            path: path.display().to_string(),
            source,
        })?;
    Ok(multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("text/csv")?)
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;

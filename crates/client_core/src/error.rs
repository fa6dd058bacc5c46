use shared::{domain::UserId, error::ApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("server url must start with http:// or https://: {0}")]
    UnsupportedScheme(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request: {0}")]
    Api(#[from] ApiError),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read upload '{path}': {source}")]
    Upload {
        path: String,
        source: std::io::Error,
    },
    #[error("{0}")]
    InvalidUpload(String),
}

/// Failures of the simulation and decision workflows. Validation failures are
/// raised before any request is issued.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("user {0} is not part of the current scan")]
    UnknownUser(UserId),
    #[error("a decision was already recorded for user {0}")]
    AlreadyDecided(UserId),
    #[error("a decision for user {0} is still being submitted")]
    InFlight(UserId),
    #[error(transparent)]
    Request(#[from] ClientError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        !matches!(self, WorkflowError::Request(_))
    }
}

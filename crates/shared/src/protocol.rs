use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DecisionKind, Justification, PolicyId, UserId, ViolationProfile};

/// Named SSE event the backend emits once every finding has been sent.
pub const DONE_EVENT: &str = "done";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("stream item is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("stream item is not a JSON object")]
    NotAnObject,
    #[error("malformed finding profile: {0}")]
    MalformedProfile(#[source] serde_json::Error),
    #[error("malformed justification: {0}")]
    MalformedJustification(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingItem {
    pub profile: ViolationProfile,
    #[serde(default)]
    pub justification: Option<Justification>,
}

impl FindingItem {
    pub fn user_id(&self) -> &UserId {
        self.profile.user_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    pub user_id: UserId,
    pub message: String,
}

/// One decoded message from the findings stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Finding(FindingItem),
    Error(ErrorItem),
    /// A structurally valid message that carries neither a profile nor an error,
    /// e.g. the `{}` payload sent for an empty scan.
    MissingProfile,
}

#[derive(Debug, Deserialize)]
struct RawStreamItem {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    profile: Option<serde_json::Value>,
    #[serde(default)]
    justification: Option<serde_json::Value>,
}

impl StreamItem {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(ProtocolError::InvalidJson)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let raw: RawStreamItem =
            serde_json::from_value(value).map_err(ProtocolError::InvalidJson)?;

        if raw.error.as_ref().is_some_and(is_truthy) {
            return Ok(StreamItem::Error(ErrorItem {
                user_id: raw.user_id.unwrap_or_else(|| UserId::new("unknown")),
                message: raw
                    .message
                    .unwrap_or_else(|| "finding could not be generated".to_string()),
            }));
        }

        let Some(profile) = raw.profile.filter(|profile| !profile.is_null()) else {
            return Ok(StreamItem::MissingProfile);
        };
        let profile: ViolationProfile =
            serde_json::from_value(profile).map_err(ProtocolError::MalformedProfile)?;
        let justification = match raw.justification {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value(value).map_err(ProtocolError::MalformedJustification)?,
            ),
        };

        Ok(StreamItem::Finding(FindingItem {
            profile,
            justification,
        }))
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::Null => false,
        serde_json::Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub user_id: UserId,
    pub role_to_remove: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_removed: Option<String>,
    pub resolved: bool,
    pub message: String,
    #[serde(default)]
    pub violations_remaining: Vec<PolicyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub user_id: UserId,
    pub decision: DecisionKind,
    pub roles_to_revoke: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_decisions: Option<u64>,
}

/// Row counts returned by the ingest endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub total_assignment_rows: u64,
    pub valid_assignment_rows: u64,
    pub corrupt_assignment_rows: u64,
    pub total_policy_rows: u64,
    pub valid_policies: u64,
    pub corrupt_policies: u64,
    #[serde(default)]
    pub filtered_policies_single_role: u64,
    pub users_processed: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    #[serde(default)]
    pub users_with_single_role_filtered: u64,
    #[serde(default)]
    pub total_active_roles: u64,
    #[serde(default)]
    pub unique_active_roles: u64,
}

/// Text-generation provider state as reported in the evidence metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmStatus {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub using_mock: bool,
    #[serde(default)]
    pub fallback: bool,
    #[serde(default)]
    pub model_identifier: String,
}

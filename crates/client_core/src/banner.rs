//! Text-generation provider banner.

use std::fmt;

use shared::protocol::LlmStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderBanner {
    Live { model_identifier: String },
    Mocked { model_identifier: String },
    /// A live provider was configured but the backend fell back to the mock.
    FallbackMock { model_identifier: String },
}

impl ProviderBanner {
    pub fn from_status(status: &LlmStatus) -> Self {
        let model_identifier = status.model_identifier.clone();
        if status.fallback {
            ProviderBanner::FallbackMock { model_identifier }
        } else if status.using_mock {
            ProviderBanner::Mocked { model_identifier }
        } else {
            ProviderBanner::Live { model_identifier }
        }
    }

    /// Reads `metadata.llm_status` from an evidence document.
    pub fn from_evidence(evidence: &serde_json::Value) -> Option<Self> {
        let status = evidence.get("metadata")?.get("llm_status")?;
        serde_json::from_value::<LlmStatus>(status.clone())
            .ok()
            .map(|status| Self::from_status(&status))
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ProviderBanner::Live { .. })
    }
}

impl fmt::Display for ProviderBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderBanner::Live { model_identifier } => {
                write!(f, "Justifications generated live by {model_identifier}")
            }
            ProviderBanner::Mocked { model_identifier } => {
                write!(f, "Mock mode: justifications are simulated ({model_identifier})")
            }
            ProviderBanner::FallbackMock { model_identifier } => write!(
                f,
                "Live provider unavailable; fell back to simulated justifications ({model_identifier})"
            ),
        }
    }
}

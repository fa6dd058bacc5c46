use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(PolicyId);
id_newtype!(FindingId);

/// Substring of a model identifier that marks a simulated (mock) justification.
pub const SIMULATED_MODEL_SENTINEL: &str = "mock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    #[serde(other)]
    Unknown,
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(default)]
    pub role: String,
    pub source_system: String,
    /// ISO-8601 grant time; kept as text because the backend may omit the offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub status: UserStatus,
    #[serde(default)]
    pub active_roles: BTreeMap<String, RoleAssignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_systems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub policy_id: PolicyId,
    pub description: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationProfile {
    pub finding_id: FindingId,
    pub user: UserDetails,
    pub reason: String,
    pub conflicting_role_set: BTreeSet<String>,
    pub violated_policies: Vec<PolicyViolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ViolationProfile {
    pub fn user_id(&self) -> &UserId {
        &self.user.user_id
    }

    pub fn has_conflicting_role(&self, role: &str) -> bool {
        self.conflicting_role_set.contains(role)
    }

    /// Source system of a granted role, if the role is present in `active_roles`.
    pub fn source_system_for(&self, role: &str) -> Option<&str> {
        self.user
            .active_roles
            .get(role)
            .map(|assignment| assignment.source_system.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub model_identifier: String,
    pub risk: String,
    pub action: String,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_id: Option<FindingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_redacted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl Justification {
    pub fn is_simulated(&self) -> bool {
        self.model_identifier
            .to_ascii_lowercase()
            .contains(SIMULATED_MODEL_SENTINEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    AcceptRisk,
    RevokeRole,
    Investigate,
}

impl DecisionKind {
    pub fn requires_roles(self) -> bool {
        matches!(self, DecisionKind::RevokeRole)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionKind::AcceptRisk => "accept_risk",
            DecisionKind::RevokeRole => "revoke_role",
            DecisionKind::Investigate => "investigate",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DecisionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accept_risk" | "approve" => Ok(DecisionKind::AcceptRisk),
            "revoke_role" | "revoke" => Ok(DecisionKind::RevokeRole),
            "investigate" | "reject" => Ok(DecisionKind::Investigate),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

//! Remediation decision drafting and validation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shared::{
    domain::{DecisionKind, UserId},
    protocol::DecisionRequest,
};

use crate::{error::WorkflowError, registry::FindingRegistry};

/// Form state as the operator fills it in. Role selections may be stale from
/// an earlier choice; they only matter for a revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionDraft {
    pub user_id: UserId,
    pub decision: Option<DecisionKind>,
    pub selected_roles: BTreeSet<String>,
    pub notes: Option<String>,
    pub decided_by: String,
}

impl DecisionDraft {
    pub fn new(user_id: UserId, decided_by: impl Into<String>) -> Self {
        Self {
            user_id,
            decision: None,
            selected_roles: BTreeSet::new(),
            notes: None,
            decided_by: decided_by.into(),
        }
    }

    pub fn with_decision(mut self, decision: DecisionKind) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn select_role(mut self, role: impl Into<String>) -> Self {
        self.selected_roles.insert(role.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validates the draft against the user's conflicting roles.
    pub fn into_request(
        self,
        conflicting_roles: &BTreeSet<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionRequest, WorkflowError> {
        let decision = self
            .decision
            .ok_or_else(|| WorkflowError::validation("choose a decision before submitting"))?;
        let decided_by = self.decided_by.trim();
        if decided_by.is_empty() {
            return Err(WorkflowError::validation("decided_by must not be empty"));
        }

        let roles_to_revoke = if decision.requires_roles() {
            if self.selected_roles.is_empty() {
                return Err(WorkflowError::validation(
                    "select at least one role to revoke",
                ));
            }
            if let Some(unknown) = self
                .selected_roles
                .iter()
                .find(|role| !conflicting_roles.contains(*role))
            {
                return Err(WorkflowError::validation(format!(
                    "role {unknown} is not one of the conflicting roles of user {}",
                    self.user_id
                )));
            }
            self.selected_roles
        } else {
            BTreeSet::new()
        };

        Ok(DecisionRequest {
            user_id: self.user_id,
            decision,
            roles_to_revoke,
            notes: self
                .notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
            decided_by: decided_by.to_string(),
            decided_at,
        })
    }
}

/// Pre-filled state for the decision dialog of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionForm {
    pub available_roles: Vec<String>,
    pub draft: DecisionDraft,
}

pub fn open_decision(
    registry: &FindingRegistry,
    user_id: &UserId,
    decided_by: &str,
) -> Result<DecisionForm, WorkflowError> {
    let entry = registry
        .get(user_id)
        .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;
    Ok(DecisionForm {
        available_roles: entry.conflicting_roles().map(str::to_string).collect(),
        draft: DecisionDraft::new(user_id.clone(), decided_by),
    })
}

#[cfg(test)]
#[path = "tests/decision_tests.rs"]
mod tests;

//! What-if role removal.

use std::fmt;

use shared::{
    domain::{PolicyId, UserId},
    protocol::{SimulationRequest, SimulationResult},
};

use crate::{error::WorkflowError, registry::FindingRegistry};

pub const NON_DESTRUCTIVE_NOTICE: &str = "Simulation only: no access has been changed.";

/// Pre-filled state for the simulation dialog of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationForm {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub selected: Option<String>,
}

pub fn open_simulation(
    registry: &FindingRegistry,
    user_id: &UserId,
    preselected: Option<&str>,
) -> Result<SimulationForm, WorkflowError> {
    let entry = registry
        .get(user_id)
        .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;
    let selected = preselected
        .filter(|role| entry.profile.has_conflicting_role(role))
        .map(str::to_string);
    Ok(SimulationForm {
        user_id: user_id.clone(),
        roles: entry.conflicting_roles().map(str::to_string).collect(),
        selected,
    })
}

/// Checks the selection against the registry and builds the request.
pub fn prepare_simulation(
    registry: &FindingRegistry,
    user_id: &UserId,
    role: Option<&str>,
) -> Result<SimulationRequest, WorkflowError> {
    let role = role
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .ok_or_else(|| WorkflowError::validation("select a role to simulate removing"))?;
    let entry = registry
        .get(user_id)
        .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;
    if !entry.profile.has_conflicting_role(role) {
        return Err(WorkflowError::validation(format!(
            "role {role} is not one of the conflicting roles of user {user_id}"
        )));
    }
    Ok(SimulationRequest {
        user_id: user_id.clone(),
        role_to_remove: role.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Resolved,
    Unresolved { remaining: Vec<PolicyId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationView {
    pub user_id: UserId,
    pub role_removed: String,
    pub message: String,
    pub outcome: SimulationOutcome,
}

impl SimulationView {
    pub fn new(request: &SimulationRequest, result: SimulationResult) -> Self {
        let outcome = if result.resolved {
            SimulationOutcome::Resolved
        } else {
            SimulationOutcome::Unresolved {
                remaining: result.violations_remaining,
            }
        };
        Self {
            user_id: request.user_id.clone(),
            role_removed: result
                .role_removed
                .unwrap_or_else(|| request.role_to_remove.clone()),
            message: result.message,
            outcome,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, SimulationOutcome::Resolved)
    }

    /// Remaining violated policies; empty when the removal resolves everything.
    pub fn remaining(&self) -> &[PolicyId] {
        match &self.outcome {
            SimulationOutcome::Resolved => &[],
            SimulationOutcome::Unresolved { remaining } => remaining,
        }
    }

    pub fn notice(&self) -> &'static str {
        NON_DESTRUCTIVE_NOTICE
    }
}

impl fmt::Display for SimulationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        if let SimulationOutcome::Unresolved { remaining } = &self.outcome {
            writeln!(f, "Remaining violations:")?;
            for policy_id in remaining {
                writeln!(f, "  - {policy_id}")?;
            }
        }
        write!(f, "{NON_DESTRUCTIVE_NOTICE}")
    }
}

#[cfg(test)]
#[path = "tests/simulation_tests.rs"]
mod tests;

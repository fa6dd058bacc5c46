//! Row descriptions for the findings table.
//!
//! Rows are plain values built from a profile and its optional justification.
//! The table only ever appends rows; the one in-place change is the resolved
//! marker applied after a decision is recorded. The `Display` impls give a
//! plain-text rendering used by the console.

use std::fmt;

use shared::{
    domain::{Justification, PolicyId, UserId, UserStatus, ViolationProfile},
    protocol::ErrorItem,
};

pub const EMPTY_STATE_MESSAGE: &str = "No violations found.";
const UNKNOWN_SOURCE_SYSTEM: &str = "unknown";
const ROLE_SEPARATOR: &str = " + ";

/// Keeps the first character of the local part and the full domain.
pub fn mask_email(email: &str) -> String {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return "***@***".to_string();
    };
    match local.chars().next() {
        Some(first) => format!("{first}***@{domain}"),
        None => format!("***@{domain}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Active,
    Inactive,
    Unknown,
}

impl From<&UserStatus> for StatusIndicator {
    fn from(status: &UserStatus) -> Self {
        match status {
            UserStatus::Active => StatusIndicator::Active,
            UserStatus::Inactive => StatusIndicator::Inactive,
            UserStatus::Unknown => StatusIndicator::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBadge {
    pub role: String,
    pub source_system: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyLine {
    pub policy_id: PolicyId,
    pub roles: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JustificationView {
    pub model_identifier: String,
    pub risk: String,
    pub action: String,
    pub rationale: String,
    /// Produced by the mock provider rather than a live model.
    pub simulated: bool,
}

impl From<&Justification> for JustificationView {
    fn from(justification: &Justification) -> Self {
        Self {
            model_identifier: justification.model_identifier.clone(),
            risk: justification.risk.clone(),
            action: justification.action.clone(),
            rationale: justification.rationale.clone(),
            simulated: justification.is_simulated(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArea {
    /// Take-action controls are live; `simulation_roles` lists the roles the
    /// what-if selector offers for this user.
    Pending {
        user_id: UserId,
        simulation_roles: Vec<String>,
    },
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingRow {
    pub user_id: UserId,
    pub finding_id: String,
    pub name: String,
    pub masked_email: String,
    pub department: String,
    pub status: StatusIndicator,
    pub role_badges: Vec<RoleBadge>,
    pub policies: Vec<PolicyLine>,
    pub reason: String,
    pub justification: Option<JustificationView>,
    pub action: ActionArea,
}

impl FindingRow {
    pub fn is_decided(&self) -> bool {
        matches!(self.action, ActionArea::Resolved)
    }
}

pub fn render_finding(
    profile: &ViolationProfile,
    justification: Option<&Justification>,
) -> FindingRow {
    let role_badges = profile
        .conflicting_role_set
        .iter()
        .map(|role| RoleBadge {
            role: role.clone(),
            source_system: profile
                .source_system_for(role)
                .unwrap_or(UNKNOWN_SOURCE_SYSTEM)
                .to_string(),
        })
        .collect();
    let policies = profile
        .violated_policies
        .iter()
        .map(|policy| PolicyLine {
            policy_id: policy.policy_id.clone(),
            roles: policy.roles.join(ROLE_SEPARATOR),
        })
        .collect();

    FindingRow {
        user_id: profile.user_id().clone(),
        finding_id: profile.finding_id.to_string(),
        name: profile.user.name.clone(),
        masked_email: mask_email(&profile.user.email),
        department: profile.user.department.clone(),
        status: StatusIndicator::from(&profile.user.status),
        role_badges,
        policies,
        reason: profile.reason.clone(),
        justification: justification.map(JustificationView::from),
        action: ActionArea::Pending {
            user_id: profile.user_id().clone(),
            simulation_roles: profile.conflicting_role_set.iter().cloned().collect(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRow {
    pub user_id: UserId,
    pub message: String,
}

impl From<&ErrorItem> for ErrorRow {
    fn from(item: &ErrorItem) -> Self {
        Self {
            user_id: item.user_id.clone(),
            message: item.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Finding(FindingRow),
    Error(ErrorRow),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTable {
    rows: Vec<Row>,
    empty_state: bool,
}

impl RenderedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_finding(&mut self, row: FindingRow) {
        self.rows.push(Row::Finding(row));
    }

    pub fn append_error(&mut self, row: ErrorRow) {
        self.rows.push(Row::Error(row));
    }

    /// Replaces the table body with the "no violations" placeholder.
    pub fn show_empty_state(&mut self) {
        self.rows.clear();
        self.empty_state = true;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.empty_state = false;
    }

    /// Swaps the action area of every row for `user_id` to the resolved
    /// indicator. Returns false when the user has no finding row.
    pub fn mark_decided(&mut self, user_id: &UserId) -> bool {
        let mut marked = false;
        for row in &mut self.rows {
            if let Row::Finding(finding) = row {
                if &finding.user_id == user_id {
                    finding.action = ActionArea::Resolved;
                    marked = true;
                }
            }
        }
        marked
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn finding_rows(&self) -> impl Iterator<Item = &FindingRow> {
        self.rows.iter().filter_map(|row| match row {
            Row::Finding(finding) => Some(finding),
            Row::Error(_) => None,
        })
    }

    pub fn error_rows(&self) -> impl Iterator<Item = &ErrorRow> {
        self.rows.iter().filter_map(|row| match row {
            Row::Error(error) => Some(error),
            Row::Finding(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_empty_state(&self) -> bool {
        self.empty_state
    }
}

impl fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusIndicator::Active => f.write_str("active"),
            StatusIndicator::Inactive => f.write_str("INACTIVE"),
            StatusIndicator::Unknown => f.write_str("unknown"),
        }
    }
}

impl fmt::Display for FindingRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) <{}> {} [{}]",
            self.name, self.user_id, self.masked_email, self.department, self.status
        )?;
        let badges = self
            .role_badges
            .iter()
            .map(|badge| format!("{} @{}", badge.role, badge.source_system))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "  roles: {badges}")?;
        for policy in &self.policies {
            writeln!(f, "  - {} ({})", policy.roles, policy.policy_id)?;
        }
        if let Some(justification) = &self.justification {
            let origin = if justification.simulated {
                "simulated"
            } else {
                "model"
            };
            writeln!(
                f,
                "  risk: {} | action: {} [{origin}: {}]",
                justification.risk, justification.action, justification.model_identifier
            )?;
            writeln!(f, "  rationale: {}", justification.rationale)?;
        }
        match &self.action {
            ActionArea::Pending { .. } => write!(f, "  status: awaiting decision"),
            ActionArea::Resolved => write!(f, "  status: resolved"),
        }
    }
}

impl fmt::Display for ErrorRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "! {}: {}", self.user_id, self.message)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Row::Finding(row) => fmt::Display::fmt(row, f),
            Row::Error(row) => fmt::Display::fmt(row, f),
        }
    }
}

impl fmt::Display for RenderedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty_state {
            return write!(f, "{EMPTY_STATE_MESSAGE}");
        }
        for (index, row) in self.rows.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;

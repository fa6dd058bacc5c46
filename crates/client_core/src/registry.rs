//! Session-scoped store of the latest finding per user.

use std::collections::HashMap;

use shared::{
    domain::{Justification, UserId, ViolationProfile},
    protocol::FindingItem,
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("finding {finding_id} for user {user_id} has no conflicting roles")]
    NoConflictingRoles { user_id: UserId, finding_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub profile: ViolationProfile,
    pub justification: Option<Justification>,
}

impl RegistryEntry {
    pub fn conflicting_roles(&self) -> impl Iterator<Item = &str> {
        self.profile.conflicting_role_set.iter().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct FindingRegistry {
    entries: HashMap<UserId, RegistryEntry>,
}

impl FindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the item keyed by its user id. A repeated user id replaces the
    /// earlier entry; a profile without conflicting roles is refused.
    pub fn insert(&mut self, item: &FindingItem) -> Result<(), RegistryError> {
        let profile = &item.profile;
        if profile.conflicting_role_set.is_empty() {
            return Err(RegistryError::NoConflictingRoles {
                user_id: profile.user_id().clone(),
                finding_id: profile.finding_id.to_string(),
            });
        }

        let user_id = profile.user_id().clone();
        let previous = self.entries.insert(
            user_id.clone(),
            RegistryEntry {
                profile: profile.clone(),
                justification: item.justification.clone(),
            },
        );
        if let Some(previous) = previous {
            warn!(
                user_id = %user_id,
                previous_finding = %previous.profile.finding_id,
                finding = %profile.finding_id,
                "registry: duplicate user id in stream; keeping latest finding"
            );
        }
        Ok(())
    }

    pub fn get(&self, user_id: &UserId) -> Option<&RegistryEntry> {
        self.entries.get(user_id)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

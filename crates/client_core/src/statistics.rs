//! Violation-by-policy summary built once a stream completes.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use shared::{
    domain::{PolicyId, UserId},
    protocol::FindingItem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatistic {
    pub policy_id: PolicyId,
    pub description: String,
    pub affected_users: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsTable {
    pub rows: Vec<PolicyStatistic>,
}

impl StatisticsTable {
    pub fn count_for(&self, policy_id: &str) -> Option<usize> {
        self.rows
            .iter()
            .find(|row| row.policy_id.as_str() == policy_id)
            .map(|row| row.affected_users)
    }
}

/// Counts each policy once per distinct user that violates it, keeps the
/// first description seen, and ranks by count. Ties stay in encounter order.
/// A user delivered twice is counted once.
pub fn build_statistics(items: &[FindingItem]) -> StatisticsTable {
    let mut rows: Vec<PolicyStatistic> = Vec::new();
    let mut index_by_policy: HashMap<PolicyId, usize> = HashMap::new();

    let mut counted: HashSet<(&UserId, &PolicyId)> = HashSet::new();

    for item in items {
        for policy in &item.profile.violated_policies {
            if !counted.insert((item.user_id(), &policy.policy_id)) {
                continue;
            }
            match index_by_policy.get(&policy.policy_id) {
                Some(&index) => rows[index].affected_users += 1,
                None => {
                    index_by_policy.insert(policy.policy_id.clone(), rows.len());
                    rows.push(PolicyStatistic {
                        policy_id: policy.policy_id.clone(),
                        description: policy.description.clone(),
                        affected_users: 1,
                    });
                }
            }
        }
    }

    rows.sort_by(|a, b| b.affected_users.cmp(&a.affected_users));
    StatisticsTable { rows }
}

impl fmt::Display for StatisticsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>6}  description", "policy", "users")?;
        for (index, row) in self.rows.iter().enumerate() {
            write!(
                f,
                "{:<12} {:>6}  {}",
                row.policy_id.as_str(),
                row.affected_users,
                row.description
            )?;
            if index + 1 < self.rows.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/statistics_tests.rs"]
mod tests;

use super::*;
use crate::fixtures::{self, policy, AP_CLERK, PAYMENTS_ADMIN, TRADING_DESK};

fn ids(table: &StatisticsTable) -> Vec<&str> {
    table.rows.iter().map(|row| row.policy_id.as_str()).collect()
}

#[test]
fn counts_once_per_affected_user() {
    let items = vec![
        fixtures::finding_with_policies("u1", vec![policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK])]),
        fixtures::finding_with_policies(
            "u2",
            vec![
                policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK]),
                policy("P2", &[AP_CLERK, PAYMENTS_ADMIN]),
            ],
        ),
        fixtures::finding_with_policies("u3", vec![policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK])]),
    ];

    let table = build_statistics(&items);
    assert_eq!(ids(&table), vec!["P1", "P2"]);
    assert_eq!(table.count_for("P1"), Some(3));
    assert_eq!(table.count_for("P2"), Some(1));
    assert_eq!(table.count_for("P9"), None);
}

#[test]
fn duplicate_policy_within_one_profile_counts_once() {
    let items = vec![fixtures::finding_with_policies(
        "u1",
        vec![
            policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK]),
            policy("P1", &[PAYMENTS_ADMIN, AP_CLERK]),
        ],
    )];
    assert_eq!(build_statistics(&items).count_for("P1"), Some(1));
}

#[test]
fn repeated_user_counts_once_per_policy() {
    let items = vec![
        fixtures::finding_with_policies("u1", vec![policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK])]),
        fixtures::finding_with_policies(
            "u1",
            vec![
                policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK]),
                policy("P2", &[AP_CLERK, PAYMENTS_ADMIN]),
            ],
        ),
        fixtures::finding_with_policies("u2", vec![policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK])]),
    ];

    let table = build_statistics(&items);
    assert_eq!(table.count_for("P1"), Some(2));
    assert_eq!(table.count_for("P2"), Some(1));
}

#[test]
fn ties_keep_encounter_order() {
    let items = vec![
        fixtures::finding_with_policies(
            "u1",
            vec![policy("P3", &[AP_CLERK, TRADING_DESK]), policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK])],
        ),
        fixtures::finding_with_policies("u2", vec![policy("P2", &[AP_CLERK, PAYMENTS_ADMIN])]),
        fixtures::finding_with_policies("u3", vec![policy("P2", &[AP_CLERK, PAYMENTS_ADMIN])]),
    ];

    let table = build_statistics(&items);
    assert_eq!(ids(&table), vec!["P2", "P3", "P1"]);
    let counts: Vec<usize> = table.rows.iter().map(|row| row.affected_users).collect();
    assert!(counts.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn first_seen_description_is_kept() {
    let mut first = policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK]);
    first.description = "original wording".to_string();
    let mut second = policy("P1", &[PAYMENTS_ADMIN, TRADING_DESK]);
    second.description = "different wording".to_string();
    let items = vec![
        fixtures::finding_with_policies("u1", vec![first]),
        fixtures::finding_with_policies("u2", vec![second]),
    ];

    let table = build_statistics(&items);
    assert_eq!(table.rows[0].description, "original wording");
    assert_eq!(table.rows[0].affected_users, 2);
}

#[test]
fn no_items_yields_empty_table() {
    assert!(build_statistics(&[]).rows.is_empty());
}

use super::*;
use crate::fixtures::{self, AP_CLERK, PAYMENTS_ADMIN, TRADING_DESK};

fn registry() -> FindingRegistry {
    let mut registry = FindingRegistry::new();
    registry
        .insert(&fixtures::finding("u1"))
        .expect("insert finding");
    registry
}

#[test]
fn form_preselects_only_conflicting_roles() {
    let registry = registry();
    let user = UserId::new("u1");

    let form = open_simulation(&registry, &user, Some(TRADING_DESK)).expect("form");
    assert_eq!(form.roles, vec![PAYMENTS_ADMIN, TRADING_DESK]);
    assert_eq!(form.selected.as_deref(), Some(TRADING_DESK));

    let form = open_simulation(&registry, &user, Some(AP_CLERK)).expect("form");
    assert!(form.selected.is_none());
}

#[test]
fn missing_role_is_a_validation_error() {
    let registry = registry();
    for role in [None, Some(""), Some("   ")] {
        let err = prepare_simulation(&registry, &UserId::new("u1"), role).expect_err("no role");
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}

#[test]
fn unknown_user_and_foreign_role_are_rejected() {
    let registry = registry();
    assert!(matches!(
        prepare_simulation(&registry, &UserId::new("ghost"), Some(TRADING_DESK)),
        Err(WorkflowError::UnknownUser(_))
    ));
    assert!(matches!(
        prepare_simulation(&registry, &UserId::new("u1"), Some(AP_CLERK)),
        Err(WorkflowError::Validation(_))
    ));
}

#[test]
fn request_names_user_and_role() {
    let request =
        prepare_simulation(&registry(), &UserId::new("u1"), Some(TRADING_DESK)).expect("request");
    assert_eq!(
        request,
        SimulationRequest {
            user_id: UserId::new("u1"),
            role_to_remove: TRADING_DESK.to_string(),
        }
    );
}

#[test]
fn resolved_result_has_no_remaining_policies() {
    let request =
        prepare_simulation(&registry(), &UserId::new("u1"), Some(TRADING_DESK)).expect("request");
    let view = SimulationView::new(
        &request,
        SimulationResult {
            user_id: Some(UserId::new("u1")),
            role_removed: None,
            resolved: true,
            message: "Removing TradingDesk resolves all violations".to_string(),
            violations_remaining: Vec::new(),
        },
    );
    assert!(view.is_resolved());
    assert!(view.remaining().is_empty());
    assert_eq!(view.role_removed, TRADING_DESK);
    assert!(view.to_string().ends_with(NON_DESTRUCTIVE_NOTICE));
}

#[test]
fn unresolved_result_lists_remaining_policies() {
    let request =
        prepare_simulation(&registry(), &UserId::new("u1"), Some(PAYMENTS_ADMIN)).expect("request");
    let view = SimulationView::new(
        &request,
        SimulationResult {
            user_id: Some(UserId::new("u1")),
            role_removed: Some(PAYMENTS_ADMIN.to_string()),
            resolved: false,
            message: "1 violation(s) remain".to_string(),
            violations_remaining: vec![PolicyId::new("P2")],
        },
    );
    assert!(!view.is_resolved());
    assert_eq!(view.remaining(), &[PolicyId::new("P2")]);
    let text = view.to_string();
    assert!(text.contains("  - P2"));
    assert!(text.contains(view.notice()));
}

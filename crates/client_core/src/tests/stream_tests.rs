use super::*;
use crate::fixtures::{self, error_json, finding_json};

fn streaming() -> StreamConsumer {
    let mut consumer = StreamConsumer::new();
    consumer.start();
    consumer
}

#[test]
fn starts_idle_and_enters_streaming() {
    let mut consumer = StreamConsumer::new();
    assert_eq!(consumer.phase(), StreamPhase::Idle);
    assert_eq!(consumer.status_line(), "Idle");
    consumer.start();
    assert_eq!(consumer.phase(), StreamPhase::Streaming);
}

#[test]
fn n_findings_then_done_render_n_rows_and_statistics() {
    let mut consumer = streaming();
    for user in ["u1", "u2", "u3"] {
        let outcome = consumer.on_message(&finding_json(&fixtures::finding(user)));
        assert_eq!(outcome, MessageOutcome::Rendered(UserId::new(user)));
    }
    assert_eq!(consumer.status_line(), "Streaming: 3 finding(s) received");
    assert!(consumer.statistics().is_none());

    assert_eq!(consumer.on_complete(), StreamPhase::Completed);
    assert_eq!(consumer.success_count(), 3);
    assert_eq!(consumer.table().finding_rows().count(), 3);
    assert_eq!(consumer.registry().len(), 3);
    assert_eq!(consumer.received().len(), 3);
    let stats = consumer.statistics().expect("statistics after completion");
    assert_eq!(stats.count_for("P1"), Some(3));
    assert_eq!(consumer.status_line(), "Scan complete: 3 finding(s)");
}

#[test]
fn rows_follow_arrival_order() {
    let mut consumer = streaming();
    for user in ["u3", "u1", "u2"] {
        consumer.on_message(&finding_json(&fixtures::finding(user)));
    }
    let order: Vec<&str> = consumer
        .table()
        .finding_rows()
        .map(|row| row.user_id.as_str())
        .collect();
    assert_eq!(order, vec!["u3", "u1", "u2"]);
}

#[test]
fn error_items_render_inline_without_counting() {
    let mut consumer = streaming();
    consumer.on_message(&finding_json(&fixtures::finding("u1")));
    let outcome = consumer.on_message(&error_json("u2", "LLM timeout"));
    assert_eq!(outcome, MessageOutcome::ErrorRow(UserId::new("u2")));
    consumer.on_message(&finding_json(&fixtures::finding("u3")));

    assert_eq!(consumer.success_count(), 2);
    assert_eq!(consumer.table().len(), 3);
    let errors: Vec<_> = consumer.table().error_rows().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "LLM timeout");
    assert!(!consumer.registry().contains(&UserId::new("u2")));
    assert_eq!(consumer.phase(), StreamPhase::Streaming);
}

#[test]
fn items_without_profile_or_valid_json_are_dropped() {
    let mut consumer = streaming();
    assert!(matches!(consumer.on_message("{}"), MessageOutcome::Dropped(_)));
    assert!(matches!(
        consumer.on_message("{not json"),
        MessageOutcome::Dropped(_)
    ));
    assert!(consumer.table().is_empty());
    assert_eq!(consumer.dropped_count(), 2);
    assert_eq!(consumer.phase(), StreamPhase::Streaming);
    assert_eq!(
        consumer.status_line(),
        "Streaming: 0 finding(s) received (2 item(s) dropped)"
    );
}

#[test]
fn profile_without_conflicting_roles_is_rejected() {
    let mut consumer = streaming();
    let mut item = fixtures::finding("u1");
    item.profile.conflicting_role_set.clear();

    let outcome = consumer.on_message(&finding_json(&item));
    assert!(matches!(outcome, MessageOutcome::Rejected { .. }));
    assert_eq!(consumer.success_count(), 0);
    assert!(consumer.registry().is_empty());
    assert_eq!(consumer.table().error_rows().count(), 1);
    assert_eq!(consumer.table().finding_rows().count(), 0);
}

#[test]
fn duplicate_user_keeps_both_rows_and_latest_registry_entry() {
    let mut consumer = streaming();
    let first = fixtures::finding("u1");
    let mut second = fixtures::finding("u1");
    second.profile.reason = "second delivery".to_string();

    consumer.on_message(&finding_json(&first));
    consumer.on_message(&finding_json(&second));

    assert_eq!(consumer.table().finding_rows().count(), 2);
    assert_eq!(consumer.registry().len(), 1);
    let entry = consumer.registry().get(&UserId::new("u1")).expect("entry");
    assert_eq!(entry.profile.reason, "second delivery");
}

#[test]
fn statistics_count_a_redelivered_user_once() {
    let mut consumer = streaming();
    for user in ["u1", "u1", "u2"] {
        consumer.on_message(&finding_json(&fixtures::finding(user)));
    }
    consumer.on_complete();
    assert_eq!(consumer.success_count(), 3);
    let stats = consumer.statistics().expect("statistics");
    assert_eq!(stats.count_for("P1"), Some(2));
}

#[test]
fn completion_without_findings_shows_empty_state() {
    let mut consumer = streaming();
    consumer.on_message(&error_json("u1", "boom"));
    assert_eq!(consumer.on_complete(), StreamPhase::Completed);
    assert!(consumer.table().is_empty_state());
    assert!(consumer.statistics().is_none());
    assert_eq!(consumer.failed_count(), 1);
    assert_eq!(consumer.status_line(), "No violations found. (1 item(s) failed)");
}

#[test]
fn transport_failure_before_any_item_is_interrupted_empty() {
    let mut consumer = streaming();
    consumer.on_message("{}");
    let phase = consumer.on_transport_error("findings stream ended before completion");
    assert_eq!(phase, StreamPhase::InterruptedEmpty);
    assert!(consumer.table().is_empty_state());
    assert_eq!(consumer.status_line(), "No violations found. (1 item(s) dropped)");
    assert_eq!(
        consumer.transport_error(),
        Some("findings stream ended before completion")
    );
}

#[test]
fn transport_failure_after_items_keeps_rows() {
    let mut consumer = streaming();
    consumer.on_message(&finding_json(&fixtures::finding("u1")));
    consumer.on_message(&finding_json(&fixtures::finding("u2")));

    let phase = consumer.on_transport_error("connection reset");
    assert_eq!(phase, StreamPhase::InterruptedPartial);
    assert_eq!(consumer.table().finding_rows().count(), 2);
    assert!(!consumer.table().is_empty_state());
    assert!(consumer.statistics().is_none());
    assert!(consumer.status_line().starts_with("Stream interrupted: 2 finding(s)"));
}

#[test]
fn terminal_phases_ignore_further_events() {
    let mut consumer = streaming();
    consumer.on_message(&finding_json(&fixtures::finding("u1")));
    consumer.on_complete();

    assert_eq!(
        consumer.on_message(&finding_json(&fixtures::finding("u2"))),
        MessageOutcome::Ignored
    );
    assert_eq!(consumer.on_transport_error("late failure"), StreamPhase::Completed);
    assert_eq!(consumer.on_complete(), StreamPhase::Completed);
    assert_eq!(consumer.success_count(), 1);
    assert!(consumer.transport_error().is_none());
}

#[test]
fn restart_resets_cycle_state() {
    let mut consumer = streaming();
    consumer.on_message(&finding_json(&fixtures::finding("u1")));
    consumer.on_message("{}");
    consumer.on_complete();

    consumer.start();
    assert_eq!(consumer.phase(), StreamPhase::Streaming);
    assert_eq!(consumer.success_count(), 0);
    assert_eq!(consumer.dropped_count(), 0);
    assert!(consumer.registry().is_empty());
    assert!(consumer.table().is_empty());
    assert!(!consumer.table().is_empty_state());
    assert!(consumer.statistics().is_none());
    assert_eq!(consumer.failed_count(), 0);
}

#[test]
fn status_line_reports_dropped_and_failed_items_together() {
    let mut consumer = streaming();
    consumer.on_message(&finding_json(&fixtures::finding("u1")));
    consumer.on_message("{}");
    consumer.on_message(&error_json("u2", "LLM timeout"));
    let mut refused = fixtures::finding("u3");
    refused.profile.conflicting_role_set.clear();
    consumer.on_message(&finding_json(&refused));

    assert_eq!(consumer.failed_count(), 2);
    consumer.on_complete();
    assert_eq!(
        consumer.status_line(),
        "Scan complete: 1 finding(s) (1 item(s) dropped, 2 item(s) failed)"
    );
}

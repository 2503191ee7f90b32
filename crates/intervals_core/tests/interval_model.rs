mod common;

use chrono::{Duration, NaiveDateTime};
use common::at;
use intervals_core::model::interval::Evaluation;
use intervals_core::{
    FrequencyRule, IntervalEntity, IntervalPatch, IntervalStatus, IntervalValidationError,
    NewInterval,
};
use uuid::Uuid;

fn draft(start: NaiveDateTime, frequency: FrequencyRule, include_time: bool) -> NewInterval {
    NewInterval {
        name: "water plants".to_string(),
        start_date: start,
        frequency,
        include_time,
    }
}

#[test]
fn create_computes_future_due_date_from_start() {
    let now = at(2024, 3, 10, 14, 0);
    let (entity, stalled) = IntervalEntity::create(
        draft(at(2024, 3, 1, 9, 0), FrequencyRule::days(4).unwrap(), true),
        now,
    );

    assert!(stalled.is_none());
    assert_eq!(entity.status, IntervalStatus::Normal);
    assert_eq!(entity.last_completed, None);
    assert_eq!(entity.became_overdue_at, None);
    assert_eq!(entity.next_due, at(2024, 3, 13, 9, 0));
    assert!(entity.validate().is_ok());
}

#[test]
fn date_only_create_truncates_start_to_midnight() {
    let now = at(2024, 3, 10, 14, 0);
    let (entity, _) = IntervalEntity::create(
        draft(at(2024, 3, 10, 17, 45), FrequencyRule::weeks(1).unwrap(), false),
        now,
    );

    assert_eq!(entity.start_date, at(2024, 3, 10, 0, 0));
    assert_eq!(entity.next_due, at(2024, 3, 17, 0, 0));
    assert_eq!(entity.due_label(), "Mar 17, 2024");
}

#[test]
fn completion_reanchors_on_completion_time() {
    let created_at = at(2024, 3, 1, 9, 0);
    let (mut entity, _) = IntervalEntity::create(
        draft(created_at, FrequencyRule::days(3).unwrap(), true),
        created_at,
    );

    let completed_at = at(2024, 3, 2, 20, 15);
    assert!(entity.mark_completed(completed_at).is_none());
    assert_eq!(entity.status, IntervalStatus::Completing);
    assert_eq!(entity.last_completed, Some(completed_at));
    assert_eq!(entity.next_due, at(2024, 3, 5, 20, 15));

    assert!(entity.resolve_completion());
    assert_eq!(entity.status, IntervalStatus::Normal);
    assert!(!entity.resolve_completion());
}

#[test]
fn editing_start_after_completion_keeps_completion_reference() {
    let now = at(2024, 3, 1, 9, 0);
    let (mut entity, _) =
        IntervalEntity::create(draft(now, FrequencyRule::days(7).unwrap(), true), now);
    entity.mark_completed(at(2024, 3, 3, 9, 0));
    let due_before = entity.next_due;

    entity.edit(
        IntervalPatch {
            start_date: Some(at(2024, 2, 1, 9, 0)),
            ..IntervalPatch::default()
        },
        at(2024, 3, 4, 9, 0),
    );
    assert_eq!(entity.start_date, at(2024, 2, 1, 9, 0));
    assert_eq!(entity.next_due, due_before);

    entity.edit(
        IntervalPatch {
            frequency: Some(FrequencyRule::days(2).unwrap()),
            ..IntervalPatch::default()
        },
        at(2024, 3, 4, 9, 0),
    );
    assert_eq!(entity.next_due, at(2024, 3, 5, 9, 0));
}

#[test]
fn edit_resets_overdue_interval_to_normal() {
    let now = at(2024, 3, 1, 9, 0);
    let (mut entity, _) =
        IntervalEntity::create(draft(now, FrequencyRule::days(1).unwrap(), true), now);
    let later = at(2024, 3, 5, 9, 30);
    assert_eq!(
        entity.evaluate(later, Duration::hours(12)),
        Evaluation::BecameOverdue
    );

    entity.edit(
        IntervalPatch {
            name: Some("water ferns".to_string()),
            ..IntervalPatch::default()
        },
        later,
    );
    assert_eq!(entity.status, IntervalStatus::Normal);
    assert_eq!(entity.became_overdue_at, None);
    assert_eq!(entity.name, "water ferns");
    assert!(entity.next_due > later);
}

#[test]
fn overdue_interval_rolls_forward_once_grace_elapses() {
    let now = at(2024, 3, 1, 9, 0);
    let grace = Duration::hours(12);
    let (mut entity, _) =
        IntervalEntity::create(draft(now, FrequencyRule::days(1).unwrap(), true), now);

    let overdue_at = at(2024, 3, 2, 10, 0);
    assert_eq!(entity.evaluate(overdue_at, grace), Evaluation::BecameOverdue);
    assert_eq!(entity.became_overdue_at, Some(overdue_at));
    assert!(entity.is_past_due(overdue_at));

    assert_eq!(
        entity.evaluate(overdue_at + Duration::hours(11), grace),
        Evaluation::Unchanged
    );

    let resolved_at = overdue_at + grace;
    assert_eq!(
        entity.evaluate(resolved_at, grace),
        Evaluation::GraceElapsed { stalled: None }
    );
    assert_eq!(entity.status, IntervalStatus::Normal);
    assert_eq!(entity.next_due, at(2024, 3, 3, 9, 0));
    assert!(entity.next_due > resolved_at);
}

#[test]
fn completing_interval_ignores_clock_evaluation() {
    let now = at(2024, 3, 1, 9, 0);
    let (mut entity, _) =
        IntervalEntity::create(draft(now, FrequencyRule::days(1).unwrap(), true), now);
    entity.mark_completed(now);

    assert_eq!(
        entity.evaluate(at(2024, 4, 1, 0, 0), Duration::hours(12)),
        Evaluation::Unchanged
    );
    assert_eq!(entity.status, IntervalStatus::Completing);
}

#[test]
fn validate_rejects_blank_name_and_nil_id() {
    let now = at(2024, 3, 1, 9, 0);
    let mut blank = NewInterval {
        name: "   ".to_string(),
        ..draft(now, FrequencyRule::days(1).unwrap(), false)
    };
    let (entity, _) = IntervalEntity::create(blank.clone(), now);
    assert_eq!(entity.validate(), Err(IntervalValidationError::EmptyName));

    blank.name = "ok".to_string();
    let (entity, _) = IntervalEntity::create_with_id(Uuid::nil(), blank, now);
    assert_eq!(entity.validate(), Err(IntervalValidationError::NilId));
}

#[test]
fn deserializing_zero_count_frequency_fails() {
    let now = at(2024, 3, 1, 9, 0);
    let (entity, _) =
        IntervalEntity::create(draft(now, FrequencyRule::months(2).unwrap(), false), now);
    let mut value = serde_json::to_value(&entity).unwrap();
    assert_eq!(value["frequency"]["unit"], "months");
    assert_eq!(value["status"], "normal");

    value["frequency"]["count"] = serde_json::json!(0);
    assert!(serde_json::from_value::<IntervalEntity>(value).is_err());
}

mod common;

use chrono::{Duration, NaiveDateTime, Timelike};
use common::at;
use intervals_core::recurrence::{next_occurrence, resolve_next_due, RecurrenceError};
use intervals_core::FrequencyRule;

#[test]
fn daily_anchor_two_days_ago_lands_tomorrow_at_anchor_time() {
    let anchor = at(2024, 4, 8, 9, 0);
    let now = at(2024, 4, 10, 12, 0);

    let next = next_occurrence(anchor, FrequencyRule::days(1).unwrap(), now).unwrap();
    assert_eq!(next, at(2024, 4, 11, 9, 0));
}

#[test]
fn occurrence_equal_to_now_is_skipped() {
    let anchor = at(2024, 4, 1, 9, 0);
    let now = at(2024, 4, 8, 9, 0);

    let next = next_occurrence(anchor, FrequencyRule::weeks(1).unwrap(), now).unwrap();
    assert_eq!(next, at(2024, 4, 15, 9, 0));
}

#[test]
fn future_anchor_is_returned_unchanged() {
    let anchor = at(2024, 5, 1, 0, 0);
    let now = at(2024, 4, 1, 0, 0);

    let next = next_occurrence(anchor, FrequencyRule::months(3).unwrap(), now).unwrap();
    assert_eq!(next, anchor);
}

#[test]
fn monthly_steps_clamp_without_drifting() {
    let anchor = at(2024, 1, 31, 8, 0);
    let rule = FrequencyRule::months(1).unwrap();

    assert_eq!(
        next_occurrence(anchor, rule, at(2024, 2, 15, 0, 0)).unwrap(),
        at(2024, 2, 29, 8, 0)
    );
    assert_eq!(
        next_occurrence(anchor, rule, at(2024, 3, 1, 0, 0)).unwrap(),
        at(2024, 3, 31, 8, 0)
    );
    assert_eq!(
        next_occurrence(anchor, rule, at(2024, 4, 1, 0, 0)).unwrap(),
        at(2024, 4, 30, 8, 0)
    );
}

#[test]
fn weekly_rule_matches_seven_day_rule() {
    let anchor = at(2023, 11, 3, 18, 30);
    let weekly = FrequencyRule::weeks(2).unwrap();
    let days = FrequencyRule::days(14).unwrap();

    let mut now = anchor;
    for _ in 0..40 {
        now += Duration::hours(37);
        assert_eq!(
            next_occurrence(anchor, weekly, now).unwrap(),
            next_occurrence(anchor, days, now).unwrap()
        );
    }
}

#[test]
fn result_is_always_strictly_after_now_and_on_the_anchor_grid() {
    let anchor = at(2022, 12, 31, 23, 45);
    let rules = [
        FrequencyRule::days(1).unwrap(),
        FrequencyRule::days(5).unwrap(),
        FrequencyRule::weeks(3).unwrap(),
        FrequencyRule::months(1).unwrap(),
        FrequencyRule::months(7).unwrap(),
    ];

    for rule in rules {
        let mut now = anchor;
        for _ in 0..60 {
            now += Duration::hours(61);
            let next = next_occurrence(anchor, rule, now).unwrap();
            assert!(next > now, "{rule}: {next} should be after {now}");
            assert_eq!(next.time().minute(), 45, "{rule}: time of day drifted");
            if let Some(days) = rule.fixed_days() {
                assert_eq!((next - anchor).num_days() % days, 0);
                assert!(next - now <= Duration::days(days));
            }
        }
    }
}

#[test]
fn repeated_evaluation_before_the_occurrence_is_stable() {
    let anchor = at(2024, 1, 10, 7, 0);
    let rule = FrequencyRule::days(3).unwrap();
    let now = at(2024, 2, 2, 12, 0);

    let first = next_occurrence(anchor, rule, now).unwrap();
    let later = next_occurrence(anchor, rule, first - Duration::seconds(1)).unwrap();
    assert_eq!(first, later);
}

#[test]
fn date_only_reference_resolves_to_midnight() {
    let reference = at(2024, 6, 3, 15, 30);
    let now = at(2024, 6, 10, 10, 0);

    let computed = resolve_next_due(reference, FrequencyRule::days(2).unwrap(), false, now);
    assert!(computed.is_exact());
    assert_eq!(computed.next_due, at(2024, 6, 11, 0, 0));
}

#[test]
fn overflowing_step_reports_stall_and_falls_back_one_day() {
    let anchor = NaiveDateTime::MAX - Duration::days(10);
    let now = NaiveDateTime::MAX - Duration::days(5);
    let rule = FrequencyRule::months(12).unwrap();

    assert!(matches!(
        next_occurrence(anchor, rule, now),
        Err(RecurrenceError::ComputationStalled { .. })
    ));

    let computed = resolve_next_due(anchor, rule, true, now);
    assert!(computed.stalled.is_some());
    assert_eq!(computed.next_due, now + Duration::days(1));
}

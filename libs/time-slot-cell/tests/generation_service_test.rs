mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;

use common::{d, early_clock, fixed_clock, t, weekday_schedule, InMemoryRepository};
use time_slot_cell::{
    DateOverride, DayStatus, DoctorLocks, GenerateSlotsRequest, GenerationSettings, SlotError,
    SlotGenerationService, SlotStatus,
};

const TOKEN: &str = "test-token";

fn service(repository: Arc<InMemoryRepository>) -> SlotGenerationService {
    SlotGenerationService::new(
        repository,
        DoctorLocks::new(Duration::from_millis(200)),
        GenerationSettings::default(),
    )
    .with_clock(early_clock())
}

fn request(doctor_id: Uuid, start: &str, end: &str, body: serde_json::Value) -> GenerateSlotsRequest {
    let mut value = json!({
        "doctor_id": doctor_id,
        "start_date": start,
        "end_date": end,
        "slot_duration": 30,
    });
    if let (Some(target), Some(extra)) = (value.as_object_mut(), body.as_object()) {
        target.extend(extra.clone());
    }
    serde_json::from_value(value).unwrap()
}

fn setup() -> (Arc<InMemoryRepository>, Uuid) {
    let repository = Arc::new(InMemoryRepository::new());
    let doctor_id = Uuid::new_v4();
    repository.add_doctor(doctor_id, weekday_schedule(t(8, 0), t(17, 0)));
    (repository, doctor_id)
}

#[tokio::test]
async fn lunch_break_monday_yields_sixteen_slots() {
    let (repository, doctor_id) = setup();
    let body = json!({
        "working_hours": { "start": "08:00", "end": "17:00", "break": ["12:00", "13:00"] },
        "working_days": ["monday", "tuesday", "wednesday", "thursday", "friday"],
    });

    let outcome = service(repository.clone())
        .generate(request(doctor_id, "2030-01-07", "2030-01-07", body), TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.report.total_slots_created, 16);
    assert_eq!(outcome.report.per_day_counts[&d(7)], 16);
    assert_eq!(repository.slots().len(), 16);
    assert!(repository.slots().iter().all(|slot| slot.id.is_some()));
    assert!(!repository.slots().iter().any(|slot| slot.start_time == t(12, 0)));
}

#[tokio::test]
async fn second_identical_run_creates_nothing() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone());

    let first = svc
        .generate(request(doctor_id, "2030-01-07", "2030-01-13", json!({})), TOKEN)
        .await
        .unwrap();
    let second = svc
        .generate(request(doctor_id, "2030-01-07", "2030-01-13", json!({})), TOKEN)
        .await
        .unwrap();

    assert_eq!(first.report.total_slots_created, 5 * 18);
    assert_eq!(second.report.total_slots_created, 0);
    assert_eq!(second.report.skipped_duplicates, 5 * 18);
    assert_eq!(repository.slots().len(), 5 * 18);
    assert_eq!(
        second.report.explanation().as_deref(),
        Some("all slots in the range already exist or overlap existing slots")
    );
}

#[tokio::test]
async fn overrides_shape_individual_dates() {
    let (repository, doctor_id) = setup();
    repository.add_override(doctor_id, DateOverride::closed(d(8)).with_reason("leave"));
    repository.add_override(doctor_id, DateOverride::custom(d(13), t(10, 0), t(12, 0)));

    let outcome = service(repository.clone())
        .generate(request(doctor_id, "2030-01-07", "2030-01-13", json!({})), TOKEN)
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.per_day_counts[&d(8)], 0);
    assert_eq!(report.per_day_counts[&d(12)], 0);
    assert_eq!(report.per_day_counts[&d(13)], 4);
    assert_eq!(report.total_slots_created, 4 * 18 + 4);

    let tuesday = report.days.iter().find(|day| day.date == d(8)).unwrap();
    assert_eq!(tuesday.status, DayStatus::ClosedByOverride);
}

#[tokio::test]
async fn slots_before_now_are_skipped() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone()).with_clock(fixed_clock(d(7).and_hms_opt(12, 0, 0).unwrap()));

    let outcome = svc
        .generate(request(doctor_id, "2030-01-07", "2030-01-07", json!({})), TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.report.skipped_past_dates, 8);
    assert_eq!(outcome.report.total_slots_created, 10);
    assert_eq!(repository.slots()[0].start_time, t(12, 0));
}

#[tokio::test]
async fn regeneration_keeps_booked_slots() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone());

    svc.generate(request(doctor_id, "2030-01-07", "2030-01-07", json!({})), TOKEN)
        .await
        .unwrap();
    repository.book(d(7), t(14, 0));
    repository.set_weekly(doctor_id, weekday_schedule(t(8, 0), t(12, 0)));

    let outcome = svc
        .regenerate(request(doctor_id, "2030-01-07", "2030-01-07", json!({})), TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.report.removed_stale_slots, 9);
    assert_eq!(outcome.report.total_slots_created, 0);
    assert_eq!(outcome.report.booking_conflicts.len(), 1);
    assert_eq!(outcome.report.booking_conflicts[0].start_time, t(14, 0));

    let slots = repository.slots();
    assert_eq!(slots.len(), 8 + 1);
    let booked: Vec<_> = slots.iter().filter(|slot| slot.status == SlotStatus::Booked).collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].start_time, t(14, 0));
}

#[tokio::test]
async fn regenerating_twice_changes_nothing() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone());

    svc.regenerate(request(doctor_id, "2030-01-07", "2030-01-09", json!({})), TOKEN)
        .await
        .unwrap();
    let before = repository.slots();
    let second = svc
        .regenerate(request(doctor_id, "2030-01-07", "2030-01-09", json!({})), TOKEN)
        .await
        .unwrap();

    assert_eq!(second.report.total_slots_created, 0);
    assert_eq!(second.report.removed_stale_slots, 0);
    assert_eq!(repository.slots(), before);
}

#[tokio::test]
async fn preview_writes_nothing() {
    let (repository, doctor_id) = setup();

    let outcome = service(repository.clone())
        .preview(request(doctor_id, "2030-01-07", "2030-01-08", json!({})), TOKEN)
        .await
        .unwrap();

    assert!(outcome.report.dry_run);
    assert_eq!(outcome.report.total_slots_created, 36);
    assert_eq!(outcome.slots.len(), 36);
    assert!(repository.slots().is_empty());
}

#[tokio::test]
async fn unknown_doctor_is_rejected() {
    let (repository, _) = setup();
    let stranger = Uuid::new_v4();

    let result = service(repository)
        .generate(request(stranger, "2030-01-07", "2030-01-07", json!({})), TOKEN)
        .await;

    assert_matches!(result, Err(SlotError::UnknownDoctor(id)) if id == stranger);
}

#[tokio::test]
async fn invalid_requests_fail_before_any_write() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone());

    let mut zero = request(doctor_id, "2030-01-07", "2030-01-07", json!({}));
    zero.slot_duration = 0;
    assert_matches!(svc.generate(zero, TOKEN).await, Err(SlotError::InvalidDuration { .. }));

    let reversed = request(doctor_id, "2030-01-09", "2030-01-07", json!({}));
    assert_matches!(svc.generate(reversed, TOKEN).await, Err(SlotError::InvalidDateRange(_)));

    let too_long = request(doctor_id, "2030-01-01", "2031-06-01", json!({}));
    assert_matches!(svc.generate(too_long, TOKEN).await, Err(SlotError::InvalidDateRange(_)));

    let bad_break = request(
        doctor_id,
        "2030-01-07",
        "2030-01-07",
        json!({ "working_hours": { "start": "08:00", "end": "17:00", "break": ["13:00"] } }),
    );
    assert_matches!(svc.generate(bad_break, TOKEN).await, Err(SlotError::InvalidBreakWindow(_)));

    assert!(repository.slots().is_empty());
}

#[tokio::test]
async fn break_outside_hours_fails_per_date_only() {
    let (repository, doctor_id) = setup();
    repository.add_override(doctor_id, DateOverride::custom(d(8), t(14, 0), t(16, 0)));

    let outcome = service(repository)
        .generate(
            request(
                doctor_id,
                "2030-01-07",
                "2030-01-08",
                json!({ "working_hours": { "break": ["12:00", "13:00"] } }),
            ),
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(outcome.report.per_day_counts[&d(7)], 16);
    assert_eq!(outcome.report.day_errors.len(), 1);
    assert_eq!(outcome.report.day_errors[0].date, d(8));
    assert_eq!(outcome.report.day_errors[0].code, "invalid_break_window");
}

#[tokio::test]
async fn concurrent_runs_for_one_doctor_conflict() {
    let repository = Arc::new(InMemoryRepository::with_insert_delay(Duration::from_millis(300)));
    let doctor_id = Uuid::new_v4();
    repository.add_doctor(doctor_id, weekday_schedule(t(8, 0), t(17, 0)));

    let svc = SlotGenerationService::new(
        repository.clone(),
        DoctorLocks::new(Duration::from_millis(50)),
        GenerationSettings::default(),
    )
    .with_clock(early_clock());

    let (first, second) = tokio::join!(
        svc.generate(request(doctor_id, "2030-01-07", "2030-01-07", json!({})), TOKEN),
        svc.generate(request(doctor_id, "2030-01-07", "2030-01-07", json!({})), TOKEN),
    );

    let conflicts = [&first, &second]
        .iter()
        .filter(|result| matches!(result, Err(SlotError::ConcurrentGenerationConflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert_eq!(repository.slots().len(), 18);
}

#[tokio::test]
async fn upcoming_window_starts_today() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone()).with_clock(fixed_clock(d(12).and_hms_opt(9, 0, 0).unwrap()));

    let outcome = svc.regenerate_upcoming(doctor_id, 3, Some(60), TOKEN).await.unwrap();

    assert_eq!(outcome.report.start_date, d(12));
    assert_eq!(outcome.report.end_date, d(14));
    // Saturday and Sunday are closed; Monday 08:00-17:00 in hour slots.
    assert_eq!(outcome.report.total_slots_created, 9);
}

#[tokio::test]
async fn upcoming_window_uses_stored_slot_duration() {
    let (repository, doctor_id) = setup();
    repository.set_slot_duration(doctor_id, 15);
    let svc = service(repository.clone()).with_clock(fixed_clock(d(14).and_hms_opt(0, 0, 0).unwrap()));

    let outcome = svc.regenerate_upcoming(doctor_id, 1, None, TOKEN).await.unwrap();

    // Monday 08:00-17:00 in quarter-hour slots.
    assert_eq!(outcome.report.total_slots_created, 36);
    assert!(repository.slots().iter().all(|slot| slot.range().minutes() == 15));
}

#[tokio::test]
async fn slot_duration_falls_back_to_clinic_default() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone()).with_clock(fixed_clock(d(14).and_hms_opt(0, 0, 0).unwrap()));

    assert_eq!(svc.slot_duration_for(doctor_id, None, TOKEN).await, Ok(30));
    repository.set_slot_duration(doctor_id, 0);
    assert_eq!(svc.slot_duration_for(doctor_id, None, TOKEN).await, Ok(30));
    assert_eq!(svc.slot_duration_for(doctor_id, Some(45), TOKEN).await, Ok(45));
    assert!(svc.upcoming_range(400).is_err());
}

#[tokio::test]
async fn list_slots_respects_range() {
    let (repository, doctor_id) = setup();
    let svc = service(repository.clone());
    svc.generate(request(doctor_id, "2030-01-07", "2030-01-08", json!({})), TOKEN)
        .await
        .unwrap();

    let slots = svc
        .list_slots(
            doctor_id,
            serde_json::from_value(json!({ "start_date": "2030-01-08", "end_date": "2030-01-08" })).unwrap(),
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(slots.len(), 18);
    assert!(slots.iter().all(|slot| slot.date == d(8)));
}

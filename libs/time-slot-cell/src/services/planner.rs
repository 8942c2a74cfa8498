use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::SlotError;
use crate::models::{AvailabilityModel, GenerationRequest, SlotStatus, TimeSlot, WeeklySchedule};
use crate::services::conflict::ConflictFilter;
use crate::services::generator::SlotGenerator;
use crate::services::report::{DayStatus, GenerationReport};
use crate::services::resolver::{AvailabilityResolver, ClosedReason, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Add missing slots, never touch existing ones.
    Generate,
    /// Also drop future `Available` slots the current availability no longer produces.
    Regenerate,
}

/// Writes a generation run wants to make. The report counts `to_insert` as created;
/// the caller corrects it if persistence inserts fewer rows.
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub to_insert: Vec<TimeSlot>,
    pub to_delete: Vec<TimeSlot>,
    pub report: GenerationReport,
}

/// Pure planning step: no I/O, deterministic for the same inputs.
pub fn plan_generation(
    model: &AvailabilityModel,
    request: &GenerationRequest,
    existing: &[TimeSlot],
    now: NaiveDateTime,
    mode: GenerationMode,
) -> Result<GenerationPlan, SlotError> {
    let generator = SlotGenerator::new(request.slot_duration_minutes)?;
    let filter = ConflictFilter::new(now);

    let template = request
        .working_hours
        .map(|hours| WeeklySchedule::uniform(&request.working_days, hours));
    let weekly = template.as_ref().unwrap_or(&model.weekly);
    let resolver = AvailabilityResolver::new(model, weekly, request);

    let mut by_date: BTreeMap<NaiveDate, Vec<TimeSlot>> = BTreeMap::new();
    for slot in existing.iter().filter(|slot| request.date_range.contains(slot.date)) {
        by_date.entry(slot.date).or_default().push(slot.clone());
    }

    let mut report = GenerationReport::new(request.doctor_id, request.date_range);
    let mut to_insert = Vec::new();
    let mut to_delete = Vec::new();

    for date in request.date_range.days() {
        let resolution = match resolver.resolve(date) {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!("Skipping {} for doctor {}: {}", date, request.doctor_id, err);
                report.record_failure(date, &err);
                continue;
            }
        };

        let candidates: Vec<TimeSlot> = generator
            .candidates(request.doctor_id, date, resolution.intervals())
            .collect();
        report.record_day(date, DayStatus::from(&resolution), candidates.len());

        let mut day_existing = by_date.remove(&date).unwrap_or_default();

        // Weekdays left out of `working_days` are outside this run entirely.
        let considered = resolution != Resolution::Closed(ClosedReason::ExcludedByRequest);

        if mode == GenerationMode::Regenerate && considered {
            let (stale, kept): (Vec<TimeSlot>, Vec<TimeSlot>) = day_existing.into_iter().partition(|slot| {
                slot.status == SlotStatus::Available
                    && !filter.is_past(slot)
                    && !candidates.iter().any(|candidate| candidate.same_interval(slot))
            });
            day_existing = kept;
            to_delete.extend(stale);

            for booked in day_existing.iter().filter(|slot| slot.status == SlotStatus::Booked) {
                let covered = resolution
                    .intervals()
                    .iter()
                    .any(|interval| interval.contains(&booked.range()));
                if !covered && !filter.is_past(booked) {
                    report.record_booking_conflict(booked.clone());
                }
            }
        }

        let outcome = filter.filter(candidates, &day_existing);
        for skipped in &outcome.skipped {
            report.record_skipped(skipped);
        }
        for slot in &outcome.accepted {
            report.record_created(slot);
        }
        to_insert.extend(outcome.accepted);
    }

    report.record_removed(to_delete.len());

    if !report.booking_conflicts.is_empty() {
        warn!(
            "{} booked slots for doctor {} fall outside the new working hours",
            report.booking_conflicts.len(),
            request.doctor_id
        );
    }
    debug!(
        "Planned {} inserts and {} deletions for doctor {}",
        to_insert.len(),
        to_delete.len(),
        request.doctor_id
    );

    Ok(GenerationPlan { to_insert, to_delete, report })
}

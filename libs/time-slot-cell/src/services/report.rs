use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SlotError;
use crate::models::{DateRange, TimeSlot};
use crate::services::conflict::{SkipReason, SkippedSlot};
use crate::services::resolver::{ClosedReason, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Open,
    ClosedByOverride,
    NotWorkingDay,
    ExcludedByRequest,
    Failed,
}

impl From<&Resolution> for DayStatus {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Open(_) => DayStatus::Open,
            Resolution::Closed(ClosedReason::Override) => DayStatus::ClosedByOverride,
            Resolution::Closed(ClosedReason::NotWorkingDay) => DayStatus::NotWorkingDay,
            Resolution::Closed(ClosedReason::ExcludedByRequest) => DayStatus::ExcludedByRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub candidates: usize,
    pub created: usize,
    pub skipped_past: usize,
    pub skipped_conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayError {
    pub date: NaiveDate,
    pub code: String,
    pub message: String,
}

/// Authoritative counts for one generation call, per request and per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dry_run: bool,
    pub total_slots_created: usize,
    /// Candidate slots dropped because they would already have started.
    pub skipped_past_dates: usize,
    /// Candidates overlapping a live slot, identical ones included.
    pub skipped_conflicts: usize,
    pub skipped_duplicates: usize,
    pub removed_stale_slots: usize,
    pub per_day_counts: BTreeMap<NaiveDate, usize>,
    pub days: Vec<DaySummary>,
    pub day_errors: Vec<DayError>,
    /// Booked slots that the newly resolved hours no longer cover.
    pub booking_conflicts: Vec<TimeSlot>,
}

impl GenerationReport {
    pub fn new(doctor_id: Uuid, range: DateRange) -> Self {
        Self {
            doctor_id,
            start_date: range.start,
            end_date: range.end,
            dry_run: false,
            total_slots_created: 0,
            skipped_past_dates: 0,
            skipped_conflicts: 0,
            skipped_duplicates: 0,
            removed_stale_slots: 0,
            per_day_counts: range.days().map(|date| (date, 0)).collect(),
            days: Vec::new(),
            day_errors: Vec::new(),
            booking_conflicts: Vec::new(),
        }
    }

    pub fn record_day(&mut self, date: NaiveDate, status: DayStatus, candidates: usize) {
        self.days.push(DaySummary {
            date,
            status,
            candidates,
            created: 0,
            skipped_past: 0,
            skipped_conflicts: 0,
        });
    }

    pub fn record_failure(&mut self, date: NaiveDate, error: &SlotError) {
        self.record_day(date, DayStatus::Failed, 0);
        self.day_errors.push(DayError {
            date,
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }

    pub fn record_skipped(&mut self, skipped: &SkippedSlot) {
        let day = self.day_mut(skipped.slot.date);
        match skipped.reason {
            SkipReason::Past => {
                if let Some(day) = day {
                    day.skipped_past += 1;
                }
                self.skipped_past_dates += 1;
            }
            SkipReason::Duplicate | SkipReason::Overlap => {
                if let Some(day) = day {
                    day.skipped_conflicts += 1;
                }
                self.skipped_conflicts += 1;
                if skipped.reason == SkipReason::Duplicate {
                    self.skipped_duplicates += 1;
                }
            }
        }
    }

    pub fn record_created(&mut self, slot: &TimeSlot) {
        if let Some(day) = self.day_mut(slot.date) {
            day.created += 1;
        }
        *self.per_day_counts.entry(slot.date).or_insert(0) += 1;
        self.total_slots_created += 1;
    }

    /// Recounts created slots from the rows storage actually returned.
    pub fn reconcile_created(&mut self, stored: &[TimeSlot]) {
        self.total_slots_created = 0;
        self.per_day_counts.values_mut().for_each(|count| *count = 0);
        self.days.iter_mut().for_each(|day| day.created = 0);
        for slot in stored {
            self.record_created(slot);
        }
    }

    pub fn record_removed(&mut self, count: usize) {
        self.removed_stale_slots += count;
    }

    pub fn record_booking_conflict(&mut self, slot: TimeSlot) {
        self.booking_conflicts.push(slot);
    }

    fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DaySummary> {
        self.days.iter_mut().rev().find(|day| day.date == date)
    }

    fn count_days(&self, status: DayStatus) -> usize {
        self.days.iter().filter(|day| day.status == status).count()
    }

    /// Why nothing was created, for display next to a zero count. `None` when slots were created.
    pub fn explanation(&self) -> Option<String> {
        if self.total_slots_created > 0 {
            return None;
        }

        let total_days = self.days.len();
        let open_days = self.count_days(DayStatus::Open);
        let failed_days = self.count_days(DayStatus::Failed);
        let candidates: usize = self.days.iter().map(|day| day.candidates).sum();

        let reason = if total_days == 0 {
            "the date range is empty".to_string()
        } else if failed_days == total_days {
            "every date in the range has an invalid schedule configuration".to_string()
        } else if open_days == 0 {
            let excluded = self.count_days(DayStatus::ExcludedByRequest);
            let overridden = self.count_days(DayStatus::ClosedByOverride);
            if excluded == total_days {
                "no date in the range falls on one of the selected working days".to_string()
            } else if overridden > 0 {
                format!(
                    "the doctor does not work on any date in the range ({} closed by override)",
                    overridden
                )
            } else {
                "the doctor does not work on any date in the range".to_string()
            }
        } else if candidates == 0 {
            "working hours are shorter than one slot".to_string()
        } else if self.skipped_past_dates == candidates {
            "the whole date range is in the past".to_string()
        } else if self.skipped_past_dates + self.skipped_conflicts == candidates {
            "all slots in the range already exist or overlap existing slots".to_string()
        } else {
            "no slot could be created".to_string()
        };

        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::models::TimeRange;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, day).unwrap()
    }

    fn slot(day: u32) -> TimeSlot {
        TimeSlot::candidate(
            Uuid::nil(),
            d(day),
            TimeRange {
                start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            },
        )
    }

    fn report() -> GenerationReport {
        GenerationReport::new(Uuid::nil(), DateRange::new(d(7), d(9), 366).unwrap())
    }

    #[test]
    fn per_day_counts_cover_every_date() {
        let mut report = report();
        report.record_day(d(7), DayStatus::Open, 1);
        report.record_created(&slot(7));

        assert_eq!(report.per_day_counts.len(), 3);
        assert_eq!(report.per_day_counts[&d(7)], 1);
        assert_eq!(report.per_day_counts[&d(8)], 0);
        assert_eq!(report.days[0].created, 1);
        assert_eq!(report.explanation(), None);
    }

    #[test]
    fn duplicates_count_as_conflicts() {
        let mut report = report();
        report.record_day(d(7), DayStatus::Open, 2);
        report.record_skipped(&SkippedSlot { slot: slot(7), reason: SkipReason::Duplicate });
        report.record_skipped(&SkippedSlot { slot: slot(7), reason: SkipReason::Overlap });

        assert_eq!(report.skipped_conflicts, 2);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(report.days[0].skipped_conflicts, 2);
        assert_eq!(
            report.explanation().as_deref(),
            Some("all slots in the range already exist or overlap existing slots")
        );
    }

    #[test]
    fn reconcile_replaces_planned_counts() {
        let mut report = report();
        report.record_day(d(7), DayStatus::Open, 2);
        report.record_day(d(8), DayStatus::Open, 1);
        report.record_created(&slot(7));
        report.record_created(&slot(7));
        report.record_created(&slot(8));

        report.reconcile_created(&[slot(8)]);

        assert_eq!(report.total_slots_created, 1);
        assert_eq!(report.per_day_counts[&d(7)], 0);
        assert_eq!(report.per_day_counts[&d(8)], 1);
        assert_eq!(report.days[0].created, 0);
    }

    #[test]
    fn failure_is_recorded_with_code() {
        let mut report = report();
        report.record_failure(d(8), &SlotError::InvalidBreakWindow("outside".into()));

        assert_eq!(report.days[0].status, DayStatus::Failed);
        assert_eq!(report.day_errors[0].code, "invalid_break_window");
    }

    #[test]
    fn explains_past_range() {
        let mut report = report();
        report.record_day(d(7), DayStatus::Open, 1);
        report.record_skipped(&SkippedSlot { slot: slot(7), reason: SkipReason::Past });

        assert_eq!(report.explanation().as_deref(), Some("the whole date range is in the past"));
    }

    #[test]
    fn explains_weekday_mismatch() {
        let mut report = report();
        for day in 7..=9 {
            report.record_day(d(day), DayStatus::ExcludedByRequest, 0);
        }
        assert_eq!(
            report.explanation().as_deref(),
            Some("no date in the range falls on one of the selected working days")
        );
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::TimeSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The slot would start before the current moment.
    Past,
    /// An identical live slot already exists.
    Duplicate,
    /// The slot overlaps a live slot with different bounds.
    Overlap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSlot {
    pub slot: TimeSlot,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub accepted: Vec<TimeSlot>,
    pub skipped: Vec<SkippedSlot>,
}

/// Reconciles fresh candidates with slots that already exist for the doctor.
#[derive(Debug, Clone, Copy)]
pub struct ConflictFilter {
    now: NaiveDateTime,
}

impl ConflictFilter {
    /// `now` is the clinic's local wall-clock time.
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn is_past(&self, slot: &TimeSlot) -> bool {
        slot.starts_at() < self.now
    }

    /// Accepted slots never overlap each other nor any `Available`/`Booked` existing slot.
    /// `Cancelled` existing slots are ignored.
    pub fn filter<I>(&self, candidates: I, existing: &[TimeSlot]) -> FilterOutcome
    where
        I: IntoIterator<Item = TimeSlot>,
    {
        let live: Vec<&TimeSlot> = existing.iter().filter(|slot| slot.status.blocks_time()).collect();
        let mut outcome = FilterOutcome::default();

        for candidate in candidates {
            let reason = if self.is_past(&candidate) {
                Some(SkipReason::Past)
            } else if live.iter().any(|slot| slot.same_interval(&candidate)) {
                Some(SkipReason::Duplicate)
            } else if live.iter().any(|slot| slot.overlaps(&candidate))
                || outcome.accepted.iter().any(|slot| slot.overlaps(&candidate))
            {
                Some(SkipReason::Overlap)
            } else {
                None
            };

            match reason {
                Some(reason) => outcome.skipped.push(SkippedSlot { slot: candidate, reason }),
                None => outcome.accepted.push(candidate),
            }
        }

        outcome
    }
}

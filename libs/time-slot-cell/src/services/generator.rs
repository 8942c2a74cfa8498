use chrono::{Duration, NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::SlotError;
use crate::models::{validate_duration, TimeRange, TimeSlot};

/// Tiles open intervals into back-to-back slots of one fixed length.
#[derive(Debug, Clone, Copy)]
pub struct SlotGenerator {
    duration: Duration,
}

impl SlotGenerator {
    pub fn new(duration_minutes: i64) -> Result<Self, SlotError> {
        validate_duration(duration_minutes)?;
        Ok(Self { duration: Duration::minutes(duration_minutes) })
    }

    /// Lazy and restartable: cloning the iterator replays the same sequence.
    pub fn tile(&self, intervals: &[TimeRange]) -> SlotIter {
        let mut intervals = intervals.to_vec();
        intervals.sort();
        SlotIter {
            intervals,
            duration: self.duration,
            index: 0,
            cursor: None,
        }
    }

    /// Unsaved `Available` slots for one doctor and date.
    pub fn candidates(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        intervals: &[TimeRange],
    ) -> impl Iterator<Item = TimeSlot> {
        self.tile(intervals)
            .map(move |range| TimeSlot::candidate(doctor_id, date, range))
    }
}

#[derive(Debug, Clone)]
pub struct SlotIter {
    intervals: Vec<TimeRange>,
    duration: Duration,
    index: usize,
    cursor: Option<NaiveTime>,
}

impl Iterator for SlotIter {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        while let Some(interval) = self.intervals.get(self.index) {
            let start = self.cursor.unwrap_or(interval.start);
            let (end, wrapped) = start.overflowing_add_signed(self.duration);

            // The remainder shorter than one slot is dropped; slots never cross midnight.
            if wrapped != 0 || end > interval.end {
                self.index += 1;
                self.cursor = None;
                continue;
            }

            self.cursor = Some(end);
            return Some(TimeRange { start, end });
        }
        None
    }
}

/// Free-function form of [`SlotGenerator::tile`].
pub fn generate_slots(intervals: &[TimeRange], duration_minutes: i64) -> Result<SlotIter, SlotError> {
    Ok(SlotGenerator::new(duration_minutes)?.tile(intervals))
}

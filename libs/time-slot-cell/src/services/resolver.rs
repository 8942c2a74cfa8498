use chrono::NaiveDate;
use serde::Serialize;

use crate::error::SlotError;
use crate::models::{
    AvailabilityModel, BreakWindow, DateOverride, DayOfWeek, GenerationRequest, OverrideKind,
    TimeRange, WeeklySchedule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// A `Closed` override (leave, holiday) covers the date.
    Override,
    /// The weekly template has the weekday disabled or missing.
    NotWorkingDay,
    /// The request's `working_days` leaves this weekday out.
    ExcludedByRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Ascending, non-overlapping open intervals (two when a break splits the day).
    Open(Vec<TimeRange>),
    Closed(ClosedReason),
}

impl Resolution {
    pub fn intervals(&self) -> &[TimeRange] {
        match self {
            Resolution::Open(intervals) => intervals,
            Resolution::Closed(_) => &[],
        }
    }
}

/// Turns a doctor's availability model into the open intervals of a given date.
pub struct AvailabilityResolver<'a> {
    model: &'a AvailabilityModel,
    weekly: &'a WeeklySchedule,
    request: &'a GenerationRequest,
}

impl<'a> AvailabilityResolver<'a> {
    /// `weekly` is normally `model.weekly`; a request-level template replaces it for one run.
    pub fn new(model: &'a AvailabilityModel, weekly: &'a WeeklySchedule, request: &'a GenerationRequest) -> Self {
        Self { model, weekly, request }
    }

    pub fn resolve(&self, date: NaiveDate) -> Result<Resolution, SlotError> {
        let day = DayOfWeek::of(date);
        if !self.request.considers(day) {
            return Ok(Resolution::Closed(ClosedReason::ExcludedByRequest));
        }

        let hours = match self.model.overrides.get(&date) {
            Some(DateOverride { kind: OverrideKind::Closed, .. }) => {
                return Ok(Resolution::Closed(ClosedReason::Override));
            }
            Some(date_override @ DateOverride { kind: OverrideKind::Custom, .. }) => {
                Some(date_override.custom_hours()?)
            }
            Some(DateOverride { kind: OverrideKind::UseDefault, .. }) | None => self.template_hours(day)?,
        };

        match hours {
            Some(hours) => Ok(Resolution::Open(apply_break(hours, self.request.break_window)?)),
            None => Ok(Resolution::Closed(ClosedReason::NotWorkingDay)),
        }
    }

    fn template_hours(&self, day: DayOfWeek) -> Result<Option<TimeRange>, SlotError> {
        match self.weekly.get(day) {
            Some(availability) => availability.open_hours(),
            None => Ok(None),
        }
    }
}

/// Splits `hours` around the break. Empty pieces (break touching an edge) are dropped.
pub fn apply_break(hours: TimeRange, break_window: Option<BreakWindow>) -> Result<Vec<TimeRange>, SlotError> {
    let Some(brk) = break_window else {
        return Ok(vec![hours]);
    };

    if !hours.contains(&brk) {
        return Err(SlotError::InvalidBreakWindow(format!(
            "break {} is not contained in working hours {}",
            brk, hours
        )));
    }

    Ok([
        TimeRange { start: hours.start, end: brk.start },
        TimeRange { start: brk.end, end: hours.end },
    ]
    .into_iter()
    .filter(|piece| piece.start < piece.end)
    .collect())
}

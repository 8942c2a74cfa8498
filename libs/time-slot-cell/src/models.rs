use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SlotError;

/// Longest slot a request may ask for.
pub const MAX_SLOT_DURATION_MINUTES: i64 = 720;

// ==============================================================================
// TIME-OF-DAY VALUES
// ==============================================================================

/// Parses `HH:MM` (the dashboard format) or `HH:MM:SS` (the Postgres `time` format).
/// Seconds must be zero: schedules have minute precision.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("invalid time of day {:?}, expected HH:MM", raw))?;

    if time.second() != 0 || time.nanosecond() != 0 {
        return Err(format!("time of day {:?} must have minute precision", raw));
    }
    Ok(time)
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}

pub mod option_hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_str(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse_time_of_day(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Half-open `[start, end)` interval within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SlotError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), SlotError> {
        if self.start >= self.end {
            return Err(SlotError::InvalidTimeRange { start: self.start, end: self.end });
        }
        Ok(())
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// A pause inside the working day, e.g. lunch. At most one per generation request.
pub type BreakWindow = TimeRange;

// ==============================================================================
// WEEKDAYS
// ==============================================================================

/// The one weekday vocabulary shared by storage, the resolver and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "mon")]
    Monday,
    #[serde(alias = "tue")]
    Tuesday,
    #[serde(alias = "wed")]
    Wednesday,
    #[serde(alias = "thu")]
    Thursday,
    #[serde(alias = "fri")]
    Friday,
    #[serde(alias = "sat")]
    Saturday,
    #[serde(alias = "sun")]
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    /// Column encoding: 0 = Sunday, 1 = Monday, ..., 6 = Saturday.
    pub fn storage_index(self) -> i32 {
        Weekday::from(self).num_days_from_sunday() as i32
    }

    pub fn from_storage_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(DayOfWeek::Sunday),
            1 => Some(DayOfWeek::Monday),
            2 => Some(DayOfWeek::Tuesday),
            3 => Some(DayOfWeek::Wednesday),
            4 => Some(DayOfWeek::Thursday),
            5 => Some(DayOfWeek::Friday),
            6 => Some(DayOfWeek::Saturday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.as_str() == lowered || day.as_str()[..3] == lowered)
            .ok_or_else(|| format!("unknown weekday {:?}", s))
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// AVAILABILITY MODEL
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub day_of_week: DayOfWeek,
    pub enabled: bool,
    #[serde(default)]
    pub hours: Option<TimeRange>,
}

impl WeeklyAvailability {
    pub fn open(day_of_week: DayOfWeek, hours: TimeRange) -> Self {
        Self { day_of_week, enabled: true, hours: Some(hours) }
    }

    pub fn closed(day_of_week: DayOfWeek) -> Self {
        Self { day_of_week, enabled: false, hours: None }
    }

    /// Enabled days must carry valid hours.
    pub fn open_hours(&self) -> Result<Option<TimeRange>, SlotError> {
        if !self.enabled {
            return Ok(None);
        }
        match self.hours {
            Some(hours) => {
                hours.validate()?;
                Ok(Some(hours))
            }
            None => Err(SlotError::InvalidWorkingHours(format!(
                "weekly availability for {} is enabled without working hours",
                self.day_of_week
            ))),
        }
    }
}

/// Recurring weekly template, at most one entry per weekday. Missing weekdays are closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: BTreeMap<DayOfWeek, WeeklyAvailability>,
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same hours on every listed weekday; all weekdays when `days` is empty.
    pub fn uniform(days: &BTreeSet<DayOfWeek>, hours: TimeRange) -> Self {
        let mut schedule = Self::new();
        for day in DayOfWeek::ALL {
            if days.is_empty() || days.contains(&day) {
                schedule.set(WeeklyAvailability::open(day, hours));
            }
        }
        schedule
    }

    /// Replaces any existing entry for the same weekday.
    pub fn set(&mut self, availability: WeeklyAvailability) {
        self.days.insert(availability.day_of_week, availability);
    }

    pub fn get(&self, day: DayOfWeek) -> Option<&WeeklyAvailability> {
        self.days.get(&day)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeeklyAvailability> {
        self.days.values()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<WeeklyAvailability> for WeeklySchedule {
    fn from_iter<I: IntoIterator<Item = WeeklyAvailability>>(iter: I) -> Self {
        let mut schedule = Self::new();
        for availability in iter {
            schedule.set(availability);
        }
        schedule
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Closed,
    Custom,
    UseDefault,
}

impl OverrideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OverrideKind::Closed => "closed",
            OverrideKind::Custom => "custom",
            OverrideKind::UseDefault => "use_default",
        }
    }
}

/// Per-date exception to the weekly template. `start`/`end` are only meaningful for `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    pub date: NaiveDate,
    pub kind: OverrideKind,
    #[serde(default, with = "option_hhmm")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm")]
    pub end: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DateOverride {
    pub fn closed(date: NaiveDate) -> Self {
        Self { date, kind: OverrideKind::Closed, start: None, end: None, reason: None }
    }

    pub fn custom(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { date, kind: OverrideKind::Custom, start: Some(start), end: Some(end), reason: None }
    }

    pub fn use_default(date: NaiveDate) -> Self {
        Self { date, kind: OverrideKind::UseDefault, start: None, end: None, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Hours of a `Custom` override, validated.
    pub fn custom_hours(&self) -> Result<TimeRange, SlotError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start < end => Ok(TimeRange { start, end }),
            (Some(start), Some(end)) => Err(SlotError::InvalidOverride {
                date: self.date,
                reason: format!(
                    "custom hours {}-{} must start before they end",
                    start.format("%H:%M"),
                    end.format("%H:%M")
                ),
            }),
            _ => Err(SlotError::InvalidOverride {
                date: self.date,
                reason: "custom override requires both start and end".to_string(),
            }),
        }
    }
}

/// Everything the resolver needs to know about one doctor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityModel {
    pub doctor_id: Uuid,
    pub weekly: WeeklySchedule,
    pub overrides: BTreeMap<NaiveDate, DateOverride>,
}

impl AvailabilityModel {
    pub fn new(doctor_id: Uuid, weekly: WeeklySchedule) -> Self {
        Self { doctor_id, weekly, overrides: BTreeMap::new() }
    }

    /// Last write wins per date.
    pub fn insert_override(&mut self, date_override: DateOverride) {
        self.overrides.insert(date_override.date, date_override);
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = DateOverride>) -> Self {
        for date_override in overrides {
            self.insert_override(date_override);
        }
        self
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Cancelled,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled slots free their time for regeneration.
    pub fn blocks_time(self) -> bool {
        !matches!(self, SlotStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: SlotStatus,
}

impl TimeSlot {
    /// An unsaved, available slot.
    pub fn candidate(doctor_id: Uuid, date: NaiveDate, range: TimeRange) -> Self {
        Self {
            id: None,
            doctor_id,
            date,
            start_time: range.start,
            end_time: range.end,
            status: SlotStatus::Available,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date && self.range().overlaps(&other.range())
    }

    pub fn same_interval(&self, other: &TimeSlot) -> bool {
        self.date == other.date && self.start_time == other.start_time && self.end_time == other.end_time
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

/// Inclusive calendar-date range, date-only semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: i64) -> Result<Self, SlotError> {
        if start > end {
            return Err(SlotError::InvalidDateRange(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        let range = Self { start, end };
        if range.len_days() > max_days {
            return Err(SlotError::InvalidDateRange(format!(
                "range of {} days exceeds the maximum of {} days",
                range.len_days(),
                max_days
            )));
        }
        Ok(range)
    }

    /// `days` consecutive dates starting at `start`.
    pub fn starting_at(start: NaiveDate, days: i64, max_days: i64) -> Result<Self, SlotError> {
        if days < 1 {
            return Err(SlotError::InvalidDateRange(format!(
                "range must cover at least one day, got {}",
                days
            )));
        }
        Self::new(start, start + Duration::days(days - 1), max_days)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |date| *date <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub doctor_id: Uuid,
    pub date_range: DateRange,
    pub slot_duration_minutes: i64,
    pub break_window: Option<BreakWindow>,
    /// Weekdays the request considers at all; empty means every weekday.
    pub working_days: BTreeSet<DayOfWeek>,
    /// Request-level template replacing the stored weekly hours for this run only.
    pub working_hours: Option<TimeRange>,
}

impl GenerationRequest {
    pub fn considers(&self, day: DayOfWeek) -> bool {
        self.working_days.is_empty() || self.working_days.contains(&day)
    }
}

/// `working_hours` block of the generate endpoint: `{ start, end, break: [start, end] | [] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingHoursPayload {
    #[serde(default, with = "option_hhmm")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm")]
    pub end: Option<NaiveTime>,
    #[serde(default, rename = "break")]
    pub break_window: Vec<String>,
}

/// Body of `POST /time-slots/generate`, `/regenerate` and `/preview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub working_hours: Option<WorkingHoursPayload>,
    pub slot_duration: i64,
    #[serde(default)]
    pub working_days: Vec<DayOfWeek>,
}

impl GenerateSlotsRequest {
    /// Validates the top-level shape; per-date problems are left to the resolver.
    pub fn into_generation_request(self, max_days: i64) -> Result<GenerationRequest, SlotError> {
        validate_duration(self.slot_duration)?;
        let date_range = DateRange::new(self.start_date, self.end_date, max_days)?;

        let (working_hours, break_window) = match self.working_hours {
            Some(payload) => {
                let hours = match (payload.start, payload.end) {
                    (Some(start), Some(end)) => Some(TimeRange::new(start, end)?),
                    (None, None) => None,
                    _ => {
                        return Err(SlotError::InvalidWorkingHours(
                            "working_hours needs both start and end".to_string(),
                        ))
                    }
                };
                (hours, parse_break_window(&payload.break_window)?)
            }
            None => (None, None),
        };

        Ok(GenerationRequest {
            doctor_id: self.doctor_id,
            date_range,
            slot_duration_minutes: self.slot_duration,
            break_window,
            working_days: self.working_days.into_iter().collect(),
            working_hours,
        })
    }
}

pub fn validate_duration(minutes: i64) -> Result<(), SlotError> {
    if minutes < 1 || minutes > MAX_SLOT_DURATION_MINUTES {
        return Err(SlotError::InvalidDuration { minutes, max: MAX_SLOT_DURATION_MINUTES });
    }
    Ok(())
}

fn parse_break_window(raw: &[String]) -> Result<Option<BreakWindow>, SlotError> {
    match raw {
        [] => Ok(None),
        [start, end] => {
            let start = parse_time_of_day(start).map_err(SlotError::InvalidBreakWindow)?;
            let end = parse_time_of_day(end).map_err(SlotError::InvalidBreakWindow)?;
            if start >= end {
                return Err(SlotError::InvalidBreakWindow(format!(
                    "break {}-{} must start before it ends",
                    start.format("%H:%M"),
                    end.format("%H:%M")
                )));
            }
            Ok(Some(TimeRange { start, end }))
        }
        other => Err(SlotError::InvalidBreakWindow(format!(
            "expected [start, end] or [], got {} values",
            other.len()
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotListQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use time_slot_cell::models::{hhmm, option_hhmm};
use time_slot_cell::{
    validate_duration, AvailabilityModel, DateOverride, DayOfWeek, OverrideKind, SlotError, TimeRange,
    WeeklyAvailability, WeeklySchedule,
};

/// Window regenerated after a profile edit when `slots_duration_days` is not given.
pub const DEFAULT_REGENERATION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub slot_duration: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

// ==============================================================================
// SCHEDULE PAYLOADS
// ==============================================================================

/// One entry of the `working_hours` map; `null` in the map means the day is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// One entry of the `specific_schedule` map, keyed by a plain calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificDay {
    #[serde(default)]
    pub off: bool,
    #[serde(default, with = "option_hhmm", skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm", skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SpecificDay {
    /// `off` wins; times make a custom day; neither falls back to the weekly template.
    pub fn to_override(&self, date: NaiveDate) -> Result<DateOverride, SlotError> {
        let date_override = match (self.off, self.start, self.end) {
            (true, _, _) => DateOverride::closed(date),
            (false, Some(start), Some(end)) => {
                let custom = DateOverride::custom(date, start, end);
                custom.custom_hours()?;
                custom
            }
            (false, None, None) => DateOverride::use_default(date),
            (false, _, _) => {
                return Err(SlotError::InvalidOverride {
                    date,
                    reason: "specific schedule needs both start and end".to_string(),
                })
            }
        };

        Ok(match &self.reason {
            Some(reason) => date_override.with_reason(reason.clone()),
            None => date_override,
        })
    }
}

impl From<&DateOverride> for SpecificDay {
    fn from(date_override: &DateOverride) -> Self {
        let (start, end) = match date_override.kind {
            OverrideKind::Custom => (date_override.start, date_override.end),
            _ => (None, None),
        };
        Self {
            off: date_override.kind == OverrideKind::Closed,
            start,
            end,
            reason: date_override.reason.clone(),
        }
    }
}

/// Schedule fields shared by doctor create/update and `PUT /doctors/{id}/schedule`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Replaces the whole weekly template when present; weekdays left out are off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_hours: Option<BTreeMap<DayOfWeek, Option<DayHours>>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specific_schedule: BTreeMap<NaiveDate, SpecificDay>,
    #[serde(default)]
    pub regenerate_slots: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_duration_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_duration: Option<i64>,
}

impl ScheduleSettings {
    pub fn weekly_schedule(&self) -> Result<Option<WeeklySchedule>, SlotError> {
        let Some(working_hours) = &self.working_hours else {
            return Ok(None);
        };

        let mut schedule = WeeklySchedule::new();
        for day in DayOfWeek::ALL {
            match working_hours.get(&day).copied().flatten() {
                Some(hours) => {
                    let range = TimeRange::new(hours.start, hours.end)?;
                    schedule.set(WeeklyAvailability::open(day, range));
                }
                None => schedule.set(WeeklyAvailability::closed(day)),
            }
        }
        Ok(Some(schedule))
    }

    pub fn date_overrides(&self) -> Result<Vec<DateOverride>, SlotError> {
        self.specific_schedule
            .iter()
            .map(|(date, day)| day.to_override(*date))
            .collect()
    }

    /// `(days, slot duration)` of the regeneration run, when one was asked for.
    /// `days` may not exceed `max_range_days`.
    pub fn regeneration(&self, max_range_days: i64) -> Result<Option<(i64, Option<i64>)>, SlotError> {
        if !self.regenerate_slots {
            return Ok(None);
        }
        if let Some(duration) = self.slot_duration {
            validate_duration(duration)?;
        }
        let days = self.slots_duration_days.unwrap_or(DEFAULT_REGENERATION_DAYS);
        if days < 1 {
            return Err(SlotError::InvalidDateRange(format!(
                "slots_duration_days must be at least 1, got {}",
                days
            )));
        }
        if days > max_range_days {
            return Err(SlotError::InvalidDateRange(format!(
                "slots_duration_days of {} exceeds the maximum of {} days",
                days, max_range_days
            )));
        }
        Ok(Some((days, self.slot_duration)))
    }

    /// Checks every field without writing anything.
    pub fn validate(&self, max_range_days: i64) -> Result<(), SlotError> {
        self.weekly_schedule()?;
        self.date_overrides()?;
        self.regeneration(max_range_days)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.working_hours.is_none() && self.specific_schedule.is_empty() && !self.regenerate_slots
    }
}

/// Read model of `GET /doctors/{id}/schedule`, in the same shape the edit endpoints accept.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorSchedule {
    pub doctor_id: Uuid,
    pub working_hours: BTreeMap<DayOfWeek, Option<DayHours>>,
    pub specific_schedule: BTreeMap<NaiveDate, SpecificDay>,
}

impl From<&AvailabilityModel> for DoctorSchedule {
    fn from(model: &AvailabilityModel) -> Self {
        let working_hours = DayOfWeek::ALL
            .into_iter()
            .map(|day| {
                let hours = model
                    .weekly
                    .get(day)
                    .filter(|availability| availability.enabled)
                    .and_then(|availability| availability.hours)
                    .map(|range| DayHours { start: range.start, end: range.end });
                (day, hours)
            })
            .collect();

        Self {
            doctor_id: model.doctor_id,
            working_hours,
            specific_schedule: model
                .overrides
                .iter()
                .map(|(date, date_override)| (*date, SpecificDay::from(date_override)))
                .collect(),
        }
    }
}

// ==============================================================================
// PROFILE REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(flatten)]
    pub schedule: ScheduleSettings,
}

impl UpdateDoctorRequest {
    pub fn has_profile_changes(&self) -> bool {
        self.full_name.is_some()
            || self.specialty.is_some()
            || self.bio.is_some()
            || self.phone.is_some()
            || self.is_available.is_some()
            || self.schedule.slot_duration.is_some()
    }
}

// Error types specific to doctor operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DoctorError {
    NotFound,
    DuplicateEmail(String),
    UnauthorizedAccess,
    ValidationError(String),
}

impl std::fmt::Display for DoctorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoctorError::NotFound => write!(f, "Doctor not found"),
            DoctorError::DuplicateEmail(email) => write!(f, "Doctor with email {} already exists", email),
            DoctorError::UnauthorizedAccess => write!(f, "Unauthorized access to doctor data"),
            DoctorError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for DoctorError {}

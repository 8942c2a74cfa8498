use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot duration must be between 1 and {max} minutes, got {minutes}")]
    InvalidDuration { minutes: i64, max: i64 },

    #[error("Invalid override on {date}: {reason}")]
    InvalidOverride { date: NaiveDate, reason: String },

    #[error("Invalid break window: {0}")]
    InvalidBreakWindow(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid time range {start}-{end}: start must be before end")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    #[error("Invalid working hours: {0}")]
    InvalidWorkingHours(String),

    #[error("Slot generation for doctor {0} is already in progress, retry shortly")]
    ConcurrentGenerationConflict(Uuid),

    #[error("Doctor {0} not found")]
    UnknownDoctor(Uuid),

    #[error("Schedule storage error: {0}")]
    Repository(String),
}

impl SlotError {
    /// Stable machine-readable name, used in per-day report entries.
    pub fn code(&self) -> &'static str {
        match self {
            SlotError::InvalidDuration { .. } => "invalid_duration",
            SlotError::InvalidOverride { .. } => "invalid_override",
            SlotError::InvalidBreakWindow(_) => "invalid_break_window",
            SlotError::InvalidDateRange(_) => "invalid_date_range",
            SlotError::InvalidTimeRange { .. } => "invalid_time_range",
            SlotError::InvalidWorkingHours(_) => "invalid_working_hours",
            SlotError::ConcurrentGenerationConflict(_) => "concurrent_generation_conflict",
            SlotError::UnknownDoctor(_) => "unknown_doctor",
            SlotError::Repository(_) => "repository",
        }
    }
}

impl From<SupabaseError> for SlotError {
    fn from(err: SupabaseError) -> Self {
        SlotError::Repository(err.to_string())
    }
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::InvalidDuration { .. }
            | SlotError::InvalidOverride { .. }
            | SlotError::InvalidBreakWindow(_)
            | SlotError::InvalidDateRange(_)
            | SlotError::InvalidTimeRange { .. }
            | SlotError::InvalidWorkingHours(_) => AppError::ValidationError(err.to_string()),
            SlotError::ConcurrentGenerationConflict(_) => AppError::Conflict(err.to_string()),
            SlotError::UnknownDoctor(_) => AppError::NotFound(err.to_string()),
            SlotError::Repository(msg) => AppError::Database(msg),
        }
    }
}

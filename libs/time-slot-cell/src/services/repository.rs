use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{merge_duplicates, return_representation};
use shared_database::{SupabaseClient, SupabaseError};

use crate::error::SlotError;
use crate::models::{
    AvailabilityModel, DateOverride, DateRange, DayOfWeek, OverrideKind, SlotStatus, TimeRange,
    TimeSlot, WeeklyAvailability, WeeklySchedule,
};

pub const DOCTORS_TABLE: &str = "doctors";
pub const WEEKLY_TABLE: &str = "doctor_weekly_availability";
pub const OVERRIDES_TABLE: &str = "doctor_date_overrides";
pub const SLOTS_TABLE: &str = "time_slots";

/// Rows per page, at or below PostgREST's default `max-rows`.
pub const SLOT_PAGE_SIZE: usize = 1000;
/// Ids per `id=in.(..)` filter on DELETE.
pub const DELETE_CHUNK_SIZE: usize = 100;

/// Storage seam for schedules and slots. Every call carries the caller's token.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid, auth_token: &str) -> Result<bool, SlotError>;

    /// The doctor's own default slot length, when their profile stores one.
    async fn doctor_slot_duration(&self, doctor_id: Uuid, auth_token: &str) -> Result<Option<i64>, SlotError>;

    async fn load_weekly_schedule(&self, doctor_id: Uuid, auth_token: &str) -> Result<WeeklySchedule, SlotError>;

    /// All overrides when `range` is `None`.
    async fn load_overrides(
        &self,
        doctor_id: Uuid,
        range: Option<DateRange>,
        auth_token: &str,
    ) -> Result<Vec<DateOverride>, SlotError>;

    async fn load_slots(&self, doctor_id: Uuid, range: DateRange, auth_token: &str) -> Result<Vec<TimeSlot>, SlotError>;

    /// Returns the stored rows. A unique violation surfaces as `ConcurrentGenerationConflict`.
    async fn insert_slots(
        &self,
        doctor_id: Uuid,
        slots: &[TimeSlot],
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SlotError>;

    /// Deletes only rows still `available`; returns how many went away.
    async fn delete_slots(&self, doctor_id: Uuid, slot_ids: &[Uuid], auth_token: &str) -> Result<usize, SlotError>;

    /// Writes all seven weekdays; weekdays missing from `schedule` are stored as disabled.
    async fn replace_weekly_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
        auth_token: &str,
    ) -> Result<(), SlotError>;

    /// Insert-or-replace keyed by `(doctor_id, override_date)`.
    async fn upsert_overrides(
        &self,
        doctor_id: Uuid,
        overrides: &[DateOverride],
        auth_token: &str,
    ) -> Result<(), SlotError>;

    async fn load_availability(
        &self,
        doctor_id: Uuid,
        range: Option<DateRange>,
        auth_token: &str,
    ) -> Result<AvailabilityModel, SlotError> {
        let weekly = self.load_weekly_schedule(doctor_id, auth_token).await?;
        let overrides = self.load_overrides(doctor_id, range, auth_token).await?;
        Ok(AvailabilityModel::new(doctor_id, weekly).with_overrides(overrides))
    }
}

// ==============================================================================
// ROW TYPES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
struct DoctorDurationRow {
    #[serde(default)]
    slot_duration: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyRow {
    pub doctor_id: Uuid,
    /// 0 = Sunday.
    pub day_of_week: i32,
    pub is_enabled: bool,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
}

impl WeeklyRow {
    fn from_availability(doctor_id: Uuid, day: DayOfWeek, availability: Option<&WeeklyAvailability>) -> Self {
        let hours = availability.and_then(|a| a.hours);
        Self {
            doctor_id,
            day_of_week: day.storage_index(),
            is_enabled: availability.map(|a| a.enabled).unwrap_or(false),
            start_time: hours.map(|h| h.start),
            end_time: hours.map(|h| h.end),
        }
    }

    fn into_availability(self) -> Option<WeeklyAvailability> {
        let day_of_week = DayOfWeek::from_storage_index(self.day_of_week)?;
        let hours = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        };
        Some(WeeklyAvailability { day_of_week, enabled: self.is_enabled, hours })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRow {
    pub doctor_id: Uuid,
    pub override_date: NaiveDate,
    pub kind: OverrideKind,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl OverrideRow {
    fn from_override(doctor_id: Uuid, date_override: &DateOverride) -> Self {
        Self {
            doctor_id,
            override_date: date_override.date,
            kind: date_override.kind,
            start_time: date_override.start,
            end_time: date_override.end,
            reason: date_override.reason.clone(),
        }
    }
}

impl From<OverrideRow> for DateOverride {
    fn from(row: OverrideRow) -> Self {
        DateOverride {
            date: row.override_date,
            kind: row.kind,
            start: row.start_time,
            end: row.end_time,
            reason: row.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlotRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
}

impl From<&TimeSlot> for TimeSlotRow {
    fn from(slot: &TimeSlot) -> Self {
        Self {
            id: slot.id,
            doctor_id: slot.doctor_id,
            slot_date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: slot.status,
        }
    }
}

impl From<TimeSlotRow> for TimeSlot {
    fn from(row: TimeSlotRow) -> Self {
        TimeSlot {
            id: row.id,
            doctor_id: row.doctor_id,
            date: row.slot_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
        }
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseScheduleRepository {
    supabase: SupabaseClient,
}

impl SupabaseScheduleRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }
}

fn rest_path(table: &str, query: &str) -> String {
    format!("/rest/v1/{}?{}", table, query)
}

#[async_trait]
impl ScheduleRepository for SupabaseScheduleRepository {
    async fn doctor_exists(&self, doctor_id: Uuid, auth_token: &str) -> Result<bool, SlotError> {
        let path = rest_path(DOCTORS_TABLE, &format!("id=eq.{}&select=id", doctor_id));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!rows.is_empty())
    }

    async fn doctor_slot_duration(&self, doctor_id: Uuid, auth_token: &str) -> Result<Option<i64>, SlotError> {
        let path = rest_path(DOCTORS_TABLE, &format!("id=eq.{}&select=slot_duration", doctor_id));
        let rows: Vec<DoctorDurationRow> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(rows.into_iter().next().and_then(|row| row.slot_duration))
    }

    async fn load_weekly_schedule(&self, doctor_id: Uuid, auth_token: &str) -> Result<WeeklySchedule, SlotError> {
        let path = rest_path(WEEKLY_TABLE, &format!("doctor_id=eq.{}&order=day_of_week.asc", doctor_id));
        let rows: Vec<WeeklyRow> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let index = row.day_of_week;
                let availability = row.into_availability();
                if availability.is_none() {
                    warn!("Ignoring weekly availability row with day_of_week {} for doctor {}", index, doctor_id);
                }
                availability
            })
            .collect())
    }

    async fn load_overrides(
        &self,
        doctor_id: Uuid,
        range: Option<DateRange>,
        auth_token: &str,
    ) -> Result<Vec<DateOverride>, SlotError> {
        let mut query = format!("doctor_id=eq.{}", doctor_id);
        if let Some(range) = range {
            query.push_str(&format!("&override_date=gte.{}&override_date=lte.{}", range.start, range.end));
        }
        query.push_str("&order=override_date.asc");

        let rows: Vec<OverrideRow> = self
            .supabase
            .request(Method::GET, &rest_path(OVERRIDES_TABLE, &query), Some(auth_token), None)
            .await?;
        Ok(rows.into_iter().map(DateOverride::from).collect())
    }

    async fn load_slots(&self, doctor_id: Uuid, range: DateRange, auth_token: &str) -> Result<Vec<TimeSlot>, SlotError> {
        let mut slots = Vec::new();
        loop {
            let path = rest_path(
                SLOTS_TABLE,
                &format!(
                    "doctor_id=eq.{}&slot_date=gte.{}&slot_date=lte.{}&order=slot_date.asc,start_time.asc&limit={}&offset={}",
                    doctor_id,
                    range.start,
                    range.end,
                    SLOT_PAGE_SIZE,
                    slots.len()
                ),
            );
            let rows: Vec<TimeSlotRow> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
            let page_len = rows.len();
            slots.extend(rows.into_iter().map(TimeSlot::from));

            if page_len < SLOT_PAGE_SIZE {
                break;
            }
        }

        debug!("Loaded {} slots for doctor {}", slots.len(), doctor_id);
        Ok(slots)
    }

    async fn insert_slots(
        &self,
        doctor_id: Uuid,
        slots: &[TimeSlot],
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<TimeSlotRow> = slots.iter().map(TimeSlotRow::from).collect();
        debug!("Inserting {} slots for doctor {}", rows.len(), doctor_id);

        let stored: Vec<TimeSlotRow> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &format!("/rest/v1/{}", SLOTS_TABLE),
                Some(auth_token),
                Some(json!(rows)),
                Some(return_representation()),
            )
            .await
            .map_err(|err| match err {
                SupabaseError::Conflict(_) => SlotError::ConcurrentGenerationConflict(doctor_id),
                other => SlotError::from(other),
            })?;

        Ok(stored.into_iter().map(TimeSlot::from).collect())
    }

    async fn delete_slots(&self, doctor_id: Uuid, slot_ids: &[Uuid], auth_token: &str) -> Result<usize, SlotError> {
        if slot_ids.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        for chunk in slot_ids.chunks(DELETE_CHUNK_SIZE) {
            let ids = chunk.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
            // A slot booked since it was read keeps its row.
            let path = rest_path(
                SLOTS_TABLE,
                &format!("doctor_id=eq.{}&status=eq.available&id=in.({})", doctor_id, ids),
            );
            let rows: Vec<Value> = self
                .supabase
                .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(return_representation()))
                .await?;
            deleted += rows.len();
        }

        if deleted < slot_ids.len() {
            warn!(
                "Only {} of {} stale slots deleted for doctor {}",
                deleted,
                slot_ids.len(),
                doctor_id
            );
        }
        Ok(deleted)
    }

    async fn replace_weekly_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
        auth_token: &str,
    ) -> Result<(), SlotError> {
        let rows: Vec<WeeklyRow> = DayOfWeek::ALL
            .into_iter()
            .map(|day| WeeklyRow::from_availability(doctor_id, day, schedule.get(day)))
            .collect();

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &rest_path(WEEKLY_TABLE, "on_conflict=doctor_id,day_of_week"),
                Some(auth_token),
                Some(json!(rows)),
                Some(merge_duplicates()),
            )
            .await?;
        Ok(())
    }

    async fn upsert_overrides(
        &self,
        doctor_id: Uuid,
        overrides: &[DateOverride],
        auth_token: &str,
    ) -> Result<(), SlotError> {
        if overrides.is_empty() {
            return Ok(());
        }

        let rows: Vec<OverrideRow> = overrides
            .iter()
            .map(|date_override| OverrideRow::from_override(doctor_id, date_override))
            .collect();

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &rest_path(OVERRIDES_TABLE, "on_conflict=doctor_id,override_date"),
                Some(auth_token),
                Some(json!(rows)),
                Some(merge_duplicates()),
            )
            .await?;
        Ok(())
    }
}

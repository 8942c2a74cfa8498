use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::SlotError;
use crate::models::{
    validate_duration, DateRange, GenerateSlotsRequest, GenerationRequest, SlotListQuery, TimeSlot,
};
use crate::services::locks::DoctorLocks;
use crate::services::planner::{plan_generation, GenerationMode};
use crate::services::report::GenerationReport;
use crate::services::repository::ScheduleRepository;

/// Source of the clinic's local wall-clock time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Clock reading UTC shifted by a fixed offset.
pub fn clinic_clock(utc_offset_minutes: i32) -> Clock {
    Arc::new(move || Utc::now().naive_utc() + Duration::minutes(i64::from(utc_offset_minutes)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub max_range_days: i64,
    pub utc_offset_minutes: i32,
    pub default_slot_duration_minutes: i64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for GenerationSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_range_days: config.max_generation_range_days,
            utc_offset_minutes: config.clinic_utc_offset_minutes,
            default_slot_duration_minutes: config.default_slot_duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub report: GenerationReport,
    /// Stored rows, or the would-be rows of a dry run.
    pub slots: Vec<TimeSlot>,
    pub removed: Vec<TimeSlot>,
}

pub struct SlotGenerationService {
    repository: Arc<dyn ScheduleRepository>,
    locks: DoctorLocks,
    settings: GenerationSettings,
    clock: Clock,
}

impl SlotGenerationService {
    pub fn new(repository: Arc<dyn ScheduleRepository>, locks: DoctorLocks, settings: GenerationSettings) -> Self {
        Self {
            repository,
            locks,
            settings,
            clock: clinic_clock(settings.utc_offset_minutes),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Adds missing slots; existing rows are never modified.
    pub async fn generate(&self, request: GenerateSlotsRequest, auth_token: &str) -> Result<GenerationOutcome, SlotError> {
        let request = request.into_generation_request(self.settings.max_range_days)?;
        self.run(request, GenerationMode::Generate, false, auth_token).await
    }

    /// Like `generate`, but first drops future unbooked slots the current availability no longer yields.
    pub async fn regenerate(
        &self,
        request: GenerateSlotsRequest,
        auth_token: &str,
    ) -> Result<GenerationOutcome, SlotError> {
        let request = request.into_generation_request(self.settings.max_range_days)?;
        self.run(request, GenerationMode::Regenerate, false, auth_token).await
    }

    /// Plans a generation run without writing anything.
    pub async fn preview(&self, request: GenerateSlotsRequest, auth_token: &str) -> Result<GenerationOutcome, SlotError> {
        let request = request.into_generation_request(self.settings.max_range_days)?;
        self.run(request, GenerationMode::Generate, true, auth_token).await
    }

    /// `today ..= today + days - 1`, checked against the range cap.
    pub fn upcoming_range(&self, days: i64) -> Result<DateRange, SlotError> {
        DateRange::starting_at(self.today(), days, self.settings.max_range_days)
    }

    /// The requested duration, else the doctor's stored default, else the clinic default.
    pub async fn slot_duration_for(
        &self,
        doctor_id: Uuid,
        requested: Option<i64>,
        auth_token: &str,
    ) -> Result<i64, SlotError> {
        if let Some(minutes) = requested {
            validate_duration(minutes)?;
            return Ok(minutes);
        }

        match self.repository.doctor_slot_duration(doctor_id, auth_token).await? {
            Some(minutes) if validate_duration(minutes).is_ok() => Ok(minutes),
            Some(minutes) => {
                warn!(
                    "Ignoring stored slot duration {} for doctor {}, using {}",
                    minutes, doctor_id, self.settings.default_slot_duration_minutes
                );
                Ok(self.settings.default_slot_duration_minutes)
            }
            None => Ok(self.settings.default_slot_duration_minutes),
        }
    }

    /// Regenerates `today ..= today + days - 1` from the stored availability.
    pub async fn regenerate_upcoming(
        &self,
        doctor_id: Uuid,
        days: i64,
        slot_duration_minutes: Option<i64>,
        auth_token: &str,
    ) -> Result<GenerationOutcome, SlotError> {
        let date_range = self.upcoming_range(days)?;
        let slot_duration_minutes = self.slot_duration_for(doctor_id, slot_duration_minutes, auth_token).await?;
        let request = GenerationRequest {
            doctor_id,
            date_range,
            slot_duration_minutes,
            break_window: None,
            working_days: BTreeSet::new(),
            working_hours: None,
        };
        self.run(request, GenerationMode::Regenerate, false, auth_token).await
    }

    pub async fn list_slots(
        &self,
        doctor_id: Uuid,
        query: SlotListQuery,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        let range = DateRange::new(query.start_date, query.end_date, self.settings.max_range_days)?;
        self.repository.load_slots(doctor_id, range, auth_token).await
    }

    pub async fn run(
        &self,
        request: GenerationRequest,
        mode: GenerationMode,
        dry_run: bool,
        auth_token: &str,
    ) -> Result<GenerationOutcome, SlotError> {
        let doctor_id = request.doctor_id;
        let range = request.date_range;
        debug!(
            "Slot generation ({:?}, dry_run={}) for doctor {} from {} to {}",
            mode, dry_run, doctor_id, range.start, range.end
        );

        // Previews only read, so they do not queue behind writers.
        let _guard = if dry_run { None } else { Some(self.locks.acquire(doctor_id).await?) };

        if !self.repository.doctor_exists(doctor_id, auth_token).await? {
            return Err(SlotError::UnknownDoctor(doctor_id));
        }

        let model = self.repository.load_availability(doctor_id, Some(range), auth_token).await?;
        let existing = self.repository.load_slots(doctor_id, range, auth_token).await?;

        let plan = plan_generation(&model, &request, &existing, self.now(), mode)?;
        let mut report = plan.report;

        if dry_run {
            report.dry_run = true;
            return Ok(GenerationOutcome { report, slots: plan.to_insert, removed: plan.to_delete });
        }

        let stale_ids: Vec<Uuid> = plan.to_delete.iter().filter_map(|slot| slot.id).collect();
        let removed = self.repository.delete_slots(doctor_id, &stale_ids, auth_token).await?;
        report.removed_stale_slots = removed;

        let stored = self.repository.insert_slots(doctor_id, &plan.to_insert, auth_token).await?;
        if stored.len() != plan.to_insert.len() {
            warn!(
                "Storage returned {} of {} inserted slots for doctor {}",
                stored.len(),
                plan.to_insert.len(),
                doctor_id
            );
            report.reconcile_created(&stored);
        }

        info!(
            "Generated {} slots for doctor {} ({} past, {} conflicts, {} removed)",
            report.total_slots_created,
            doctor_id,
            report.skipped_past_dates,
            report.skipped_conflicts,
            report.removed_stale_slots
        );

        Ok(GenerationOutcome { report, slots: stored, removed: plan.to_delete })
    }
}

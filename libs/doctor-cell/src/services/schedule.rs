use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use time_slot_cell::{
    DateRange, GenerationReport, ScheduleQuery, ScheduleRepository, SchedulingState, SlotError,
    SlotGenerationService,
};

use crate::models::{DoctorSchedule, ScheduleSettings};

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleUpdateOutcome {
    pub weekly_updated: bool,
    pub overrides_upserted: usize,
    /// Present when the edit asked for slot regeneration.
    pub slot_generation: Option<GenerationReport>,
}

/// Reads and edits a doctor's availability model, regenerating slots on request.
pub struct ScheduleService {
    repository: Arc<dyn ScheduleRepository>,
    generation: SlotGenerationService,
}

impl ScheduleService {
    pub fn new(state: &SchedulingState) -> Self {
        Self {
            repository: state.repository.clone(),
            generation: state.generation_service(),
        }
    }

    pub async fn get_schedule(
        &self,
        doctor_id: Uuid,
        query: ScheduleQuery,
        auth_token: &str,
    ) -> Result<DoctorSchedule, SlotError> {
        debug!("Fetching schedule for doctor {}", doctor_id);

        if !self.repository.doctor_exists(doctor_id, auth_token).await? {
            return Err(SlotError::UnknownDoctor(doctor_id));
        }

        let range = match (query.from, query.to) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to, self.generation.settings().max_range_days)?),
            (Some(from), None) => Some(DateRange::starting_at(
                from,
                self.generation.settings().max_range_days,
                self.generation.settings().max_range_days,
            )?),
            (None, Some(_)) => {
                return Err(SlotError::InvalidDateRange("`to` requires `from`".to_string()))
            }
            (None, None) => None,
        };

        let model = self.repository.load_availability(doctor_id, range, auth_token).await?;
        Ok(DoctorSchedule::from(&model))
    }

    /// Everything is validated before the first write.
    pub async fn apply(
        &self,
        doctor_id: Uuid,
        settings: &ScheduleSettings,
        auth_token: &str,
    ) -> Result<ScheduleUpdateOutcome, SlotError> {
        let weekly = settings.weekly_schedule()?;
        let overrides = settings.date_overrides()?;
        let regeneration = settings.regeneration(self.generation.settings().max_range_days)?;
        if let Some((days, _)) = regeneration {
            self.generation.upcoming_range(days)?;
        }

        if !self.repository.doctor_exists(doctor_id, auth_token).await? {
            return Err(SlotError::UnknownDoctor(doctor_id));
        }

        // Without `slot_duration` the doctor's stored length applies.
        let regeneration = match regeneration {
            Some((days, requested)) => Some((
                days,
                self.generation.slot_duration_for(doctor_id, requested, auth_token).await?,
            )),
            None => None,
        };

        if let Some(weekly) = &weekly {
            self.repository.replace_weekly_schedule(doctor_id, weekly, auth_token).await?;
        }
        self.repository.upsert_overrides(doctor_id, &overrides, auth_token).await?;

        let slot_generation = match regeneration {
            Some((days, slot_duration)) => {
                let outcome = self
                    .generation
                    .regenerate_upcoming(doctor_id, days, Some(slot_duration), auth_token)
                    .await?;
                Some(outcome.report)
            }
            None => None,
        };

        info!(
            "Schedule updated for doctor {} (weekly: {}, overrides: {}, regenerated: {})",
            doctor_id,
            weekly.is_some(),
            overrides.len(),
            slot_generation.is_some()
        );

        Ok(ScheduleUpdateOutcome {
            weekly_updated: weekly.is_some(),
            overrides_upserted: overrides.len(),
            slot_generation,
        })
    }
}

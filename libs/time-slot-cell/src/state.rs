use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use shared_config::AppConfig;

use crate::services::{
    clinic_clock, Clock, DoctorLocks, GenerationSettings, ScheduleRepository, SlotGenerationService,
    SupabaseScheduleRepository,
};

/// Router state shared by every request, so the per-doctor locks outlive a single call.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub locks: DoctorLocks,
    pub repository: Arc<dyn ScheduleRepository>,
    pub clock: Clock,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let repository: Arc<dyn ScheduleRepository> = Arc::new(SupabaseScheduleRepository::new(&config));
        Self {
            locks: DoctorLocks::new(Duration::from_millis(config.generation_lock_timeout_ms)),
            clock: clinic_clock(config.clinic_utc_offset_minutes),
            repository,
            config,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn ScheduleRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn generation_service(&self) -> SlotGenerationService {
        SlotGenerationService::new(
            self.repository.clone(),
            self.locks.clone(),
            GenerationSettings::from(self.config.as_ref()),
        )
        .with_clock(self.clock.clone())
    }
}

impl FromRef<SchedulingState> for Arc<AppConfig> {
    fn from_ref(state: &SchedulingState) -> Self {
        state.config.clone()
    }
}

pub mod conflict;
pub mod generation;
pub mod generator;
pub mod locks;
pub mod planner;
pub mod report;
pub mod repository;
pub mod resolver;

pub use conflict::{ConflictFilter, FilterOutcome, SkipReason, SkippedSlot};
pub use generation::{clinic_clock, Clock, GenerationOutcome, GenerationSettings, SlotGenerationService};
pub use generator::{generate_slots, SlotGenerator, SlotIter};
pub use locks::DoctorLocks;
pub use planner::{plan_generation, GenerationMode, GenerationPlan};
pub use report::{DayError, DayStatus, DaySummary, GenerationReport};
pub use repository::{ScheduleRepository, SupabaseScheduleRepository, DELETE_CHUNK_SIZE, SLOT_PAGE_SIZE};
pub use resolver::{apply_break, AvailabilityResolver, ClosedReason, Resolution};

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use error::SlotError;
pub use models::*;
pub use services::*;
pub use state::SchedulingState;

use axum::{routing::get, Router};

use doctor_cell::router::doctor_routes;
use time_slot_cell::router::time_slot_routes;
use time_slot_cell::SchedulingState;

pub fn create_router(state: SchedulingState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/time-slots", time_slot_routes(state))
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use time_slot_cell::SchedulingState;

use crate::handlers;

pub fn doctor_routes(state: SchedulingState) -> Router {
    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Doctor profile management
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor).put(handlers::update_doctor))

        // Weekly template and date overrides
        .route("/{doctor_id}/schedule", get(handlers::get_schedule).put(handlers::update_schedule))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::SchedulingState;

pub fn time_slot_routes(state: SchedulingState) -> Router {
    // Every slot route needs a caller identity
    let protected_routes = Router::new()
        .route("/generate", post(handlers::generate_slots))
        .route("/regenerate", post(handlers::regenerate_slots))
        .route("/preview", post(handlers::preview_slots))
        .route("/{doctor_id}", get(handlers::list_slots))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{GenerateSlotsRequest, SlotListQuery};
use crate::services::GenerationOutcome;
use crate::state::SchedulingState;

fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.can_manage_doctor(&doctor_id.to_string()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the doctor or an admin can manage this doctor's slots".to_string(),
        ))
    }
}

fn outcome_response(outcome: GenerationOutcome) -> Json<Value> {
    let report = &outcome.report;
    Json(json!({
        "data": {
            "total_slots": report.total_slots_created,
            "skipped_past_dates": report.skipped_past_dates,
            "skipped_conflicts": report.skipped_conflicts,
            "removed_stale_slots": report.removed_stale_slots,
            "per_day_counts": report.per_day_counts,
            "message": report.explanation(),
            "report": report,
            "slots": outcome.slots,
        }
    }))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn generate_slots(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, request.doctor_id)?;
    debug!("User {} generating slots for doctor {}", user.id, request.doctor_id);

    let outcome = state.generation_service().generate(request, auth.token()).await?;
    Ok(outcome_response(outcome))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn regenerate_slots(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, request.doctor_id)?;
    debug!("User {} regenerating slots for doctor {}", user.id, request.doctor_id);

    let outcome = state.generation_service().regenerate(request, auth.token()).await?;
    Ok(outcome_response(outcome))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn preview_slots(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, request.doctor_id)?;

    let outcome = state.generation_service().preview(request, auth.token()).await?;
    Ok(outcome_response(outcome))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn list_slots(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .generation_service()
        .list_slots(doctor_id, query, auth.token())
        .await?;

    Ok(Json(json!({
        "data": {
            "slots": slots,
            "total": slots.len(),
        }
    })))
}

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
use time_slot_cell::{ScheduleQuery, SchedulingState};

use crate::models::{CreateDoctorRequest, DoctorError, ScheduleSettings, UpdateDoctorRequest};
use crate::services::{DoctorService, ScheduleService};

fn doctor_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<DoctorError>() {
        Some(DoctorError::NotFound) => AppError::NotFound(err.to_string()),
        Some(DoctorError::DuplicateEmail(_)) => AppError::Conflict(err.to_string()),
        Some(DoctorError::UnauthorizedAccess) => AppError::Forbidden(err.to_string()),
        Some(DoctorError::ValidationError(_)) => AppError::ValidationError(err.to_string()),
        None => AppError::Internal(err.to_string()),
    }
}

fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.can_manage_doctor(&doctor_id.to_string()) {
        Ok(())
    } else {
        Err(doctor_error(DoctorError::UnauthorizedAccess.into()))
    }
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn create_doctor(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Only admins can add doctors".to_string()));
    }
    request.schedule.validate(state.config.max_generation_range_days)?;

    let doctor = DoctorService::new(&state.config)
        .create_doctor(&request, auth.token())
        .await
        .map_err(doctor_error)?;

    let schedule = if request.schedule.is_empty() {
        None
    } else {
        Some(
            ScheduleService::new(&state)
                .apply(doctor.id, &request.schedule, auth.token())
                .await?,
        )
    };

    Ok(Json(json!({
        "data": {
            "doctor": doctor,
            "schedule": schedule,
        }
    })))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn get_doctor(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state.config)
        .get_doctor(&doctor_id.to_string(), auth.token())
        .await
        .map_err(doctor_error)?;

    Ok(Json(json!({ "data": doctor })))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn update_doctor(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    request.schedule.validate(state.config.max_generation_range_days)?;
    debug!("User {} updating doctor {}", user.id, doctor_id);

    let doctor = DoctorService::new(&state.config)
        .update_doctor(&doctor_id.to_string(), &request, auth.token())
        .await
        .map_err(doctor_error)?;

    let schedule = if request.schedule.is_empty() {
        None
    } else {
        Some(
            ScheduleService::new(&state)
                .apply(doctor_id, &request.schedule, auth.token())
                .await?,
        )
    };

    Ok(Json(json!({
        "data": {
            "doctor": doctor,
            "schedule": schedule,
        }
    })))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn get_schedule(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state)
        .get_schedule(doctor_id, query, auth.token())
        .await?;

    Ok(Json(json!({ "data": schedule })))
}

#[axum::debug_handler(state = SchedulingState)]
pub async fn update_schedule(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(settings): Json<ScheduleSettings>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;

    let outcome = ScheduleService::new(&state)
        .apply(doctor_id, &settings, auth.token())
        .await?;

    Ok(Json(json!({ "data": outcome })))
}

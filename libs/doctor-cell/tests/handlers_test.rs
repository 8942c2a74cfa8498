use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::handlers::*;
use doctor_cell::models::*;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};
use time_slot_cell::{ScheduleQuery, SchedulingState};

fn create_state(server: &MockServer) -> SchedulingState {
    let clock_time = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap().and_hms_opt(0, 0, 0).unwrap();
    SchedulingState::new(TestConfig::with_supabase_url(&server.uri()).to_arc())
        .with_clock(Arc::new(move || clock_time))
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn extension(user: TestUser) -> Extension<User> {
    Extension(user.to_user())
}

fn create_request(value: serde_json::Value) -> CreateDoctorRequest {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn create_doctor_requires_admin() {
    let server = MockServer::start().await;

    let result = create_doctor(
        State(create_state(&server)),
        create_auth_header("token"),
        extension(TestUser::doctor("doctor@example.com")),
        Json(create_request(json!({ "full_name": "Dr. Test", "email": "doctor@example.com" }))),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn invalid_schedule_is_rejected_before_any_write() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = create_doctor(
        State(create_state(&server)),
        create_auth_header("token"),
        extension(TestUser::admin("admin@example.com")),
        Json(create_request(json!({
            "full_name": "Dr. Test",
            "email": "doctor@example.com",
            "specific_schedule": { "2030-01-08": { "off": false, "start": "12:00", "end": "10:00" } }
        }))),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("email", "eq.taken@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&server)
        .await;

    let result = create_doctor(
        State(create_state(&server)),
        create_auth_header("token"),
        extension(TestUser::admin("admin@example.com")),
        Json(create_request(json!({ "full_name": "Dr. Test", "email": "taken@example.com" }))),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn duplicate_check_encodes_plus_addressed_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("email", "eq.dr+house@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&server)
        .await;

    let result = create_doctor(
        State(create_state(&server)),
        create_auth_header("token"),
        extension(TestUser::admin("admin@example.com")),
        Json(create_request(json!({ "full_name": "Dr. House", "email": "dr+house@example.com" }))),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn create_doctor_stores_schedule() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let id = doctor_id.to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("email", "eq.new@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockSupabaseResponses::doctor_row(&id)])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockSupabaseResponses::doctor_row(&id)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_date_overrides"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(response) = create_doctor(
        State(create_state(&server)),
        create_auth_header("token"),
        extension(TestUser::admin("admin@example.com")),
        Json(create_request(json!({
            "full_name": "Dr. Test",
            "email": "new@example.com",
            "working_hours": { "monday": { "start": "08:00", "end": "17:00" } },
            "specific_schedule": { "2030-01-08": { "off": true } }
        }))),
    )
    .await
    .unwrap();

    assert_eq!(response["data"]["doctor"]["id"], id);
    assert_eq!(response["data"]["schedule"]["weekly_updated"], true);
    assert_eq!(response["data"]["schedule"]["overrides_upserted"], 1);
    assert!(response["data"]["schedule"]["slot_generation"].is_null());
}

#[tokio::test]
async fn doctors_cannot_edit_each_other() {
    let server = MockServer::start().await;

    let result = update_schedule(
        State(create_state(&server)),
        Path(Uuid::new_v4()),
        create_auth_header("token"),
        extension(TestUser::doctor("other@example.com")),
        Json(ScheduleSettings::default()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn unknown_doctor_schedule_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = get_schedule(
        State(create_state(&server)),
        Path(Uuid::new_v4()),
        Query(ScheduleQuery { from: None, to: None }),
        create_auth_header("token"),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn get_doctor_maps_missing_row_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = get_doctor(State(create_state(&server)), Path(Uuid::new_v4()), create_auth_header("token")).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

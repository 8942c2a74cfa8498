use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a new doctor profile
    pub async fn create_doctor(&self, request: &CreateDoctorRequest, auth_token: &str) -> Result<Doctor> {
        debug!("Creating new doctor profile for: {}", request.email);

        if request.full_name.trim().is_empty() {
            return Err(anyhow!(DoctorError::ValidationError("full_name is required".to_string())));
        }

        let existing_check_path = format!(
            "/rest/v1/doctors?email=eq.{}&select=id",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(anyhow!(DoctorError::DuplicateEmail(request.email.clone())));
        }

        let doctor_data = json!({
            "full_name": request.full_name,
            "email": request.email,
            "specialty": request.specialty,
            "bio": request.bio,
            "phone": request.phone,
            "is_available": true,
            "slot_duration": request.schedule.slot_duration,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(doctor_data),
                Some(return_representation()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create doctor profile"))?;
        let doctor: Doctor = serde_json::from_value(row)?;
        debug!("Doctor profile created successfully with ID: {}", doctor.id);

        Ok(doctor)
    }

    /// Get doctor by ID
    pub async fn get_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!(DoctorError::NotFound))?;
        Ok(serde_json::from_value(row)?)
    }

    /// Update doctor profile; schedule fields are handled by the schedule service.
    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: &UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor profile: {}", doctor_id);

        if !request.has_profile_changes() {
            return self.get_doctor(doctor_id, auth_token).await;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(name) = &request.full_name {
            update_data.insert("full_name".to_string(), json!(name));
        }
        if let Some(specialty) = &request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(bio) = &request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(phone) = &request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(available));
        }
        if let Some(duration) = request.schedule.slot_duration {
            update_data.insert("slot_duration".to_string(), json!(duration));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!(DoctorError::NotFound))?;
        Ok(serde_json::from_value(row)?)
    }
}

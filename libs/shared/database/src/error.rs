use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// PostgREST answers 409 when a unique constraint rejects an insert.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response decoding error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SupabaseError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            409 => SupabaseError::Conflict(body),
            _ => SupabaseError::Api { status, body },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Conflict(_))
    }
}

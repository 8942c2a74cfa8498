use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    /// Offset of the clinic's local time from UTC, used to decide which slots have already elapsed.
    pub clinic_utc_offset_minutes: i32,
    pub max_generation_range_days: i64,
    pub generation_lock_timeout_ms: u64,
    pub default_slot_duration_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            server_port: 3000,
            clinic_utc_offset_minutes: 0,
            max_generation_range_days: 366,
            generation_lock_timeout_ms: 5000,
            default_slot_duration_minutes: 30,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: parse_or_default("SERVER_PORT", defaults.server_port),
            clinic_utc_offset_minutes: parse_or_default(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            max_generation_range_days: parse_or_default(
                "SLOT_GENERATION_MAX_RANGE_DAYS",
                defaults.max_generation_range_days,
            ),
            generation_lock_timeout_ms: parse_or_default(
                "SLOT_GENERATION_LOCK_TIMEOUT_MS",
                defaults.generation_lock_timeout_ms,
            ),
            default_slot_duration_minutes: parse_or_default(
                "DEFAULT_SLOT_DURATION_MINUTES",
                defaults.default_slot_duration_minutes,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

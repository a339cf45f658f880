use std::env;

use chrono_tz::Tz;

use crate::calendar::google::{DEFAULT_BASE_URL, GoogleCalendarConfig};
use crate::engine::scheduler::DEFAULT_MAX_INSTANCES;
use crate::error::AppError;

pub const DEFAULT_TIME_ZONE: &str = "America/New_York";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub max_recurrence_instances: usize,
    pub time_zone: Tz,
    pub calendar: Option<GoogleCalendarConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: at_least_one(
                "EVENT_BUFFER_SIZE",
                parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            )?,
            max_recurrence_instances: at_least_one(
                "MAX_RECURRENCE_INSTANCES",
                parse_or_default("MAX_RECURRENCE_INSTANCES", DEFAULT_MAX_INSTANCES)?,
            )?,
            time_zone: parse_time_zone(
                &env::var("ORG_TIME_ZONE").unwrap_or_else(|_| DEFAULT_TIME_ZONE.to_string()),
            )?,
            calendar: calendar_from_env()?,
        })
    }
}

pub fn parse_time_zone(raw: &str) -> Result<Tz, AppError> {
    raw.parse::<Tz>()
        .map_err(|err| AppError::Internal(format!("invalid ORG_TIME_ZONE: {err}")))
}

fn calendar_from_env() -> Result<Option<GoogleCalendarConfig>, AppError> {
    let Ok(calendar_id) = env::var("GOOGLE_CALENDAR_ID") else {
        return Ok(None);
    };

    let access_token = env::var("GOOGLE_CALENDAR_ACCESS_TOKEN").map_err(|_| {
        AppError::Internal(
            "GOOGLE_CALENDAR_ACCESS_TOKEN is required when GOOGLE_CALENDAR_ID is set".to_string(),
        )
    })?;

    let config = GoogleCalendarConfig::new(calendar_id, access_token)
        .with_base_url(
            env::var("GOOGLE_CALENDAR_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        )
        .with_timeout(parse_or_default("CALENDAR_TIMEOUT_SECS", 30)?);

    Ok(Some(config))
}

fn at_least_one(key: &str, value: usize) -> Result<usize, AppError> {
    if value == 0 {
        return Err(AppError::Internal(format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

pub mod google;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("calendar rejected the event: {0}")]
    Rejected(String),
}

/// Wall-clock instant with an explicit IANA zone, as calendar APIs expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

impl EventTime {
    pub fn in_zone(instant: DateTime<Utc>, zone: Tz) -> Self {
        Self {
            date_time: instant.with_timezone(&zone).to_rfc3339(),
            time_zone: zone.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

/// What the provider hands back after a create or update. `id` is absent
/// when the provider accepted the call but did not report an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
}

/// External calendar that mirrors scheduled routes.
///
/// When `existing_id` is set the event is updated in place, otherwise a new
/// event is created.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_or_update_event(
        &self,
        existing_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<EventReceipt, CalendarError>;
}

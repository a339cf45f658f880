//! Google Calendar v3 client.
//!
//! Authentication is a pre-minted OAuth bearer token supplied through
//! configuration; refreshing it belongs to whatever provisions the service.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use super::{CalendarClient, CalendarError, CalendarEvent, EventReceipt};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone)]
pub struct GoogleCalendarConfig {
    pub calendar_id: String,
    pub access_token: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GoogleCalendarConfig {
    pub fn new(calendar_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    events_url: Url,
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleCalendarConfig) -> Result<Self, CalendarError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|_| CalendarError::Rejected("invalid access token format".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut events_url = Url::parse(&config.base_url).map_err(|err| {
            CalendarError::Rejected(format!("invalid calendar base url {}: {err}", config.base_url))
        })?;
        events_url
            .path_segments_mut()
            .map_err(|()| {
                CalendarError::Rejected(format!("calendar base url {} has no path", config.base_url))
            })?
            .pop_if_empty()
            .extend(["calendars", config.calendar_id.as_str(), "events"]);

        Ok(Self { http, events_url })
    }

    /// URL of one existing event. Event ids are base32hex per the Calendar
    /// API; anything else is refused before a request is made.
    fn event_url(&self, event_id: &str) -> Result<Url, CalendarError> {
        let well_formed = !event_id.is_empty()
            && event_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !well_formed {
            return Err(CalendarError::Rejected(format!(
                "malformed calendar event id {event_id:?}"
            )));
        }

        let mut url = self.events_url.clone();
        url.path_segments_mut()
            .map_err(|()| CalendarError::Rejected("calendar url has no path".to_string()))?
            .push(event_id);
        Ok(url)
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_or_update_event(
        &self,
        existing_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<EventReceipt, CalendarError> {
        let request = match existing_id {
            Some(id) => self.http.put(self.event_url(id)?),
            None => self.http.post(self.events_url.clone()),
        };

        let response = request.json(event).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let receipt: EventReceipt = response.json().await?;
        debug!(event_id = ?receipt.id, "calendar event stored");
        Ok(receipt)
    }
}

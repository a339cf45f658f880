use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CalendarClient, CalendarError, CalendarEvent, EventReceipt};

/// Offline calendar used when no external provider is configured. Events are
/// kept in memory under minted ids so routes still receive a calendar id.
#[derive(Default)]
pub struct LocalCalendar {
    events: DashMap<String, CalendarEvent>,
}

impl LocalCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&self, id: &str) -> Option<CalendarEvent> {
        self.events.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl CalendarClient for LocalCalendar {
    async fn create_or_update_event(
        &self,
        existing_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<EventReceipt, CalendarError> {
        let id = existing_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("local_{}", Uuid::new_v4().simple()));

        self.events.insert(id.clone(), event.clone());

        Ok(EventReceipt {
            id: Some(id),
            html_link: None,
        })
    }
}

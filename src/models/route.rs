use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::Status;
use crate::models::stop::{StopDraft, StopRef};

/// A driver's route as authored, before identities and calendar sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_finish: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<Status>,
    pub stops: Vec<StopDraft>,
    #[serde(default)]
    pub original_route_id: Option<String>,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp_created: Option<DateTime<Utc>>,
}

impl RouteDraft {
    pub fn new(
        scheduled_start: DateTime<Utc>,
        scheduled_finish: DateTime<Utc>,
        stops: Vec<StopDraft>,
    ) -> Self {
        Self {
            id: None,
            driver_id: None,
            scheduled_start,
            scheduled_finish,
            status: None,
            stops,
            original_route_id: None,
            calendar_event_id: None,
            notes: None,
            timestamp_created: None,
        }
    }

    /// Lineage root: the route this one was replicated from, or itself.
    pub fn lineage_root(&self) -> Option<&str> {
        self.original_route_id.as_deref().or(self.id.as_deref())
    }

    /// Fills what the draft leaves unset from the already-persisted version
    /// of the same route, so a re-submission updates its calendar event and
    /// keeps its lineage, status and notes.
    pub fn inherit_from(&mut self, stored: &Route) {
        if self.calendar_event_id.is_none() && !stored.calendar_event_id.trim().is_empty() {
            self.calendar_event_id = Some(stored.calendar_event_id.clone());
        }
        if self.original_route_id.is_none() {
            self.original_route_id = Some(stored.original_route_id.clone());
        }
        if self.status.is_none() {
            self.status = Some(stored.status);
        }
        if self.notes.is_none() && !stored.notes.is_empty() {
            self.notes = Some(stored.notes.clone());
        }
        if self.timestamp_created.is_none() {
            self.timestamp_created = Some(stored.timestamp_created);
        }
    }
}

/// The persisted route document. Full stop data lives in the pickup and
/// delivery collections; a route only embeds `{id, type}` references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub driver_id: Option<String>,
    pub status: Status,
    #[serde(rename = "timestamp_scheduled_start")]
    pub scheduled_start: DateTime<Utc>,
    #[serde(rename = "timestamp_scheduled_finish")]
    pub scheduled_finish: DateTime<Utc>,
    pub stops: Vec<StopRef>,
    pub calendar_event_id: String,
    pub original_route_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driving_distance: Option<f64>,
    #[serde(default)]
    pub notes: String,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_updated: DateTime<Utc>,
}

impl Route {
    pub fn is_recurrence_instance(&self) -> bool {
        self.original_route_id != self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Route, RouteDraft};
    use crate::models::status::Status;

    fn stored() -> Route {
        let created = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        Route {
            id: "r2".to_string(),
            driver_id: None,
            status: Status::InProgress,
            scheduled_start: created,
            scheduled_finish: created + Duration::hours(2),
            stops: Vec::new(),
            calendar_event_id: "evt_r2".to_string(),
            original_route_id: "r1".to_string(),
            driving_distance: None,
            notes: "side door".to_string(),
            timestamp_created: created,
            timestamp_updated: created,
        }
    }

    #[test]
    fn draft_without_persisted_fields_inherits_them() {
        let stored = stored();
        let mut draft = RouteDraft::new(stored.scheduled_start, stored.scheduled_finish, Vec::new());
        draft.id = Some("r2".to_string());

        draft.inherit_from(&stored);

        assert_eq!(draft.calendar_event_id.as_deref(), Some("evt_r2"));
        assert_eq!(draft.original_route_id.as_deref(), Some("r1"));
        assert_eq!(draft.status, Some(Status::InProgress));
        assert_eq!(draft.notes.as_deref(), Some("side door"));
        assert_eq!(draft.timestamp_created, Some(stored.timestamp_created));
    }

    #[test]
    fn fields_set_on_the_draft_win() {
        let stored = stored();
        let mut draft = RouteDraft::new(stored.scheduled_start, stored.scheduled_finish, Vec::new());
        draft.id = Some("r2".to_string());
        draft.status = Some(Status::Cancelled);
        draft.notes = Some("front door".to_string());

        draft.inherit_from(&stored);

        assert_eq!(draft.status, Some(Status::Cancelled));
        assert_eq!(draft.notes.as_deref(), Some("front door"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::Status;

pub const DEFAULT_PERCENT_DROPPED: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Pickup,
    Delivery,
}

impl StopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StopKind::Pickup => "pickup",
            StopKind::Delivery => "delivery",
        }
    }
}

/// Anything that occupies a slot in an ordered route sequence.
pub trait Sequenced {
    fn kind(&self) -> StopKind;
}

impl Sequenced for StopKind {
    fn kind(&self) -> StopKind {
        *self
    }
}

/// Weight breakdown recorded at a stop, in pounds. Unset weights are left
/// out of writes, so a merge keeps whatever was recorded at the stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactData {
    #[serde(rename = "impact_data_dairy", skip_serializing_if = "Option::is_none")]
    pub dairy: Option<f64>,
    #[serde(rename = "impact_data_bakery", skip_serializing_if = "Option::is_none")]
    pub bakery: Option<f64>,
    #[serde(rename = "impact_data_produce", skip_serializing_if = "Option::is_none")]
    pub produce: Option<f64>,
    #[serde(rename = "impact_data_meat_fish", skip_serializing_if = "Option::is_none")]
    pub meat_fish: Option<f64>,
    #[serde(rename = "impact_data_non_perishable", skip_serializing_if = "Option::is_none")]
    pub non_perishable: Option<f64>,
    #[serde(rename = "impact_data_prepared_frozen", skip_serializing_if = "Option::is_none")]
    pub prepared_frozen: Option<f64>,
    #[serde(rename = "impact_data_mixed", skip_serializing_if = "Option::is_none")]
    pub mixed: Option<f64>,
    #[serde(rename = "impact_data_other", skip_serializing_if = "Option::is_none")]
    pub other: Option<f64>,
    #[serde(rename = "impact_data_total_weight", skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<f64>,
}

impl ImpactData {
    /// Every weight the draft left unset becomes zero. Used only when the
    /// stop document is first created.
    pub fn or_zero(self) -> Self {
        Self {
            dairy: self.dairy.or(Some(0.0)),
            bakery: self.bakery.or(Some(0.0)),
            produce: self.produce.or(Some(0.0)),
            meat_fish: self.meat_fish.or(Some(0.0)),
            non_perishable: self.non_perishable.or(Some(0.0)),
            prepared_frozen: self.prepared_frozen.or(Some(0.0)),
            mixed: self.mixed.or(Some(0.0)),
            other: self.other.or(Some(0.0)),
            total_weight: self.total_weight.or(Some(0.0)),
        }
    }
}

/// The `{id, type}` pair a route embeds for each of its stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StopKind,
}

impl Sequenced for StopRef {
    fn kind(&self) -> StopKind {
        self.kind
    }
}

/// A stop as authored by a dispatcher, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub organization_id: String,
    pub location_id: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub original_stop_id: Option<String>,
    #[serde(flatten)]
    pub impact: ImpactData,
    #[serde(default)]
    pub percent_of_total_dropped: Option<u8>,
    #[serde(default)]
    pub timestamp_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp_logged_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp_logged_finish: Option<DateTime<Utc>>,
}

impl StopDraft {
    pub fn new(
        kind: StopKind,
        organization_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            kind,
            organization_id: organization_id.into(),
            location_id: location_id.into(),
            status: None,
            original_stop_id: None,
            impact: ImpactData::default(),
            percent_of_total_dropped: None,
            timestamp_created: None,
            timestamp_logged_start: None,
            timestamp_logged_finish: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Sequenced for StopDraft {
    fn kind(&self) -> StopKind {
        self.kind
    }
}

/// The persisted pickup or delivery document, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub route_id: String,
    pub organization_id: String,
    pub location_id: String,
    pub handler_id: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_stop_id: Option<String>,
    #[serde(flatten)]
    pub impact: ImpactData,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_updated: DateTime<Utc>,
    pub timestamp_scheduled_start: DateTime<Utc>,
    pub timestamp_scheduled_finish: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_logged_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_logged_finish: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_of_total_dropped: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_ids: Option<Vec<String>>,
}

/// What a submit writes for one stop. `None` fields are omitted from the
/// merge, so operational values already on the stored document survive a
/// re-submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopPatch {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub route_id: String,
    pub organization_id: String,
    pub location_id: String,
    pub handler_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_stop_id: Option<String>,
    #[serde(flatten)]
    pub impact: ImpactData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_created: Option<DateTime<Utc>>,
    pub timestamp_updated: DateTime<Utc>,
    pub timestamp_scheduled_start: DateTime<Utc>,
    pub timestamp_scheduled_finish: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_logged_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_logged_finish: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_total_dropped: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_ids: Option<Vec<String>>,
}

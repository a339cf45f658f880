use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::models::stop::StopRef;
use crate::store::{Collection, StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("calendar sync failed: {0}")]
    CalendarSync(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// A submission that stopped after its ids were assigned. The response
    /// carries them so a retry overwrites what was already written.
    #[error("{error}")]
    Interrupted {
        error: Box<AppError>,
        route_id: String,
        stops: Vec<StopRef>,
    },
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::CalendarSync(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("the route could not be added to the calendar: {msg}"),
            ),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Interrupted { error, .. } => error.status_and_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let mut body = json!({
            "error": message
        });
        if let AppError::Interrupted {
            route_id, stops, ..
        } = &self
        {
            body["route_id"] = json!(route_id);
            body["stops"] = json!(stops);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        let message = err.to_string();
        let assigned = err
            .assigned_ids()
            .map(|(route_id, stops)| (route_id.to_string(), stops.to_vec()));

        let error = match err {
            SubmitError::Validation(_) => AppError::BadRequest(message),
            SubmitError::CalendarSync { .. } => AppError::CalendarSync(message),
            SubmitError::Cancelled { .. } => AppError::Unavailable(message),
            _ => AppError::Internal(message),
        };

        match assigned {
            Some((route_id, stops)) => AppError::Interrupted {
                error: Box::new(error),
                route_id,
                stops,
            },
            None => error,
        }
    }
}

/// Why a stop sequence or route draft cannot be submitted yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route has no stops")]
    Empty,

    #[error("route needs at least one pickup")]
    NoPickup,

    #[error("route needs at least one delivery")]
    NoDelivery,

    #[error("route must end with a delivery")]
    EndsWithPickup,

    #[error("delivery {stop_id} has no pickups before it")]
    DeliveryWithoutPickups { stop_id: String },

    #[error("scheduled finish is before scheduled start")]
    FinishBeforeStart,

    #[error("delivery {stop_id} drops {percent}% of its load, expected 0-100")]
    PercentOutOfRange { stop_id: String, percent: u8 },

    #[error("stop {stop_id} references unknown location {location_id}")]
    UnknownLocation { stop_id: String, location_id: String },

    #[error("duplicate stop id {0}")]
    DuplicateStopId(String),

    #[error("recurrence would create {instances} routes, at most {max} are allowed")]
    RecurrenceTooLong { instances: usize, max: usize },

    #[error("recurrence interval of {days} days is out of range")]
    IntervalOutOfRange { days: i64 },

    #[error("route has no id to replicate")]
    MissingRouteId,

    #[error("stop at position {position} has no id to replicate")]
    MissingStopId { position: usize },
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("uniqueness check failed: {0}")]
    Store(#[from] StoreError),

    #[error("id generation cancelled")]
    Cancelled,
}

/// Failure of a route submission. Every variant names the route, stop or
/// collaborator involved so the caller can phrase a message.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("route is not ready to submit: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not generate a unique {entity} id: {source}")]
    IdentityGeneration {
        entity: &'static str,
        source: IdentityError,
    },

    #[error("failed to read {collection} {id}: {source}")]
    Lookup {
        collection: Collection,
        id: String,
        source: StoreError,
    },

    #[error("failed to write stop {stop_id} of route {route_id}: {source}")]
    StopWrite {
        route_id: String,
        stop_id: String,
        stops: Vec<StopRef>,
        source: StoreError,
    },

    #[error("calendar sync failed for route {route_id}: {reason}")]
    CalendarSync {
        route_id: String,
        stops: Vec<StopRef>,
        reason: String,
    },

    #[error("failed to write route {route_id}: {source}")]
    RouteWrite { route_id: String, source: StoreError },

    #[error("submission of route {route_id} was cancelled")]
    Cancelled {
        route_id: String,
        stops: Vec<StopRef>,
    },
}

impl SubmitError {
    pub fn identity(entity: &'static str, source: IdentityError) -> Self {
        SubmitError::IdentityGeneration { entity, source }
    }

    /// Ids assigned before a failure that may have left stop documents
    /// behind. Retrying with them overwrites those documents.
    pub fn assigned_ids(&self) -> Option<(&str, &[StopRef])> {
        match self {
            SubmitError::StopWrite {
                route_id, stops, ..
            }
            | SubmitError::CalendarSync {
                route_id, stops, ..
            }
            | SubmitError::Cancelled { route_id, stops } => {
                Some((route_id.as_str(), stops.as_slice()))
            }
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::Validation(_) => "validation",
            SubmitError::IdentityGeneration { .. } => "identity",
            SubmitError::Lookup { .. } => "lookup",
            SubmitError::StopWrite { .. } => "stop_write",
            SubmitError::CalendarSync { .. } => "calendar_sync",
            SubmitError::RouteWrite { .. } => "route_write",
            SubmitError::Cancelled { .. } => "cancelled",
        }
    }
}

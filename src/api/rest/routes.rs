use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::coordinator::stop_collection;
use crate::engine::linker::{DeliveryLink, link_deliveries};
use crate::engine::scheduler::Recurrence;
use crate::engine::validator::{check_linkage, check_sequence};
use crate::error::AppError;
use crate::models::route::{Route, RouteDraft};
use crate::models::stop::{Stop, StopRef};
use crate::state::AppState;
use crate::store::{self, Collection};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routes", post(create_route))
        .route("/routes/validate", post(validate_stops))
        .route("/routes/linkage", post(preview_linkage))
        .route("/routes/:id", get(get_route))
        .route("/routes/:id/stops", get(get_route_stops))
}

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    pub route: RouteDraft,
    #[serde(default)]
    pub end_recurring: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct StopSequenceRequest {
    pub stops: Vec<StopRef>,
}

#[derive(Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub reason: Option<String>,
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRouteRequest>,
) -> Result<Json<Vec<Route>>, AppError> {
    let cancel = state.shutdown.child_token();
    let recurrence = payload.end_recurring.map(Recurrence::daily_until);

    let routes = state
        .scheduler
        .schedule(payload.route, recurrence, &cancel)
        .await?;

    for route in &routes {
        let _ = state.route_events_tx.send(route.clone());
    }

    Ok(Json(routes))
}

async fn validate_stops(Json(payload): Json<StopSequenceRequest>) -> Json<ValidationResponse> {
    let result = check_sequence(&payload.stops).and_then(|()| check_linkage(&payload.stops));

    Json(ValidationResponse {
        valid: result.is_ok(),
        reason: result.err().map(|err| err.to_string()),
    })
}

async fn preview_linkage(Json(payload): Json<StopSequenceRequest>) -> Json<Vec<DeliveryLink>> {
    Json(link_deliveries(&payload.stops))
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Route>, AppError> {
    let route = store::fetch::<Route>(state.store.as_ref(), Collection::Routes, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))?;

    Ok(Json(route))
}

async fn get_route_stops(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Stop>>, AppError> {
    let route = store::fetch::<Route>(state.store.as_ref(), Collection::Routes, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))?;

    let mut stops = Vec::with_capacity(route.stops.len());
    for stop_ref in &route.stops {
        match store::fetch::<Stop>(state.store.as_ref(), stop_collection(stop_ref.kind), &stop_ref.id)
            .await?
        {
            Some(stop) => stops.push(stop),
            None => warn!(route_id = %id, stop_id = %stop_ref.id, "route references a missing stop"),
        }
    }

    Ok(Json(stops))
}

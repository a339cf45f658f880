use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::organization::{Location, Organization, OrganizationType};
use crate::state::AppState;
use crate::store::{self, Collection};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/organizations", post(create_organization).get(list_organizations))
        .route("/organizations/:id", get(get_organization))
        .route("/organizations/:id/locations", post(create_location))
        .route("/locations/:id", get(get_location))
}

#[derive(Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
}

#[derive(Deserialize)]
pub struct CreateLocationRequest {
    #[serde(default)]
    pub nickname: Option<String>,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

async fn create_organization(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let now = Utc::now();
    let organization = Organization {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        org_type: payload.org_type,
        primary_location_id: None,
        timestamp_created: now,
        timestamp_updated: now,
    };

    store::upsert(
        state.store.as_ref(),
        Collection::Organizations,
        &organization.id,
        &organization,
    )
    .await?;
    Ok(Json(organization))
}

async fn list_organizations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Organization>>, AppError> {
    let organizations =
        store::fetch_all::<Organization>(state.store.as_ref(), Collection::Organizations).await?;
    Ok(Json(organizations))
}

async fn get_organization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Organization>, AppError> {
    let organization =
        store::fetch::<Organization>(state.store.as_ref(), Collection::Organizations, &id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization {id} not found")))?;

    Ok(Json(organization))
}

/// Adds a location to an organization. The first location becomes the
/// organization's primary one.
async fn create_location(
    State(state): State<Arc<AppState>>,
    Path(organization_id): Path<String>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<Json<Location>, AppError> {
    let organization: Organization = store::fetch(
        state.store.as_ref(),
        Collection::Organizations,
        &organization_id,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("organization {organization_id} not found")))?;

    if payload.address1.trim().is_empty() || payload.city.trim().is_empty() {
        return Err(AppError::BadRequest(
            "address1 and city are required".to_string(),
        ));
    }

    let now = Utc::now();
    let location = Location {
        id: Uuid::new_v4().to_string(),
        organization_id: organization.id.clone(),
        nickname: payload.nickname,
        address1: payload.address1,
        address2: payload.address2,
        city: payload.city,
        state: payload.state,
        zip: payload.zip,
        coordinates: payload.coordinates,
        contact_name: payload.contact_name,
        contact_email: payload.contact_email,
        contact_phone: payload.contact_phone,
        instructions: payload.instructions,
        timestamp_created: now,
        timestamp_updated: now,
    };

    store::upsert(state.store.as_ref(), Collection::Locations, &location.id, &location).await?;

    if organization.primary_location_id.is_none() {
        state
            .store
            .set_merge(
                Collection::Organizations,
                &organization.id,
                json!({
                    "primary_location_id": location.id,
                    "timestamp_updated": now,
                }),
            )
            .await?;
    }

    Ok(Json(location))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Location>, AppError> {
    let location = store::fetch::<Location>(state.store.as_ref(), Collection::Locations, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("location {id} not found")))?;

    Ok(Json(location))
}

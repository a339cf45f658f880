use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::organization::Location;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("distance lookup failed: {0}")]
    Lookup(String),
}

/// Estimates the total driving distance for locations visited in order.
#[async_trait]
pub trait DistanceEstimator: Send + Sync {
    async fn total_driving_distance(&self, ordered: &[Location]) -> Result<f64, DistanceError>;
}

/// Great-circle approximation that sums the legs between consecutive
/// geocoded locations, in kilometres. Locations without coordinates are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct HaversineDistance;

#[async_trait]
impl DistanceEstimator for HaversineDistance {
    async fn total_driving_distance(&self, ordered: &[Location]) -> Result<f64, DistanceError> {
        let points: Vec<GeoPoint> = ordered
            .iter()
            .filter_map(|location| location.coordinates)
            .collect();

        Ok(points
            .windows(2)
            .map(|leg| haversine_km(&leg[0], &leg[1]))
            .sum())
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

//! Ordered write path for one route: stop documents, calendar event, route
//! document. There is no transaction across the three. A calendar failure
//! stops the route document from being written and leaves the stops in
//! place. The error reports the ids already assigned; a retry that carries
//! them overwrites those stops instead of adding new ones.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::calendar::{Attendee, CalendarClient, CalendarEvent, EventTime};
use crate::engine::identity::IdentityGenerator;
use crate::engine::{linker, validator};
use crate::error::{SubmitError, ValidationError};
use crate::geo::DistanceEstimator;
use crate::models::organization::{Location, Organization};
use crate::models::route::{Route, RouteDraft};
use crate::models::status::Status;
use crate::models::stop::{DEFAULT_PERCENT_DROPPED, StopDraft, StopKind, StopPatch, StopRef};
use crate::models::user::User;
use crate::observability::metrics::Metrics;
use crate::store::{self, Collection, DocumentStore, StoreError};

pub const UNASSIGNED_SUMMARY: &str = "Unassigned Food Rescue";

pub fn stop_collection(kind: StopKind) -> Collection {
    match kind {
        StopKind::Pickup => Collection::Pickups,
        StopKind::Delivery => Collection::Deliveries,
    }
}

/// Reference data resolved for one stop before anything is written.
#[derive(Debug, Clone)]
pub struct StopContext {
    pub location: Location,
    pub organization: Option<Organization>,
}

impl StopContext {
    fn describe(&self) -> String {
        let name = self
            .organization
            .as_ref()
            .map(|org| org.name.as_str())
            .unwrap_or(self.location.organization_id.as_str());
        format!("{name} ({})", self.location.label())
    }
}

/// Calendar entry mirroring a route: who drives, where it starts, and
/// every stop in order.
pub fn route_event(
    driver: Option<&User>,
    stops: &[StopContext],
    scheduled_start: DateTime<Utc>,
    scheduled_finish: DateTime<Utc>,
    zone: Tz,
) -> CalendarEvent {
    let summary = match driver {
        Some(User {
            name,
            phone: Some(phone),
            ..
        }) => format!("Food Rescue: {name} {phone}"),
        Some(user) => format!("Food Rescue: {}", user.name),
        None => UNASSIGNED_SUMMARY.to_string(),
    };

    let description = format!(
        "Stops on Route: {}",
        stops
            .iter()
            .map(StopContext::describe)
            .collect::<Vec<_>>()
            .join(", ")
    );

    CalendarEvent {
        summary,
        location: stops
            .first()
            .map(|stop| stop.location.address())
            .unwrap_or_default(),
        description,
        start: EventTime::in_zone(scheduled_start, zone),
        end: EventTime::in_zone(scheduled_finish, zone),
        attendees: driver
            .and_then(|user| user.email.clone())
            .map(|email| vec![Attendee { email }])
            .unwrap_or_default(),
    }
}

pub struct RoutePersistenceCoordinator {
    store: Arc<dyn DocumentStore>,
    calendar: Arc<dyn CalendarClient>,
    distance: Arc<dyn DistanceEstimator>,
    ids: IdentityGenerator,
    zone: Tz,
    metrics: Metrics,
}

impl RoutePersistenceCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        calendar: Arc<dyn CalendarClient>,
        distance: Arc<dyn DistanceEstimator>,
        zone: Tz,
        metrics: Metrics,
    ) -> Self {
        Self {
            ids: IdentityGenerator::new(store.clone()),
            store,
            calendar,
            distance,
            zone,
            metrics,
        }
    }

    pub fn ids(&self) -> &IdentityGenerator {
        &self.ids
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// The driver assigned to a draft, if the id resolves to a known user.
    pub async fn load_driver(&self, driver_id: Option<&str>) -> Result<Option<User>, SubmitError> {
        let Some(driver_id) = driver_id else {
            return Ok(None);
        };

        let driver = store::fetch::<User>(self.store(), Collection::Users, driver_id)
            .await
            .map_err(|source| lookup_failed(Collection::Users, driver_id, source))?;

        if driver.is_none() {
            warn!(driver_id, "driver not found; route will be listed as unassigned");
        }
        Ok(driver)
    }

    /// Persists one route. See the module docs for the write order and what
    /// each failure leaves behind.
    pub async fn submit(
        &self,
        draft: RouteDraft,
        cancel: &CancellationToken,
    ) -> Result<Route, SubmitError> {
        let started = Instant::now();
        let result = self.submit_inner(draft, cancel).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(route) => {
                self.metrics.observe_submission("success", elapsed);
                info!(route_id = %route.id, stops = route.stops.len(), "route persisted");
            }
            Err(err) => {
                self.metrics.observe_submission(err.kind(), elapsed);
                error!(error = %err, kind = err.kind(), "route submission failed");
            }
        }

        result
    }

    async fn submit_inner(
        &self,
        mut draft: RouteDraft,
        cancel: &CancellationToken,
    ) -> Result<Route, SubmitError> {
        validator::check_draft(&draft)?;

        let driver = self.load_driver(draft.driver_id.as_deref()).await?;

        if let Some(route_id) = draft.id.clone() {
            let stored = store::fetch::<Route>(self.store(), Collection::Routes, &route_id)
                .await
                .map_err(|source| lookup_failed(Collection::Routes, &route_id, source))?;
            if let Some(stored) = stored {
                debug!(route_id = %route_id, "re-submitting persisted route");
                draft.inherit_from(&stored);
            }
        }

        let route_seed = driver.as_ref().map(|d| d.name.as_str()).unwrap_or_default();
        let assigned = self.ids.assign(&mut draft, route_seed, cancel).await?;
        let route_id = assigned.route_id;

        validator::check_linkage(&assigned.stops)?;
        let contexts = self.load_contexts(&draft.stops, &assigned.stops).await?;

        let now = Utc::now();

        for (index, (stop_draft, stop_ref)) in draft.stops.iter().zip(&assigned.stops).enumerate() {
            ensure_active(cancel, &route_id, &assigned.stops)?;

            let collection = stop_collection(stop_ref.kind);
            let is_new = !store::exists(self.store(), collection, &stop_ref.id)
                .await
                .map_err(|source| lookup_failed(collection, &stop_ref.id, source))?;

            let stop = build_stop(
                &draft,
                stop_draft,
                stop_ref,
                &route_id,
                delivery_pickup_ids(&assigned.stops, index, stop_ref.kind),
                now,
                is_new,
            );

            store::upsert(self.store(), collection, &stop.id, &stop)
                .await
                .map_err(|source| SubmitError::StopWrite {
                    route_id: route_id.clone(),
                    stop_id: stop.id.clone(),
                    stops: assigned.stops.clone(),
                    source,
                })?;

            self.metrics
                .stops_written_total
                .with_label_values(&[stop.kind.as_str()])
                .inc();
            debug!(route_id = %route_id, stop_id = %stop.id, kind = stop.kind.as_str(), "stop written");
        }

        ensure_active(cancel, &route_id, &assigned.stops)?;

        let event = route_event(
            driver.as_ref(),
            &contexts,
            draft.scheduled_start,
            draft.scheduled_finish,
            self.zone,
        );
        let calendar_event_id = self
            .sync_calendar(&route_id, &assigned.stops, draft.calendar_event_id.as_deref(), &event)
            .await?;

        let locations: Vec<Location> = contexts.into_iter().map(|ctx| ctx.location).collect();
        let driving_distance = match self.distance.total_driving_distance(&locations).await {
            Ok(distance) => Some(distance),
            Err(err) => {
                warn!(route_id = %route_id, error = %err, "driving distance unavailable");
                None
            }
        };

        let route = Route {
            id: route_id.clone(),
            driver_id: draft.driver_id.clone(),
            status: draft.status.unwrap_or(Status::Scheduled),
            scheduled_start: draft.scheduled_start,
            scheduled_finish: draft.scheduled_finish,
            stops: assigned.stops,
            calendar_event_id,
            original_route_id: assigned.original_route_id,
            driving_distance,
            notes: draft.notes.clone().unwrap_or_default(),
            timestamp_created: draft.timestamp_created.unwrap_or(now),
            timestamp_updated: now,
        };

        store::upsert(self.store(), Collection::Routes, &route.id, &route)
            .await
            .map_err(|source| SubmitError::RouteWrite {
                route_id: route_id.clone(),
                source,
            })?;

        Ok(route)
    }

    async fn load_contexts(
        &self,
        drafts: &[StopDraft],
        refs: &[StopRef],
    ) -> Result<Vec<StopContext>, SubmitError> {
        let mut contexts = Vec::with_capacity(drafts.len());

        for (stop, stop_ref) in drafts.iter().zip(refs) {
            let location =
                store::fetch::<Location>(self.store(), Collection::Locations, &stop.location_id)
                    .await
                    .map_err(|source| {
                        lookup_failed(Collection::Locations, &stop.location_id, source)
                    })?
                    .ok_or_else(|| ValidationError::UnknownLocation {
                        stop_id: stop_ref.id.clone(),
                        location_id: stop.location_id.clone(),
                    })?;

            let organization = store::fetch::<Organization>(
                self.store(),
                Collection::Organizations,
                &stop.organization_id,
            )
            .await
            .map_err(|source| {
                lookup_failed(Collection::Organizations, &stop.organization_id, source)
            })?;

            contexts.push(StopContext {
                location,
                organization,
            });
        }

        Ok(contexts)
    }

    async fn sync_calendar(
        &self,
        route_id: &str,
        stops: &[StopRef],
        existing_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<String, SubmitError> {
        let outcome = self
            .calendar
            .create_or_update_event(existing_id, event)
            .await
            .map_err(|err| err.to_string())
            .and_then(|receipt| {
                receipt
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| "calendar returned no event id".to_string())
            });

        match outcome {
            Ok(event_id) => {
                info!(route_id, event_id = %event_id, "calendar event synced");
                Ok(event_id)
            }
            Err(reason) => {
                self.metrics.calendar_sync_failures_total.inc();
                error!(route_id, reason = %reason, "calendar sync failed; route document not written");
                Err(SubmitError::CalendarSync {
                    route_id: route_id.to_string(),
                    stops: stops.to_vec(),
                    reason,
                })
            }
        }
    }
}

fn ensure_active(
    cancel: &CancellationToken,
    route_id: &str,
    stops: &[StopRef],
) -> Result<(), SubmitError> {
    if cancel.is_cancelled() {
        return Err(SubmitError::Cancelled {
            route_id: route_id.to_string(),
            stops: stops.to_vec(),
        });
    }
    Ok(())
}

fn lookup_failed(collection: Collection, id: &str, source: StoreError) -> SubmitError {
    SubmitError::Lookup {
        collection,
        id: id.to_string(),
        source,
    }
}

fn delivery_pickup_ids(stops: &[StopRef], index: usize, kind: StopKind) -> Option<Vec<String>> {
    match kind {
        StopKind::Delivery => Some(linker::pickup_ids(stops, index)),
        StopKind::Pickup => None,
    }
}

/// Fields for one stop write. A stop seen for the first time gets the
/// defaults (scheduled status, zero weights, full drop); an existing one only
/// receives what the draft actually sets, so recorded progress is kept.
fn build_stop(
    route: &RouteDraft,
    draft: &StopDraft,
    stop_ref: &StopRef,
    route_id: &str,
    pickup_ids: Option<Vec<String>>,
    now: DateTime<Utc>,
    is_new: bool,
) -> StopPatch {
    let percent_of_total_dropped = match stop_ref.kind {
        StopKind::Delivery if is_new => Some(
            draft
                .percent_of_total_dropped
                .unwrap_or(DEFAULT_PERCENT_DROPPED),
        ),
        StopKind::Delivery => draft.percent_of_total_dropped,
        StopKind::Pickup => None,
    };

    let (status, impact, timestamp_created) = if is_new {
        (
            Some(draft.status.unwrap_or(Status::Scheduled)),
            draft.impact.clone().or_zero(),
            Some(draft.timestamp_created.unwrap_or(now)),
        )
    } else {
        (draft.status, draft.impact.clone(), draft.timestamp_created)
    };

    StopPatch {
        id: stop_ref.id.clone(),
        kind: stop_ref.kind,
        route_id: route_id.to_string(),
        organization_id: draft.organization_id.clone(),
        location_id: draft.location_id.clone(),
        handler_id: route.driver_id.clone(),
        status,
        original_stop_id: draft.original_stop_id.clone(),
        impact,
        timestamp_created,
        timestamp_updated: now,
        timestamp_scheduled_start: route.scheduled_start,
        timestamp_scheduled_finish: route.scheduled_finish,
        timestamp_logged_start: draft.timestamp_logged_start,
        timestamp_logged_finish: draft.timestamp_logged_finish,
        percent_of_total_dropped,
        pickup_ids,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{StopContext, UNASSIGNED_SUMMARY, route_event};
    use crate::models::organization::{Location, Organization, OrganizationType};
    use crate::models::user::User;

    fn context(org_name: Option<&str>, nickname: Option<&str>) -> StopContext {
        let now = Utc::now();
        StopContext {
            location: Location {
                id: "loc".to_string(),
                organization_id: "org_fallback".to_string(),
                nickname: nickname.map(str::to_string),
                address1: "400 N Broad St".to_string(),
                address2: None,
                city: "Philadelphia".to_string(),
                state: "PA".to_string(),
                zip: "19130".to_string(),
                coordinates: None,
                contact_name: None,
                contact_email: None,
                contact_phone: None,
                instructions: None,
                timestamp_created: now,
                timestamp_updated: now,
            },
            organization: org_name.map(|name| Organization {
                id: "org".to_string(),
                name: name.to_string(),
                org_type: OrganizationType::Retail,
                primary_location_id: None,
                timestamp_created: now,
                timestamp_updated: now,
            }),
        }
    }

    #[test]
    fn unassigned_event_has_no_attendees() {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        let event = route_event(
            None,
            &[context(Some("Corner Market"), None), context(None, Some("Fridge"))],
            start,
            start,
            chrono_tz::America::New_York,
        );

        assert_eq!(event.summary, UNASSIGNED_SUMMARY);
        assert!(event.attendees.is_empty());
        assert_eq!(event.location, "400 N Broad St, Philadelphia, PA 19130");
        assert_eq!(
            event.description,
            "Stops on Route: Corner Market (400 N Broad St), org_fallback (Fridge)"
        );
        assert_eq!(event.start.date_time, "2024-06-03T09:00:00-04:00");
        assert_eq!(event.start.time_zone, "America/New_York");
    }

    #[test]
    fn assigned_event_names_and_invites_the_driver() {
        let now = Utc::now();
        let driver = User {
            id: "u1".to_string(),
            name: "Rae Kim".to_string(),
            email: Some("rae@example.org".to_string()),
            phone: Some("215-555-0101".to_string()),
            is_driver: true,
            is_admin: false,
            timestamp_created: now,
            timestamp_updated: now,
        };

        let event = route_event(
            Some(&driver),
            &[context(Some("Corner Market"), None)],
            now,
            now,
            chrono_tz::UTC,
        );

        assert_eq!(event.summary, "Food Rescue: Rae Kim 215-555-0101");
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.attendees[0].email, "rae@example.org");
    }
}

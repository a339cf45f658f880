//! Replicates a base route across a daily (or other fixed) schedule.

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::identity::IdentityGenerator;
use crate::error::{SubmitError, ValidationError};
use crate::models::route::RouteDraft;
use crate::models::stop::StopDraft;

pub fn default_interval() -> Duration {
    Duration::days(1)
}

/// Start times of every instance: `start` itself, then each step of
/// `interval` that lands on or before `until`. A non-positive interval yields
/// only `start`.
pub fn occurrences(
    start: DateTime<Utc>,
    interval: Duration,
    until: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let mut starts = vec![start];
    if interval <= Duration::zero() {
        return starts;
    }

    let mut next = start.checked_add_signed(interval);
    while let Some(at) = next.filter(|at| *at <= until) {
        starts.push(at);
        next = at.checked_add_signed(interval);
    }
    starts
}

/// How many starts `occurrences` would produce, without building them. An
/// interval too small to measure counts as unbounded.
pub fn occurrence_count(start: DateTime<Utc>, interval: Duration, until: DateTime<Utc>) -> usize {
    if interval <= Duration::zero() || until < start {
        return 1;
    }

    (until - start)
        .num_milliseconds()
        .checked_div(interval.num_milliseconds())
        .and_then(|steps| usize::try_from(steps).ok())
        .map_or(usize::MAX, |steps| steps.saturating_add(1))
}

/// Id of the clone of `base_stop_id` made for 1-based `iteration`.
pub fn cloned_stop_id(base_stop_id: &str, iteration: usize) -> String {
    format!("{base_stop_id}_{iteration}")
}

/// Copies a stop for a later instance. Operational state (status, logged
/// times, creation time) starts fresh; the lineage points at the base stop.
fn clone_stop(base: &StopDraft, base_id: &str, iteration: usize) -> StopDraft {
    StopDraft {
        id: Some(cloned_stop_id(base_id, iteration)),
        original_stop_id: Some(base_id.to_string()),
        status: None,
        timestamp_created: None,
        timestamp_logged_start: None,
        timestamp_logged_finish: None,
        ..base.clone()
    }
}

/// Builds the draft for `iteration` from a base whose ids are all assigned.
pub fn replicate(
    base: &RouteDraft,
    iteration: usize,
    route_id: String,
    offset: Duration,
) -> Result<RouteDraft, ValidationError> {
    let lineage = base
        .lineage_root()
        .ok_or(ValidationError::MissingRouteId)?
        .to_string();
    let stops = base
        .stops
        .iter()
        .enumerate()
        .map(|(position, stop)| {
            stop.id
                .as_deref()
                .map(|base_id| clone_stop(stop, base_id, iteration))
                .ok_or(ValidationError::MissingStopId { position })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteDraft {
        id: Some(route_id),
        original_route_id: Some(lineage),
        scheduled_start: base.scheduled_start + offset,
        scheduled_finish: base.scheduled_finish + offset,
        status: None,
        stops,
        calendar_event_id: None,
        timestamp_created: None,
        ..base.clone()
    })
}

#[derive(Clone)]
pub struct RecurrenceExpander {
    ids: IdentityGenerator,
}

impl RecurrenceExpander {
    pub fn new(ids: IdentityGenerator) -> Self {
        Self { ids }
    }

    /// Expands `base` into one draft per occurrence, base first, in
    /// chronological order. Missing ids on the base are assigned before
    /// cloning; each later instance gets a freshly generated route id.
    pub async fn expand(
        &self,
        mut base: RouteDraft,
        interval: Duration,
        until: DateTime<Utc>,
        route_seed: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RouteDraft>, SubmitError> {
        self.ids.assign(&mut base, route_seed, cancel).await?;

        let starts = occurrences(base.scheduled_start, interval, until);
        let mut drafts = Vec::with_capacity(starts.len());

        for (iteration, start) in starts.iter().enumerate().skip(1) {
            let route_id = self
                .ids
                .route_id(route_seed, cancel)
                .await
                .map_err(|err| SubmitError::identity("route", err))?;

            let offset = *start - base.scheduled_start;
            drafts.push(replicate(&base, iteration, route_id, offset)?);
        }

        info!(
            route_id = base.id.as_deref().unwrap_or_default(),
            instances = drafts.len() + 1,
            "expanded recurring route"
        );

        drafts.insert(0, base);
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use tokio_util::sync::CancellationToken;

    use super::{RecurrenceExpander, cloned_stop_id, occurrence_count, occurrences, replicate};
    use crate::engine::identity::IdentityGenerator;
    use crate::error::ValidationError;
    use crate::models::route::RouteDraft;
    use crate::models::status::Status;
    use crate::models::stop::{StopDraft, StopKind};
    use crate::store::memory::MemoryStore;

    fn base_draft() -> RouteDraft {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap();
        let mut pickup = StopDraft::new(StopKind::Pickup, "market", "loc_market").with_id("p");
        pickup.status = Some(Status::Completed);
        pickup.timestamp_logged_start = Some(start);

        let mut draft = RouteDraft::new(
            start,
            start + Duration::hours(2),
            vec![
                pickup,
                StopDraft::new(StopKind::Delivery, "fridge", "loc_fridge").with_id("d"),
            ],
        );
        draft.id = Some("base".to_string());
        draft.original_route_id = Some("base".to_string());
        draft.driver_id = Some("driver_1".to_string());
        draft.calendar_event_id = Some("evt_base".to_string());
        draft
    }

    fn expander() -> RecurrenceExpander {
        RecurrenceExpander::new(IdentityGenerator::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn three_days_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let starts = occurrences(start, Duration::days(1), start + Duration::days(2));
        assert_eq!(
            starts,
            vec![start, start + Duration::days(1), start + Duration::days(2)]
        );
    }

    #[test]
    fn until_before_start_yields_base_only() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(
            occurrences(start, Duration::days(1), start - Duration::days(3)),
            vec![start]
        );
        assert_eq!(occurrences(start, Duration::zero(), start + Duration::days(3)), vec![start]);
    }

    #[test]
    fn replica_resets_operational_state_and_keeps_lineage() {
        let base = base_draft();
        let copy = replicate(&base, 2, "r2".to_string(), Duration::days(2)).unwrap();

        assert_eq!(copy.id.as_deref(), Some("r2"));
        assert_eq!(copy.original_route_id.as_deref(), Some("base"));
        assert_eq!(copy.driver_id.as_deref(), Some("driver_1"));
        assert!(copy.calendar_event_id.is_none());
        assert_eq!(copy.scheduled_start, base.scheduled_start + Duration::days(2));
        assert_eq!(copy.scheduled_finish, base.scheduled_finish + Duration::days(2));

        let pickup = &copy.stops[0];
        assert_eq!(pickup.id.as_deref(), Some("p_2"));
        assert_eq!(pickup.original_stop_id.as_deref(), Some("p"));
        assert!(pickup.status.is_none());
        assert!(pickup.timestamp_logged_start.is_none());
        assert_eq!(pickup.location_id, "loc_market");
    }

    #[test]
    fn replica_of_an_instance_points_at_the_lineage_root() {
        let mut instance = base_draft();
        instance.id = Some("second".to_string());
        instance.original_route_id = Some("root".to_string());

        let copy = replicate(&instance, 1, "third".to_string(), Duration::days(1)).unwrap();
        assert_eq!(copy.original_route_id.as_deref(), Some("root"));
    }

    #[test]
    fn replicate_needs_stop_ids() {
        let mut base = base_draft();
        base.stops[1].id = None;
        assert_eq!(
            replicate(&base, 1, "r".to_string(), Duration::days(1)),
            Err(ValidationError::MissingStopId { position: 1 })
        );

        let mut unnamed = base_draft();
        unnamed.id = None;
        unnamed.original_route_id = None;
        assert_eq!(
            replicate(&unnamed, 1, "r".to_string(), Duration::days(1)),
            Err(ValidationError::MissingRouteId)
        );
    }

    #[tokio::test]
    async fn expand_produces_one_draft_per_day() {
        let base = base_draft();
        let until = base.scheduled_start + Duration::days(2);

        let drafts = expander()
            .expand(base.clone(), Duration::days(1), until, "driver", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0], base);

        let route_ids: HashSet<_> = drafts.iter().map(|d| d.id.clone().unwrap()).collect();
        assert_eq!(route_ids.len(), 3);

        for (k, draft) in drafts.iter().enumerate() {
            assert_eq!(draft.scheduled_start, base.scheduled_start + Duration::days(k as i64));
            assert_eq!(draft.original_route_id.as_deref(), Some("base"));
        }

        let pickup_ids: HashSet<_> = drafts
            .iter()
            .map(|d| d.stops[0].id.clone().unwrap())
            .collect();
        assert_eq!(pickup_ids.len(), 3);
        assert!(drafts[1..]
            .iter()
            .all(|d| d.stops[0].original_stop_id.as_deref() == Some("p")));
    }

    #[tokio::test]
    async fn expand_assigns_missing_base_ids_first() {
        let mut base = base_draft();
        base.id = None;
        base.original_route_id = None;
        base.stops[0].id = None;
        let until = base.scheduled_start + Duration::days(1);

        let drafts = expander()
            .expand(base, Duration::days(1), until, "Sam", &CancellationToken::new())
            .await
            .unwrap();

        let base_id = drafts[0].id.clone().unwrap();
        assert!(base_id.starts_with("sam_"));
        assert_eq!(drafts[1].original_route_id.as_deref(), Some(base_id.as_str()));

        let base_pickup = drafts[0].stops[0].id.clone().unwrap();
        assert_eq!(
            drafts[1].stops[0].id.as_deref(),
            Some(cloned_stop_id(&base_pickup, 1).as_str())
        );
    }

    proptest! {
        /// Count is floor((until - start) / interval) + 1, clamped to at least one.
        #[test]
        fn occurrence_count_matches_span(days in -5i64..40, hours in 1i64..72) {
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
            let interval = Duration::hours(hours);
            let until = start + Duration::days(days);
            let starts = occurrences(start, interval, until);

            let span = (until - start).num_hours();
            let expected = if span < 0 { 1 } else { (span / hours) as usize + 1 };
            prop_assert_eq!(starts.len(), expected);
            prop_assert_eq!(occurrence_count(start, interval, until), expected);
            prop_assert!(starts.windows(2).all(|w| w[1] - w[0] == interval));
        }

        /// Clone ids of one base stop never repeat across iterations.
        #[test]
        fn clone_ids_are_distinct_per_base_stop(base in "[a-z0-9_]{1,12}", n in 1usize..60) {
            let ids: HashSet<_> = (1..=n).map(|k| cloned_stop_id(&base, k)).collect();
            prop_assert_eq!(ids.len(), n);
            prop_assert!(!ids.contains(&base));
        }
    }
}

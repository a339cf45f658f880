use std::sync::Arc;

use chrono_tz::Tz;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::calendar::CalendarClient;
use crate::engine::coordinator::RoutePersistenceCoordinator;
use crate::engine::scheduler::RouteScheduler;
use crate::geo::DistanceEstimator;
use crate::models::route::Route;
use crate::observability::metrics::Metrics;
use crate::store::DocumentStore;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub scheduler: RouteScheduler,
    pub route_events_tx: broadcast::Sender<Route>,
    pub metrics: Metrics,
    /// Parent of every per-request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        calendar: Arc<dyn CalendarClient>,
        distance: Arc<dyn DistanceEstimator>,
        time_zone: Tz,
        event_buffer_size: usize,
    ) -> Self {
        let (route_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let metrics = Metrics::new();

        let coordinator = RoutePersistenceCoordinator::new(
            store.clone(),
            calendar,
            distance,
            time_zone,
            metrics.clone(),
        );

        Self {
            store,
            scheduler: RouteScheduler::new(coordinator, metrics.clone()),
            route_events_tx,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_max_recurrence_instances(mut self, max_instances: usize) -> Self {
        self.scheduler = self.scheduler.with_max_instances(max_instances);
        self
    }
}

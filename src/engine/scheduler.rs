use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::coordinator::RoutePersistenceCoordinator;
use crate::engine::recurrence::{RecurrenceExpander, default_interval, occurrence_count};
use crate::engine::validator;
use crate::error::{SubmitError, ValidationError};
use crate::models::route::{Route, RouteDraft};
use crate::observability::metrics::Metrics;

/// A year of daily routes, base included.
pub const DEFAULT_MAX_INSTANCES: usize = 366;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Recurrence {
    pub until: DateTime<Utc>,
    #[serde(default = "default_interval_days")]
    pub interval_days: i64,
}

fn default_interval_days() -> i64 {
    default_interval().num_days()
}

impl Recurrence {
    pub fn daily_until(until: DateTime<Utc>) -> Self {
        Self {
            until,
            interval_days: default_interval_days(),
        }
    }

    pub fn interval(&self) -> Result<Duration, ValidationError> {
        let out_of_range = ValidationError::IntervalOutOfRange {
            days: self.interval_days,
        };
        if self.interval_days < 1 {
            return Err(out_of_range);
        }
        Duration::try_days(self.interval_days).ok_or(out_of_range)
    }
}

/// Entry point for a dispatcher's "create route": validates, expands any
/// recurrence and submits each instance one after another, oldest first.
pub struct RouteScheduler {
    coordinator: RoutePersistenceCoordinator,
    expander: RecurrenceExpander,
    metrics: Metrics,
    max_instances: usize,
}

impl RouteScheduler {
    pub fn new(coordinator: RoutePersistenceCoordinator, metrics: Metrics) -> Self {
        Self {
            expander: RecurrenceExpander::new(coordinator.ids().clone()),
            coordinator,
            metrics,
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }

    /// Caps how many routes one recurring request may create.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances.max(1);
        self
    }

    pub fn coordinator(&self) -> &RoutePersistenceCoordinator {
        &self.coordinator
    }

    /// Persists the draft and every recurrence instance. Instances are
    /// submitted sequentially; the first failure stops the run and is
    /// returned, leaving earlier instances persisted.
    pub async fn schedule(
        &self,
        draft: RouteDraft,
        recurrence: Option<Recurrence>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Route>, SubmitError> {
        validator::check_draft(&draft)?;

        let drafts = match recurrence {
            Some(recurrence) => {
                let interval = recurrence.interval()?;
                let instances = occurrence_count(draft.scheduled_start, interval, recurrence.until);
                if instances > self.max_instances {
                    return Err(ValidationError::RecurrenceTooLong {
                        instances,
                        max: self.max_instances,
                    }
                    .into());
                }

                let driver = self
                    .coordinator
                    .load_driver(draft.driver_id.as_deref())
                    .await?;
                let seed = driver.map(|d| d.name).unwrap_or_default();

                self.expander
                    .expand(draft, interval, recurrence.until, &seed, cancel)
                    .await?
            }
            None => vec![draft],
        };

        self.metrics
            .recurrence_instances_total
            .inc_by(drafts.len() as u64);

        let total = drafts.len();
        let mut routes = Vec::with_capacity(total);

        for (iteration, instance) in drafts.into_iter().enumerate() {
            match self.coordinator.submit(instance, cancel).await {
                Ok(route) => routes.push(route),
                Err(err) => {
                    warn!(
                        iteration,
                        persisted = routes.len(),
                        total,
                        "stopping recurring submission after failure"
                    );
                    return Err(err);
                }
            }
        }

        info!(routes = routes.len(), "route schedule persisted");
        Ok(routes)
    }
}

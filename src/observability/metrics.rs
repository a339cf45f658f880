use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub route_submissions_total: IntCounterVec,
    pub route_submit_latency_seconds: HistogramVec,
    pub stops_written_total: IntCounterVec,
    pub calendar_sync_failures_total: IntCounter,
    pub recurrence_instances_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let route_submissions_total = IntCounterVec::new(
            Opts::new("route_submissions_total", "Route submissions by outcome"),
            &["outcome"],
        )
        .expect("valid route_submissions_total metric");

        let route_submit_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "route_submit_latency_seconds",
                "Latency of a full route submission in seconds",
            ),
            &["outcome"],
        )
        .expect("valid route_submit_latency_seconds metric");

        let stops_written_total = IntCounterVec::new(
            Opts::new("stops_written_total", "Stop documents written by kind"),
            &["kind"],
        )
        .expect("valid stops_written_total metric");

        let calendar_sync_failures_total = IntCounter::new(
            "calendar_sync_failures_total",
            "Submissions aborted because the calendar sync failed",
        )
        .expect("valid calendar_sync_failures_total metric");

        let recurrence_instances_total = IntCounter::new(
            "recurrence_instances_total",
            "Route instances produced by recurrence expansion, base included",
        )
        .expect("valid recurrence_instances_total metric");

        registry
            .register(Box::new(route_submissions_total.clone()))
            .expect("register route_submissions_total");
        registry
            .register(Box::new(route_submit_latency_seconds.clone()))
            .expect("register route_submit_latency_seconds");
        registry
            .register(Box::new(stops_written_total.clone()))
            .expect("register stops_written_total");
        registry
            .register(Box::new(calendar_sync_failures_total.clone()))
            .expect("register calendar_sync_failures_total");
        registry
            .register(Box::new(recurrence_instances_total.clone()))
            .expect("register recurrence_instances_total");

        Self {
            registry,
            route_submissions_total,
            route_submit_latency_seconds,
            stops_written_total,
            calendar_sync_failures_total,
            recurrence_instances_total,
        }
    }

    pub fn observe_submission(&self, outcome: &str, elapsed_secs: f64) {
        self.route_submit_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_secs);
        self.route_submissions_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn encoded_output_lists_submission_outcomes() {
        let metrics = Metrics::new();
        metrics.observe_submission("success", 0.25);
        metrics.calendar_sync_failures_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("route_submissions_total{outcome=\"success\"} 1"));
        assert!(text.contains("calendar_sync_failures_total 1"));
    }
}

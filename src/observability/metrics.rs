use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub feed_events_total: IntCounterVec,
    pub matches_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub side_effect_failures_total: IntCounterVec,
    pub alerts_emitted_total: IntCounterVec,
    pub monitor_runs_total: IntCounterVec,
    pub outbound_failures_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let feed_events_total = IntCounterVec::new(
            Opts::new("feed_events_total", "Change events by collection and outcome"),
            &["collection", "outcome"],
        )
        .expect("valid feed_events_total metric");

        let matches_total = IntCounterVec::new(
            Opts::new("matches_total", "Driver matching passes by outcome"),
            &["outcome"],
        )
        .expect("valid matches_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of one driver matching pass in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Applied order transitions by target status"),
            &["status"],
        )
        .expect("valid transitions_total metric");

        let side_effect_failures_total = IntCounterVec::new(
            Opts::new(
                "side_effect_failures_total",
                "Best-effort creation side effects that failed",
            ),
            &["effect"],
        )
        .expect("valid side_effect_failures_total metric");

        let alerts_emitted_total = IntCounterVec::new(
            Opts::new("alerts_emitted_total", "Health alerts emitted by severity"),
            &["severity"],
        )
        .expect("valid alerts_emitted_total metric");

        let monitor_runs_total = IntCounterVec::new(
            Opts::new("monitor_runs_total", "Scheduled monitor runs by outcome"),
            &["monitor", "outcome"],
        )
        .expect("valid monitor_runs_total metric");

        let outbound_failures_total = IntCounterVec::new(
            Opts::new("outbound_failures_total", "Failed outbound deliveries by channel"),
            &["channel"],
        )
        .expect("valid outbound_failures_total metric");

        for collector in [
            &feed_events_total,
            &matches_total,
            &transitions_total,
            &side_effect_failures_total,
            &alerts_emitted_total,
            &monitor_runs_total,
            &outbound_failures_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("register counter");
        }
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");

        Self {
            registry,
            feed_events_total,
            matches_total,
            match_latency_seconds,
            transitions_total,
            side_effect_failures_total,
            alerts_emitted_total,
            monitor_runs_total,
            outbound_failures_total,
        }
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

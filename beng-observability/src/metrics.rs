use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Prometheus metrics for one worker process (§6 external interfaces,
/// `observability` config section). Collected per-process; each worker
/// thread records into the same registry since `prometheus`'s types are
/// `Sync` and cheaply cloneable handles around shared atomics.
pub struct MetricsCollector {
    registry: Registry,

    /// Total requests handled, by method and response status.
    pub requests_total: IntCounterVec,

    /// End-to-end request latency, from accept to final byte written.
    pub request_duration: HistogramVec,

    /// Currently open client connections.
    pub active_connections: IntGauge,

    /// Upstream dispatch latency, by resource address kind (§4.4/§4.7).
    pub upstream_latency: HistogramVec,

    /// Response cache hit/miss counts (§4.6).
    pub cache_lookups_total: IntCounterVec,

    /// Translation round-trips, by outcome (hit/miss/error, §4.5).
    pub translation_requests_total: IntCounterVec,

    /// Widgets rendered, by outcome (ok/forbidden/error, §4.8).
    pub widgets_rendered_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("beng_requests_total", "Total client requests handled").namespace("beng"),
            &["method", "status"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("beng_request_duration_seconds", "Client request latency")
                .namespace("beng")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )?;

        let active_connections =
            IntGauge::new("beng_active_connections", "Open client connections")?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new("beng_upstream_latency_seconds", "Upstream dispatch latency")
                .namespace("beng")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["address"],
        )?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("beng_cache_lookups_total", "Response cache lookups").namespace("beng"),
            &["outcome"],
        )?;

        let translation_requests_total = IntCounterVec::new(
            Opts::new("beng_translation_requests_total", "Translation server round-trips")
                .namespace("beng"),
            &["outcome"],
        )?;

        let widgets_rendered_total = IntCounterVec::new(
            Opts::new("beng_widgets_rendered_total", "Widget sub-requests rendered").namespace("beng"),
            &["outcome"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(translation_requests_total.clone()))?;
        registry.register(Box::new(widgets_rendered_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            active_connections,
            upstream_latency,
            cache_lookups_total,
            translation_requests_total,
            widgets_rendered_total,
        })
    }

    pub fn record_request(&self, method: &str, status: u16, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        self.cache_lookups_total
            .with_label_values(&[if hit { "hit" } else { "miss" }])
            .inc();
    }

    /// Prometheus text exposition (served at `observability.prometheus_path`).
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to create metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_increments_the_matching_label_set() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_request("GET", 200, 0.01);
        let text = collector.gather_text();
        assert!(text.contains("beng_requests_total"));
    }

    #[test]
    fn cache_lookup_outcomes_are_distinguished() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_cache_lookup(true);
        collector.record_cache_lookup(false);
        let text = collector.gather_text();
        assert!(text.contains("beng_cache_lookups_total"));
    }
}

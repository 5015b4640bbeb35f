//! Prometheus metrics for the proxy: a `Registry` plus one field per
//! metric, registered once in `new`. Covers request volume/latency,
//! cache hit/miss, and autostart run counts.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct MetricsCollector {
    registry: Registry,

    /// Total HTTP requests, labeled by resolved status page / outcome.
    pub http_requests_total: IntCounterVec,

    /// Request latency, labeled by outcome.
    pub http_request_duration: HistogramVec,

    /// Upstream response time, labeled by project--service.
    pub upstream_latency: HistogramVec,

    /// Project/address cache hits and misses, labeled by cache name.
    pub cache_lookups_total: IntCounterVec,

    /// Autostart `start` invocations that actually reached the engine
    /// (i.e. weren't ignored by the single-run guard, §4.7).
    pub autostart_runs_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("riptide_http_requests_total", "Total HTTP requests")
                .namespace("riptide"),
            &["outcome"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "riptide_http_request_duration_seconds",
                "Request latency",
            )
            .namespace("riptide")
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["outcome"],
        )?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new(
                "riptide_upstream_latency_seconds",
                "Upstream response time",
            )
            .namespace("riptide")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["service_key"],
        )?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("riptide_cache_lookups_total", "Cache hits/misses")
                .namespace("riptide"),
            &["cache", "outcome"],
        )?;

        let autostart_runs_total = IntCounterVec::new(
            Opts::new("riptide_autostart_runs_total", "Autostart engine invocations")
                .namespace("riptide"),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(autostart_runs_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            upstream_latency,
            cache_lookups_total,
            autostart_runs_total,
        })
    }

    /// Records a completed HTTP request, `outcome` being e.g. `"success"`,
    /// `"not_started"`, `"bad_gateway"`.
    pub fn record_request(&self, outcome: &str, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[outcome])
            .inc();
        self.http_request_duration
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, cache: &str, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        self.cache_lookups_total
            .with_label_values(&[cache, outcome])
            .inc();
    }

    pub fn record_autostart_run(&self, outcome: &str) {
        self.autostart_runs_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Prometheus text exposition, served at `/metrics`.
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
        Self::new().expect("failed to construct metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_text_includes_registered_metric_names() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_request("success", 0.01);
        collector.record_cache_lookup("project", true);
        collector.record_autostart_run("started");

        let text = collector.gather_text();
        assert!(text.contains("riptide_http_requests_total"));
        assert!(text.contains("riptide_cache_lookups_total"));
        assert!(text.contains("riptide_autostart_runs_total"));
    }
}

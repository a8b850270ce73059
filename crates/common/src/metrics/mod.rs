//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all NoteForge metrics
pub const METRICS_PREFIX: &str = "noteforge";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.075, // 75ms
    0.100, // 100ms
    0.150, // 150ms - P99 target
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Note metrics
    describe_counter!(
        format!("{}_notes_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total notes created"
    );

    describe_counter!(
        format!("{}_note_limit_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Note creations rejected by the free-plan ceiling"
    );

    // Upgrade workflow metrics
    describe_counter!(
        format!("{}_upgrade_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total upgrade requests submitted"
    );

    describe_counter!(
        format!("{}_upgrade_reviews_total", METRICS_PREFIX),
        Unit::Count,
        "Upgrade requests reviewed, labelled by outcome"
    );

    describe_counter!(
        format!("{}_pro_grants_total", METRICS_PREFIX),
        Unit::Count,
        "Direct user-level Pro grants and revocations"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a successful note creation
pub fn record_note_created(tenant_id: &str) {
    counter!(
        format!("{}_notes_created_total", METRICS_PREFIX),
        "tenant" => tenant_id.to_string()
    )
    .increment(1);
}

/// Record a note creation rejected by the ceiling
pub fn record_note_limit_rejection(tenant_id: &str) {
    counter!(
        format!("{}_note_limit_rejections_total", METRICS_PREFIX),
        "tenant" => tenant_id.to_string()
    )
    .increment(1);
}

/// Record an upgrade request submission
pub fn record_upgrade_request(tenant_id: &str) {
    counter!(
        format!("{}_upgrade_requests_total", METRICS_PREFIX),
        "tenant" => tenant_id.to_string()
    )
    .increment(1);
}

/// Record an upgrade review decision
pub fn record_upgrade_review(tenant_id: &str, outcome: &str) {
    counter!(
        format!("{}_upgrade_reviews_total", METRICS_PREFIX),
        "tenant" => tenant_id.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a direct grant or revocation of user-level Pro
pub fn record_pro_grant(tenant_id: &str, action: &str) {
    counter!(
        format!("{}_pro_grants_total", METRICS_PREFIX),
        "tenant" => tenant_id.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (150ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/notes");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(201);
        // Just verify it runs without panic
    }
}

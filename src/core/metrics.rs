//! Prometheus metrics for monitoring the proxy.
//!
//! This module provides a centralized metrics registry covering inbound
//! requests, upstream calls and task outcomes.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Upstream calls by operation (submit/poll) and outcome (ok/error)
    pub upstream_calls: IntCounterVec,

    /// Terminal task states (completed/failed/timeout)
    pub task_outcomes: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// This should be called once at application startup. Subsequent calls will
/// return the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "mindvideo_proxy_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "mindvideo_proxy_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 120.0, 300.0, 600.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "mindvideo_proxy_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let upstream_calls = register_int_counter_vec!(
            "mindvideo_proxy_upstream_calls_total",
            "Total number of calls made to the upstream API",
            &["operation", "outcome"]
        )
        .expect("Failed to register upstream_calls metric");

        let task_outcomes = register_int_counter_vec!(
            "mindvideo_proxy_task_outcomes_total",
            "Terminal states reached by tracked tasks",
            &["outcome"]
        )
        .expect("Failed to register task_outcomes metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            upstream_calls,
            task_outcomes,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}

/// Record the result of one upstream call.
pub fn record_upstream_call(operation: &str, ok: bool) {
    get_metrics()
        .upstream_calls
        .with_label_values(&[operation, if ok { "ok" } else { "error" }])
        .inc();
}

/// Record the terminal state of a tracked task.
pub fn record_task_outcome(outcome: &str) {
    get_metrics()
        .task_outcomes
        .with_label_values(&[outcome])
        .inc();
}

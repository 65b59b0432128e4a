/// Metrics and telemetry for the Optima admin backend
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Entity store commits
/// - Moderation actions and audit trail health

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Store Metrics ==========

    /// Atomic commits by adapter and outcome
    pub static ref STORE_COMMITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_commits_total",
        "Total number of entity store commits",
        &["backend", "status"]
    )
    .unwrap();

    // ========== Moderation Metrics ==========

    /// Audited admin actions by action type
    pub static ref ADMIN_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "admin_actions_total",
        "Total number of audited admin actions",
        &["action_type"]
    )
    .unwrap();

    /// Mutations applied without their audit entry
    pub static ref AUDIT_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "audit_write_failures_total",
        "Total number of failed audit trail writes"
    )
    .unwrap();

    /// Dependent documents removed by cascading deletes
    pub static ref CASCADE_DOCUMENTS_DELETED_TOTAL: IntCounter = register_int_counter!(
        "cascade_documents_deleted_total",
        "Total number of dependent documents removed by cascading deletes"
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Errors returned to callers by class
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "errors_total",
        "Total number of errors returned to callers",
        &["kind"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record the outcome of a store commit
pub fn record_store_commit(backend: &str, success: bool) {
    STORE_COMMITS_TOTAL
        .with_label_values(&[backend, if success { "success" } else { "failure" }])
        .inc();
}

/// Record an audited admin action
pub fn record_admin_action(action_type: &str) {
    ADMIN_ACTIONS_TOTAL.with_label_values(&[action_type]).inc();
}

/// Record an audit write that did not land
pub fn record_audit_failure() {
    AUDIT_WRITE_FAILURES_TOTAL.inc();
}

/// Record dependents removed by a cascade
pub fn record_cascade(dependents: usize) {
    CASCADE_DOCUMENTS_DELETED_TOTAL.inc_by(dependents as u64);
}

/// Record an error
pub fn record_error(kind: &str) {
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_http_requests_total",
        "Total number of HTTP requests",
        &["route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// Billing API call duration by operation.
pub static BILLING_API_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_billing_api_duration_seconds",
        "Billing API call duration in seconds",
        &["operation"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register billing_api_duration")
});

/// Billing API calls by operation and outcome.
pub static BILLING_API_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_billing_api_requests_total",
        "Total number of billing API calls",
        &["operation", "outcome"] // ok, api, transport, decode
    )
    .expect("Failed to register billing_api_requests_total")
});

/// Boletas issued by currency.
pub static BOLETAS_ISSUED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_boletas_issued_total",
        "Total number of boletas issued",
        &["currency"]
    )
    .expect("Failed to register boletas_issued_total")
});

/// Post-issuance step outcomes.
pub static PIPELINE_STEPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_pipeline_steps_total",
        "Post-issuance step outcomes",
        &["step", "outcome"] // pdf|income, completed|skipped|failed
    )
    .expect("Failed to register pipeline_steps_total")
});

/// Daily summary phases by outcome.
pub static SUMMARIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_summaries_total",
        "Daily summary operations by phase and outcome",
        &["phase", "outcome"]
    )
    .expect("Failed to register summaries_total")
});

/// Compensating deletes of summary headers.
pub static COMPENSATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_compensations_total",
        "Compensating deletes after a partial summary write",
        &["outcome"]
    )
    .expect("Failed to register compensations_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&BILLING_API_DURATION);
    Lazy::force(&BILLING_API_REQUESTS_TOTAL);
    Lazy::force(&BOLETAS_ISSUED_TOTAL);
    Lazy::force(&PIPELINE_STEPS_TOTAL);
    Lazy::force(&SUMMARIES_TOTAL);
    Lazy::force(&COMPENSATIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

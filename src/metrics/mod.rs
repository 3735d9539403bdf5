//! Metrics module
//!
//! Prometheus counters and histograms for uploads, registered in the default
//! registry. Enabled by the `metrics` feature.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "bifrost_uploads_total",
        "Total number of uploads",
        &["provider", "status"]
    ).expect("uploads counter registers once");

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "bifrost_upload_bytes_total",
        "Total bytes uploaded"
    ).expect("bytes counter registers once");

    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "bifrost_operation_duration_seconds",
        "Provider operation duration in seconds",
        &["provider", "operation"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).expect("duration histogram registers once");

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "bifrost_errors_total",
        "Total errors by code",
        &["code"]
    ).expect("errors counter registers once");
}

/// Record a successful upload
pub fn record_upload_success(provider: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[provider, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(provider: &str) {
    UPLOADS_TOTAL.with_label_values(&[provider, "failure"]).inc();
}

/// Record how long a provider operation took
pub fn record_upload_duration(provider: &str, operation: &str, duration_secs: f64) {
    OPERATION_DURATION
        .with_label_values(&[provider, operation])
        .observe(duration_secs);
}

/// Record an error by its string code
pub fn record_error(code: &str) {
    ERRORS_TOTAL.with_label_values(&[code]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn gather() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

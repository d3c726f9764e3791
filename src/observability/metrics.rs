//! # Metrics
//!
//! Prometheus metrics for monitoring reconciliation.
//!
//! ## Metrics Exposed
//!
//! - `baas_reconcile_operations_total` - Reconciler operations by kind, operation and outcome
//! - `baas_reconcile_operation_duration_seconds` - Duration of reconciler operations by operation
//! - `baas_gateway_requests_total` - Gateway requests by method and status class
//! - `baas_gateway_request_duration_seconds` - Duration of gateway requests by method
//! - `baas_poll_attempts_total` - Poll steps executed by poll label prefix
//! - `baas_dedup_adoptions_total` - Shared resources adopted instead of created

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "baas_reconcile_operations_total",
            "Total number of reconciler operations by kind, operation and outcome",
        ),
        &["kind", "operation", "outcome"],
    )
    .expect("Failed to create RECONCILE_OPERATIONS_TOTAL metric - this should never happen")
});

static RECONCILE_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "baas_reconcile_operation_duration_seconds",
            "Duration of reconciler operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 600.0]),
        &["operation"],
    )
    .expect("Failed to create RECONCILE_OPERATION_DURATION metric - this should never happen")
});

static GATEWAY_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "baas_gateway_requests_total",
            "Total number of control plane requests by method and status class",
        ),
        &["method", "status"],
    )
    .expect("Failed to create GATEWAY_REQUESTS_TOTAL metric - this should never happen")
});

static GATEWAY_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "baas_gateway_request_duration_seconds",
            "Duration of control plane requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method"],
    )
    .expect("Failed to create GATEWAY_REQUEST_DURATION metric - this should never happen")
});

static POLL_ATTEMPTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "baas_poll_attempts_total",
            "Total number of poll steps executed",
        ),
        &["poll"],
    )
    .expect("Failed to create POLL_ATTEMPTS_TOTAL metric - this should never happen")
});

static DEDUP_ADOPTIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "baas_dedup_adoptions_total",
        "Total number of shared resources adopted instead of created",
    )
    .expect("Failed to create DEDUP_ADOPTIONS_TOTAL metric - this should never happen")
});

/// Register every metric with [`REGISTRY`]
///
/// Call once per process; a second call fails with an already-registered error.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(POLL_ATTEMPTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEDUP_ADOPTIONS_TOTAL.clone()))?;

    Ok(())
}

/// Render the registry in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_reconcile_operation(kind: &str, operation: &str, outcome: &str, duration: f64) {
    RECONCILE_OPERATIONS_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
    RECONCILE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn observe_gateway_request(method: &str, status: Option<u16>, duration: f64) {
    let class = match status {
        Some(code) => status_class(code),
        None => "error",
    };
    GATEWAY_REQUESTS_TOTAL
        .with_label_values(&[method, class])
        .inc();
    GATEWAY_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration);
}

/// Count one poll step
///
/// Labels look like `wait environment e1`; only the leading words before the
/// resource id are used so the label set stays bounded.
pub fn increment_poll_attempts(label: &str) {
    let mut words = label.split_whitespace();
    let prefix = match (words.next(), words.next()) {
        (Some(first), Some(second)) => format!("{first} {second}"),
        (Some(first), None) => first.to_string(),
        _ => "unlabelled".to_string(),
    };
    POLL_ATTEMPTS_TOTAL.with_label_values(&[prefix.as_str()]).inc();
}

pub fn increment_dedup_adoptions() {
    DEDUP_ADOPTIONS_TOTAL.inc();
}

fn status_class(code: u16) -> &'static str {
    match code {
        200..=299 => "2xx",
        300..=399 => "3xx",
        404 => "404",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

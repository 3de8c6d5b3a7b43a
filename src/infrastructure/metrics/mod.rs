//! Prometheus Metrics Module
//!
//! Provides event bus metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Published events by type and rejected envelopes
//! - Handler executions by outcome and handler latency histograms
//! - Ledger contention (race waits, race timeouts, reaped claims)
//! - Payload migrations by outcome

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Published events by event type
pub static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_published_total", "Total number of published events")
            .namespace("chat_event_bus"),
        &["event_type"],
    )
    .expect("Failed to create EVENTS_PUBLISHED_TOTAL metric")
});

/// Envelopes rejected before dispatch
pub static VALIDATION_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "validation_rejections_total",
            "Envelopes rejected by validation before dispatch",
        )
        .namespace("chat_event_bus"),
        &["event_type"],
    )
    .expect("Failed to create VALIDATION_REJECTIONS_TOTAL metric")
});

/// Handler executions by outcome ("executed", "skipped", "failed", "suppressed")
pub static HANDLER_EXECUTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("handler_executions_total", "Handler executions by outcome")
            .namespace("chat_event_bus"),
        &["handler", "outcome"],
    )
    .expect("Failed to create HANDLER_EXECUTIONS_TOTAL metric")
});

/// Handler work duration in seconds
pub static HANDLER_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    HistogramVec::new(
        HistogramOpts::new("handler_duration_seconds", "Handler work latency in seconds")
            .namespace("chat_event_bus")
            .buckets(buckets),
        &["handler"],
    )
    .expect("Failed to create HANDLER_DURATION_SECONDS metric")
});

/// Backoff waits on an in-flight claim
pub static LEDGER_RACE_WAITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_race_waits_total", "Waits on an in-flight ledger claim")
            .namespace("chat_event_bus"),
        &["handler"],
    )
    .expect("Failed to create LEDGER_RACE_WAITS_TOTAL metric")
});

/// Wait budgets exhausted
pub static LEDGER_RACE_TIMEOUTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_race_timeouts_total", "Exhausted waits on in-flight claims")
            .namespace("chat_event_bus"),
        &["handler"],
    )
    .expect("Failed to create LEDGER_RACE_TIMEOUTS_TOTAL metric")
});

/// Expired claims turned into FAILED by the reaper
pub static LEDGER_REAPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("ledger_reaped_total", "Expired claims marked FAILED by the reaper")
            .namespace("chat_event_bus"),
    )
    .expect("Failed to create LEDGER_REAPED_TOTAL metric")
});

/// Malformed event ids replaced with fresh ones
pub static EVENT_ID_REPLACEMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "event_id_replacements_total",
            "Malformed or missing event ids replaced by the dispatch wrapper",
        )
        .namespace("chat_event_bus"),
    )
    .expect("Failed to create EVENT_ID_REPLACEMENTS_TOTAL metric")
});

/// Payload migrations by outcome ("ok", "error")
pub static MIGRATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("migrations_total", "Payload migrations between schema versions")
            .namespace("chat_event_bus"),
        &["event_type", "outcome"],
    )
    .expect("Failed to create MIGRATIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register EVENTS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(VALIDATION_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register VALIDATION_REJECTIONS_TOTAL");
    registry
        .register(Box::new(HANDLER_EXECUTIONS_TOTAL.clone()))
        .expect("Failed to register HANDLER_EXECUTIONS_TOTAL");
    registry
        .register(Box::new(HANDLER_DURATION_SECONDS.clone()))
        .expect("Failed to register HANDLER_DURATION_SECONDS");
    registry
        .register(Box::new(LEDGER_RACE_WAITS_TOTAL.clone()))
        .expect("Failed to register LEDGER_RACE_WAITS_TOTAL");
    registry
        .register(Box::new(LEDGER_RACE_TIMEOUTS_TOTAL.clone()))
        .expect("Failed to register LEDGER_RACE_TIMEOUTS_TOTAL");
    registry
        .register(Box::new(LEDGER_REAPED_TOTAL.clone()))
        .expect("Failed to register LEDGER_REAPED_TOTAL");
    registry
        .register(Box::new(EVENT_ID_REPLACEMENTS_TOTAL.clone()))
        .expect("Failed to register EVENT_ID_REPLACEMENTS_TOTAL");
    registry
        .register(Box::new(MIGRATIONS_TOTAL.clone()))
        .expect("Failed to register MIGRATIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_published(event_type: &str) {
    EVENTS_PUBLISHED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_validation_rejection(event_type: &str) {
    VALIDATION_REJECTIONS_TOTAL
        .with_label_values(&[event_type])
        .inc();
}

/// Helper to record one handler outcome
pub fn record_handler_outcome(handler: &str, outcome: &str) {
    HANDLER_EXECUTIONS_TOTAL
        .with_label_values(&[handler, outcome])
        .inc();
}

pub fn record_handler_duration(handler: &str, duration_secs: f64) {
    HANDLER_DURATION_SECONDS
        .with_label_values(&[handler])
        .observe(duration_secs);
}

pub fn record_race_wait(handler: &str) {
    LEDGER_RACE_WAITS_TOTAL.with_label_values(&[handler]).inc();
}

pub fn record_race_timeout(handler: &str) {
    LEDGER_RACE_TIMEOUTS_TOTAL.with_label_values(&[handler]).inc();
}

pub fn record_reaped(count: u64) {
    LEDGER_REAPED_TOTAL.inc_by(count);
}

pub fn record_event_id_replacement() {
    EVENT_ID_REPLACEMENTS_TOTAL.inc();
}

pub fn record_migration(event_type: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    MIGRATIONS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*EVENTS_PUBLISHED_TOTAL;
        let _ = &*HANDLER_EXECUTIONS_TOTAL;
        let _ = &*LEDGER_REAPED_TOTAL;
    }

    #[test]
    fn test_gather_metrics() {
        record_published("user.blocked");
        let metrics = gather_metrics();
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_record_handler_outcome() {
        record_handler_outcome("block-cache-invalidation", "executed");
        let metrics = gather_metrics();
        assert!(metrics.contains("handler_executions_total"));
    }
}

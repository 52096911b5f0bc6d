//! Prometheus metrics for the webhook relay.
//!
//! - Delivery metrics (outcomes, attempts, end-to-end duration)
//! - Stream metrics (connection status, reconnects, received events)
//! - Heartbeat metrics

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, HeartbeatMetrics, StreamMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Forwarded notifications by outcome (delivered, rejected, failed)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Forwarded notifications by outcome",
        &["outcome"]
    ).unwrap();

    /// Individual POST attempts against the forward target
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Total POST attempts against the forward target"
    ).unwrap();

    /// Wall-clock time spent forwarding one notification, retries included
    pub static ref DELIVERY_DURATION: Histogram = register_histogram!(
        format!("{}_delivery_duration_seconds", METRIC_PREFIX),
        "Time spent forwarding one notification, retries included",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]
    ).unwrap();

    // ============================================================================
    // Stream Metrics
    // ============================================================================

    /// Stream connection status (1 = connected, 0 = disconnected)
    pub static ref STREAM_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_stream_connected", METRIC_PREFIX),
        "Event stream connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Scheduled reconnect attempts
    pub static ref STREAM_RECONNECTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stream_reconnects_total", METRIC_PREFIX),
        "Total scheduled event stream reconnect attempts"
    ).unwrap();

    /// Stream events by kind (webhook, keepalive, malformed, ignored)
    pub static ref STREAM_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_stream_events_total", METRIC_PREFIX),
        "Event stream events by kind",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    /// Session keep-alive calls by result
    pub static ref HEARTBEATS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_heartbeats_total", METRIC_PREFIX),
        "Session keep-alive calls by result",
        &["result"]
    ).unwrap();
}

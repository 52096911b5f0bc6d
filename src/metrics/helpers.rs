//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERIES_TOTAL, DELIVERY_ATTEMPTS_TOTAL, DELIVERY_DURATION, HEARTBEATS_TOTAL,
    STREAM_CONNECTED, STREAM_EVENTS_TOTAL, STREAM_RECONNECTS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_attempt() {
        DELIVERY_ATTEMPTS_TOTAL.inc();
    }

    pub fn record_delivered(duration: Duration) {
        DELIVERIES_TOTAL.with_label_values(&["delivered"]).inc();
        DELIVERY_DURATION.observe(duration.as_secs_f64());
    }

    pub fn record_rejected(duration: Duration) {
        DELIVERIES_TOTAL.with_label_values(&["rejected"]).inc();
        DELIVERY_DURATION.observe(duration.as_secs_f64());
    }

    pub fn record_failed(duration: Duration) {
        DELIVERIES_TOTAL.with_label_values(&["failed"]).inc();
        DELIVERY_DURATION.observe(duration.as_secs_f64());
    }
}

/// Helper struct for recording event stream metrics
pub struct StreamMetrics;

impl StreamMetrics {
    pub fn set_connected(connected: bool) {
        STREAM_CONNECTED.set(if connected { 1 } else { 0 });
    }

    pub fn record_reconnect() {
        STREAM_RECONNECTS_TOTAL.inc();
    }

    pub fn record_webhook() {
        STREAM_EVENTS_TOTAL.with_label_values(&["webhook"]).inc();
    }

    pub fn record_keepalive() {
        STREAM_EVENTS_TOTAL.with_label_values(&["keepalive"]).inc();
    }

    pub fn record_malformed() {
        STREAM_EVENTS_TOTAL.with_label_values(&["malformed"]).inc();
    }

    pub fn record_ignored() {
        STREAM_EVENTS_TOTAL.with_label_values(&["ignored"]).inc();
    }
}

/// Helper struct for recording heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_success() {
        HEARTBEATS_TOTAL.with_label_values(&["ok"]).inc();
    }

    pub fn record_failure() {
        HEARTBEATS_TOTAL.with_label_values(&["error"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_counters_increment() {
        let before = DELIVERIES_TOTAL.with_label_values(&["rejected"]).get();
        DeliveryMetrics::record_rejected(Duration::from_millis(12));
        let after = DELIVERIES_TOTAL.with_label_values(&["rejected"]).get();
        assert!(after > before);
    }

    #[test]
    fn test_encode_metrics_contains_relay_prefix() {
        StreamMetrics::record_keepalive();
        HeartbeatMetrics::record_success();

        let text = encode_metrics().unwrap();
        assert!(text.contains("relay_stream_events_total"));
        assert!(text.contains("relay_heartbeats_total"));
    }
}

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;

use crate::config::DeliveryConfig;
use crate::metrics::DeliveryMetrics;
use crate::notification::Notification;
use crate::signing::SIGNATURE_HEADER;

use super::retry::RetrySchedule;

/// Header carrying the notification id on forwarded requests
pub const EVENT_ID_HEADER: &str = "X-Webhook-Id";

/// Header carrying the notification type on forwarded requests
pub const EVENT_TYPE_HEADER: &str = "X-Webhook-Event";

const RELAY_USER_AGENT: &str = concat!("ara-webhook-relay/", env!("CARGO_PKG_VERSION"));

/// One POST try for one notification
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    /// 0-based
    pub attempt_index: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Absent on transport failure
    pub status_code: Option<u16>,
    pub response_body_prefix: Option<String>,
    pub error_message: Option<String>,
}

/// Classification of a finished delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// 2xx from the target
    Delivered,
    /// 4xx from the target, not retried
    Rejected,
    /// Retries exhausted or transport error
    Failed,
}

/// Result of forwarding one notification
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    /// Total wall-clock time across all attempts
    pub duration_ms: u64,
    pub response_body_prefix: Option<String>,
    pub error: Option<String>,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryResult {
    pub fn outcome(&self) -> DeliveryOutcome {
        match (self.success, self.status_code) {
            (true, _) => DeliveryOutcome::Delivered,
            (false, Some(status)) if status < 500 => DeliveryOutcome::Rejected,
            _ => DeliveryOutcome::Failed,
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Forwarder settings
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub max_retries: u32,
    /// Hard per-attempt timeout
    pub timeout: Duration,
    pub schedule: RetrySchedule,
    pub body_prefix_bytes: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for ForwarderConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: config.timeout(),
            schedule: RetrySchedule::new(config.retry_delays()),
            body_prefix_bytes: config.body_prefix_bytes,
        }
    }
}

/// POSTs notifications to a local endpoint under a bounded retry policy
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    config: ForwarderConfig,
}

enum AttemptEnd {
    Response { status: u16, body: Option<String> },
    Transport(String),
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: ForwarderConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Forward with the configured retry budget
    pub async fn forward(&self, target_url: &str, notification: &Notification) -> DeliveryResult {
        self.forward_with_retries(target_url, notification, self.config.max_retries)
            .await
    }

    /// Forward with at most `max_retries + 1` attempts.
    ///
    /// Stops at the first 2xx (delivered) or the first status below 500
    /// (rejected). 5xx and transport errors are retried after the scheduled
    /// delay. Never returns an error: every outcome is in the result.
    pub async fn forward_with_retries(
        &self,
        target_url: &str,
        notification: &Notification,
        max_retries: u32,
    ) -> DeliveryResult {
        let started = Instant::now();
        let mut attempts = Vec::new();

        let mut attempt: u32 = 0;
        loop {
            let started_at = Utc::now();
            let attempt_start = Instant::now();
            DeliveryMetrics::record_attempt();

            let end = self.send_once(target_url, notification).await;
            let attempt_ms = attempt_start.elapsed().as_millis() as u64;
            let retries_left = attempt < max_retries;

            match end {
                AttemptEnd::Response { status, body } => {
                    attempts.push(DeliveryAttempt {
                        attempt_index: attempt,
                        started_at,
                        duration_ms: attempt_ms,
                        status_code: Some(status),
                        response_body_prefix: body.clone(),
                        error_message: (!(200..300).contains(&status))
                            .then(|| format!("HTTP {status}")),
                    });

                    if (200..300).contains(&status) {
                        return self.finish(started, attempts, true, Some(status), body, None);
                    }

                    if status < 500 {
                        tracing::warn!(
                            event_id = %notification.id,
                            event_type = %notification.event_type,
                            status = status,
                            duration_ms = attempt_ms,
                            "Forward target rejected notification"
                        );
                        let error = format!("rejected with HTTP {status}");
                        return self.finish(started, attempts, false, Some(status), body, Some(error));
                    }

                    tracing::warn!(
                        event_id = %notification.id,
                        attempt = attempt,
                        status = status,
                        duration_ms = attempt_ms,
                        retries_left = retries_left,
                        "Forward target returned server error"
                    );

                    if !retries_left {
                        let error = format!("HTTP {status} after {} attempts", attempt + 1);
                        return self.finish(started, attempts, false, Some(status), body, Some(error));
                    }
                }
                AttemptEnd::Transport(message) => {
                    attempts.push(DeliveryAttempt {
                        attempt_index: attempt,
                        started_at,
                        duration_ms: attempt_ms,
                        status_code: None,
                        response_body_prefix: None,
                        error_message: Some(message.clone()),
                    });

                    tracing::warn!(
                        event_id = %notification.id,
                        attempt = attempt,
                        error = %message,
                        duration_ms = attempt_ms,
                        retries_left = retries_left,
                        "Forward attempt failed"
                    );

                    if !retries_left {
                        return self.finish(started, attempts, false, None, None, Some(message));
                    }
                }
            }

            tokio::time::sleep(self.config.schedule.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn send_once(&self, target_url: &str, notification: &Notification) -> AttemptEnd {
        let request = self
            .client
            .post(target_url)
            .timeout(self.config.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, RELAY_USER_AGENT)
            .header(EVENT_ID_HEADER, notification.id.as_str())
            .header(EVENT_TYPE_HEADER, notification.event_type.as_str())
            .header(SIGNATURE_HEADER, notification.signature_header())
            .body(notification.payload_bytes().to_vec());

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = read_prefix(response, self.config.body_prefix_bytes).await;
                AttemptEnd::Response { status, body }
            }
            Err(e) if e.is_timeout() => AttemptEnd::Transport(format!(
                "timed out after {}ms",
                self.config.timeout.as_millis()
            )),
            Err(e) => AttemptEnd::Transport(e.to_string()),
        }
    }

    fn finish(
        &self,
        started: Instant,
        attempts: Vec<DeliveryAttempt>,
        success: bool,
        status_code: Option<u16>,
        response_body_prefix: Option<String>,
        error: Option<String>,
    ) -> DeliveryResult {
        let elapsed = started.elapsed();
        let result = DeliveryResult {
            success,
            status_code,
            duration_ms: elapsed.as_millis() as u64,
            response_body_prefix,
            error,
            attempts,
        };

        match result.outcome() {
            DeliveryOutcome::Delivered => DeliveryMetrics::record_delivered(elapsed),
            DeliveryOutcome::Rejected => DeliveryMetrics::record_rejected(elapsed),
            DeliveryOutcome::Failed => DeliveryMetrics::record_failed(elapsed),
        }

        result
    }
}

/// Read at most `limit` bytes of the response body
async fn read_prefix(mut response: reqwest::Response, limit: usize) -> Option<String> {
    let mut buffer = Vec::new();
    while buffer.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read forward response body");
                break;
            }
        }
    }
    buffer.truncate(limit);
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, status_code: Option<u16>) -> DeliveryResult {
        DeliveryResult {
            success,
            status_code,
            duration_ms: 1,
            response_body_prefix: None,
            error: None,
            attempts: vec![],
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(result(true, Some(200)).outcome(), DeliveryOutcome::Delivered);
        assert_eq!(result(false, Some(404)).outcome(), DeliveryOutcome::Rejected);
        assert_eq!(result(false, Some(503)).outcome(), DeliveryOutcome::Failed);
        assert_eq!(result(false, None).outcome(), DeliveryOutcome::Failed);
    }

    #[test]
    fn test_config_from_settings() {
        let config = ForwarderConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.schedule, RetrySchedule::default());
        assert_eq!(config.body_prefix_bytes, 500);
    }

    #[tokio::test]
    async fn test_transport_failure_exhausts_retries() {
        let config = ForwarderConfig {
            max_retries: 2,
            timeout: Duration::from_secs(2),
            schedule: RetrySchedule::from_millis(&[1]),
            body_prefix_bytes: 500,
        };
        let forwarder = Forwarder::new(config);
        let notification = Notification::from_json(
            r#"{"id":"evt_x","type":"a.b","payload":{},"signature":{"t":1,"v1":"ab"}}"#,
        )
        .unwrap();

        let result = forwarder
            .forward("http://127.0.0.1:9/webhooks", &notification)
            .await;

        assert!(!result.success);
        assert_eq!(result.status_code, None);
        assert!(result.error.is_some());
        assert_eq!(result.attempt_count(), 3);
        assert_eq!(result.outcome(), DeliveryOutcome::Failed);
        assert!(result.attempts.iter().all(|a| a.status_code.is_none()));
    }
}

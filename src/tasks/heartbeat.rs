use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::api::ListenerApi;
use crate::metrics::HeartbeatMetrics;
use crate::shutdown::ShutdownSignal;

/// Counts reported when the heartbeat task stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub sent: u64,
    pub failed: u64,
}

/// Background keep-alive for a registered session.
///
/// Runs on its own schedule, independent of delivery traffic. Individual
/// failures are logged and counted, never fatal.
pub struct HeartbeatTask {
    api: Arc<dyn ListenerApi>,
    session_id: String,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl HeartbeatTask {
    pub fn new(
        api: Arc<dyn ListenerApi>,
        session_id: impl Into<String>,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            api,
            session_id: session_id.into(),
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(self) -> HeartbeatStats {
        let mut stats = HeartbeatStats::default();
        if self.interval.is_zero() {
            tracing::error!(session_id = %self.session_id, "Heartbeat interval is zero, keep-alive disabled");
            return stats;
        }

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            session_id = %self.session_id,
            interval_secs = self.interval.as_secs(),
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {}
            }

            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.api.heartbeat(&self.session_id) => result,
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    stats.sent += 1;
                    HeartbeatMetrics::record_success();
                    tracing::debug!(
                        session_id = %self.session_id,
                        elapsed_ms = elapsed_ms,
                        "Heartbeat sent"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    HeartbeatMetrics::record_failure();
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        elapsed_ms = elapsed_ms,
                        "Heartbeat failed"
                    );
                }
            }
        }

        tracing::info!(sent = stats.sent, failed = stats.failed, "Heartbeat task stopped");
        stats
    }
}

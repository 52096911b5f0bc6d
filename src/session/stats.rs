use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::delivery::DeliveryOutcome;

/// Cumulative counters for one relay run
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Notifications acknowledged with 2xx
    pub delivered: AtomicU64,
    /// Notifications not delivered (rejections included)
    pub failed: AtomicU64,
    /// Subset of `failed` rejected with a client error
    pub rejected: AtomicU64,
    /// Reconnects scheduled by the stream consumer
    pub reconnects: AtomicU64,
}

impl SessionStats {
    pub fn record(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Rejected => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub rejected: u64,
    pub reconnects: u64,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    ShutdownRequested,
    /// Reconnect attempts exhausted
    StreamExhausted,
    /// Consumer stopped without a terminal disconnect
    StreamEnded,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SessionEnd::ShutdownRequested => "shutdown requested",
            SessionEnd::StreamExhausted => "event stream reconnect attempts exhausted",
            SessionEnd::StreamEnded => "event stream ended",
        };
        f.write_str(reason)
    }
}

/// Final report of a relay run
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub delivered: u64,
    pub failed: u64,
    pub rejected: u64,
    pub reconnects: u64,
    pub heartbeats_sent: u64,
    pub heartbeats_failed: u64,
    pub duration: Duration,
    pub reason: SessionEnd,
}

//! Relay session orchestration.

mod controller;
mod stats;

pub use controller::{ControllerConfig, SessionController};
pub use stats::{SessionEnd, SessionStats, SessionStatsSnapshot, SessionSummary};

//! Forwarding notifications to the local endpoint.
//!
//! - `retry`: fixed per-attempt delay table with last-entry clamping
//! - `forwarder`: bounded retry loop and delivery result types

mod forwarder;
mod retry;

pub use forwarder::{
    DeliveryAttempt, DeliveryOutcome, DeliveryResult, Forwarder, ForwarderConfig,
    EVENT_ID_HEADER, EVENT_TYPE_HEADER,
};
pub use retry::RetrySchedule;

//! Event stream consumption.
//!
//! # Modules
//!
//! - `parser`: incremental server-sent events parser
//! - `backoff`: reconnect delay calculation with jitter
//! - `consumer`: the reconnecting, resumable stream consumer

mod backoff;
mod consumer;
pub mod parser;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub use consumer::{
    ConnectionState, ConsumerConfig, StreamConsumer, StreamEvent, StreamEvents, StreamHandle,
    LAST_EVENT_ID_HEADER, PING_EVENT, WEBHOOK_EVENT,
};
pub use parser::{SseEvent, SseFrame, SseParser};

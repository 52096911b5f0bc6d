//! Background tasks spawned alongside a relay session.

mod heartbeat;

pub use heartbeat::{HeartbeatStats, HeartbeatTask};

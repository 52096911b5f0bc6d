//! Notification wire types relayed from the event stream.

mod types;

pub use types::{Notification, NotificationSignature};

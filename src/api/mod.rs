//! Client for the remote listener service.

mod client;
mod models;

pub use client::{HttpListenerApi, ListenerApi};
pub use models::{ApiErrorBody, ApiErrorDetail, RegisterRequest, RegisteredSession};

// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;

// Wire formats
pub mod notification;
pub mod signing;

// Remote listener service
pub mod api;
pub mod auth;

// Relay pipeline
pub mod delivery;
pub mod session;
pub mod stream;
pub mod tasks;

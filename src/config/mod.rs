mod settings;

pub use settings::{
    DeliveryConfig, ForwardConfig, HeartbeatConfig, LoggingConfig, OtelConfig, ServiceConfig,
    Settings, ShutdownConfig, StreamConfig,
};

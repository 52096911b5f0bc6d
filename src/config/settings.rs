use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Server drops sessions without a heartbeat for this long
const SESSION_LIVENESS_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

/// Remote listener service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_url")]
    pub url: String,
    /// Explicit API key, takes precedence over stored credentials
    pub api_key: Option<String>,
    /// Path to stored session credentials (JSON)
    pub credentials_path: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_url")]
    pub url: String,
    /// Event types to subscribe to (empty = all)
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// Exclusive upper bound of the additive jitter
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout in seconds
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,
    #[serde(default = "default_body_prefix_bytes")]
    pub body_prefix_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Keep-alive interval in seconds (must stay under the server's 30s liveness window)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Grace period for an in-flight delivery once shutdown is requested
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the plain text format
    #[serde(default)]
    pub json: bool,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_service_url() -> String {
    "https://api.ara.dev".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_forward_url() -> String {
    "http://localhost:3000/webhooks".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_base_delay() -> u64 {
    1_000
}

fn default_reconnect_max_delay() -> u64 {
    30_000
}

fn default_reconnect_jitter() -> u64 {
    1_000
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    256
}

fn default_max_retries() -> u32 {
    3
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_retry_delays() -> Vec<u64> {
    vec![250, 1_000, 3_000]
}

fn default_body_prefix_bytes() -> usize {
    500
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "ara-webhook-relay".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("service.url", default_service_url())?
            .set_default("service.request_timeout_secs", default_request_timeout())?
            .set_default("forward.url", default_forward_url())?
            .set_default("heartbeat.interval_secs", default_heartbeat_interval())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // RELAY_SERVICE__API_KEY, RELAY_FORWARD__URL, RELAY_FORWARD__EVENTS=a,b ...
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("forward.events")
                    .with_list_parse_key("delivery.retry_delays_ms"),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would break the session at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.heartbeat.interval_secs;
        if interval == 0 || interval >= SESSION_LIVENESS_SECS {
            return Err(ConfigError::Message(format!(
                "heartbeat.interval_secs must be between 1 and {} (got {interval})",
                SESSION_LIVENESS_SECS - 1
            )));
        }
        Ok(())
    }
}

impl StreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            api_key: None,
            credentials_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            url: default_forward_url(),
            events: vec![],
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            reconnect_jitter_ms: default_reconnect_jitter(),
            connect_timeout_secs: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_delivery_timeout(),
            retry_delays_ms: default_retry_delays(),
            body_prefix_bytes: default_body_prefix_bytes(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            forward: ForwardConfig::default(),
            stream: StreamConfig::default(),
            delivery: DeliveryConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            shutdown: ShutdownConfig::default(),
            logging: LoggingConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::AUTHORIZATION;

use crate::api::{HttpListenerApi, ListenerApi, RegisterRequest, RegisteredSession};
use crate::auth::{self, CredentialStore, Credentials, FileCredentialStore};
use crate::config::{Settings, StreamConfig};
use crate::delivery::{DeliveryOutcome, DeliveryResult, Forwarder, ForwarderConfig};
use crate::error::Result;
use crate::metrics::encode_metrics;
use crate::notification::Notification;
use crate::shutdown::ShutdownSignal;
use crate::signing::SIGNATURE_HEADER;
use crate::stream::{ConsumerConfig, StreamConsumer, StreamEvent, StreamEvents, StreamHandle};
use crate::tasks::{HeartbeatStats, HeartbeatTask};

use super::stats::{SessionEnd, SessionStats, SessionSummary};

/// Settings for one relay run
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub forward_to: String,
    pub events: Vec<String>,
    pub stream: StreamConfig,
    pub forwarder: ForwarderConfig,
    pub heartbeat_interval: Duration,
    /// Grace period for an in-flight delivery once shutdown is requested
    pub drain_timeout: Duration,
}

impl From<&Settings> for ControllerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            forward_to: settings.forward.url.clone(),
            events: settings.forward.events.clone(),
            stream: settings.stream.clone(),
            forwarder: ForwarderConfig::from(&settings.delivery),
            heartbeat_interval: settings.heartbeat.interval(),
            drain_timeout: settings.shutdown.drain_timeout(),
        }
    }
}

/// Background work stopped the moment shutdown is requested
struct Background<'a> {
    stream: &'a StreamHandle,
    heartbeat: &'a ShutdownSignal,
}

impl Background<'_> {
    /// Stop keep-alives and close the stream. Idempotent.
    fn halt(&self) {
        self.heartbeat.trigger();
        self.stream.close();
    }
}

/// Drives one relay session: register, stream, forward, keep alive, tear down
pub struct SessionController {
    api: Arc<dyn ListenerApi>,
    credentials: Credentials,
    config: ControllerConfig,
    forwarder: Forwarder,
    stats: Arc<SessionStats>,
}

impl SessionController {
    pub fn new(api: Arc<dyn ListenerApi>, credentials: Credentials, config: ControllerConfig) -> Self {
        let forwarder = Forwarder::new(config.forwarder.clone());
        Self {
            api,
            credentials,
            config,
            forwarder,
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Resolve credentials and build an HTTP-backed controller.
    ///
    /// Fails with an authentication error when no usable credentials exist.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = settings
            .service
            .credentials_path
            .as_ref()
            .map(FileCredentialStore::new);
        let credentials = auth::resolve_credentials(
            settings.service.api_key.as_deref(),
            store.as_ref().map(|s| s as &dyn CredentialStore),
        )?;

        tracing::info!(credentials = credentials.kind(), "Credentials resolved");

        let api = Arc::new(HttpListenerApi::new(&settings.service, credentials.clone()));
        Ok(Self::new(api, credentials, ControllerConfig::from(settings)))
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    /// Run until `shutdown` fires or the stream gives up.
    ///
    /// Only registration (and authentication) errors are returned; everything
    /// after a successful registration is recovered or reported in the summary.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<SessionSummary> {
        let started = Instant::now();

        let request = RegisterRequest {
            forward_to: self.config.forward_to.clone(),
            events: self.config.events.clone(),
        };
        let session = self.api.register(&request).await?;
        self.announce(&session);

        let consumer_config =
            ConsumerConfig::from_settings(session.stream_url.clone(), &self.config.stream)
                .header(AUTHORIZATION.as_str(), self.credentials.authorization_header());
        let (stream, mut events) = StreamConsumer::new(consumer_config).connect();

        let heartbeat_stop = ShutdownSignal::new();
        let heartbeat = tokio::spawn(
            HeartbeatTask::new(
                self.api.clone(),
                session.session_id.clone(),
                self.config.heartbeat_interval,
                heartbeat_stop.clone(),
            )
            .run(),
        );

        let background = Background {
            stream: &stream,
            heartbeat: &heartbeat_stop,
        };
        let reason = self.pump(&mut events, &shutdown, &background).await;
        tracing::info!(reason = %reason, "Stopping relay session");

        // Already halted on shutdown; exhaustion and stream end get here first
        background.halt();
        let heartbeats = match heartbeat.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Heartbeat task aborted");
                HeartbeatStats::default()
            }
        };

        match self.api.unregister(&session.session_id).await {
            Ok(()) => tracing::info!(session_id = %session.session_id, "Session unregistered"),
            Err(e) => tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "Failed to unregister session, it will expire server-side"
            ),
        }

        let stats = self.stats.snapshot();
        let summary = SessionSummary {
            session_id: session.session_id,
            delivered: stats.delivered,
            failed: stats.failed,
            rejected: stats.rejected,
            reconnects: stats.reconnects,
            heartbeats_sent: heartbeats.sent,
            heartbeats_failed: heartbeats.failed,
            duration: started.elapsed(),
            reason,
        };

        tracing::info!(
            session_id = %summary.session_id,
            delivered = summary.delivered,
            failed = summary.failed,
            rejected = summary.rejected,
            reconnects = summary.reconnects,
            duration_secs = summary.duration.as_secs(),
            "Relay session finished"
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(metrics) = encode_metrics() {
                tracing::debug!(metrics = %metrics, "Final relay metrics");
            }
        }

        Ok(summary)
    }

    fn announce(&self, session: &RegisteredSession) {
        tracing::info!(
            session_id = %session.session_id,
            stream_url = %session.stream_url,
            forward_to = %self.config.forward_to,
            events = ?self.config.events,
            expires_at = ?session.expires_at,
            "Relay session registered"
        );
        tracing::info!(
            signing_secret = %session.dev_webhook_secret,
            header = SIGNATURE_HEADER,
            "Verify forwarded webhooks with this signing secret"
        );
    }

    async fn pump(
        &self,
        events: &mut StreamEvents,
        shutdown: &ShutdownSignal,
        background: &Background<'_>,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    background.halt();
                    return SessionEnd::ShutdownRequested;
                }
                event = events.next_event() => event,
            };

            match event {
                None => return SessionEnd::StreamEnded,
                Some(StreamEvent::Connected) => {
                    tracing::info!("Listening for webhooks");
                }
                Some(StreamEvent::Reconnecting { attempt, delay }) => {
                    self.stats.record_reconnect();
                    tracing::info!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to event stream"
                    );
                }
                Some(StreamEvent::Disconnected {
                    error,
                    terminal: false,
                }) => {
                    tracing::warn!(error = %error, "Event stream connection lost");
                }
                Some(StreamEvent::Disconnected {
                    error,
                    terminal: true,
                }) => {
                    tracing::error!(error = %error, "Event stream gave up reconnecting");
                    return SessionEnd::StreamExhausted;
                }
                Some(StreamEvent::Webhook(notification)) => {
                    if !self.deliver(notification, shutdown, background).await {
                        return SessionEnd::ShutdownRequested;
                    }
                }
            }
        }
    }

    /// Forward one notification. Returns false if shutdown interrupted it.
    async fn deliver(
        &self,
        notification: Notification,
        shutdown: &ShutdownSignal,
        background: &Background<'_>,
    ) -> bool {
        let forward = self
            .forwarder
            .forward(&self.config.forward_to, &notification);
        tokio::pin!(forward);

        tokio::select! {
            biased;
            result = &mut forward => {
                self.record(&notification, &result);
                true
            }
            _ = shutdown.cancelled() => {
                background.halt();
                tracing::info!(
                    event_id = %notification.id,
                    drain_timeout_ms = self.config.drain_timeout.as_millis() as u64,
                    "Shutdown requested, waiting for in-flight delivery"
                );
                match tokio::time::timeout(self.config.drain_timeout, &mut forward).await {
                    Ok(result) => self.record(&notification, &result),
                    Err(_) => tracing::warn!(
                        event_id = %notification.id,
                        event_type = %notification.event_type,
                        "Abandoned in-flight delivery at shutdown"
                    ),
                }
                false
            }
        }
    }

    fn record(&self, notification: &Notification, result: &DeliveryResult) {
        let outcome = result.outcome();
        self.stats.record(outcome);

        match outcome {
            DeliveryOutcome::Delivered => tracing::info!(
                event_id = %notification.id,
                event_type = %notification.event_type,
                status = ?result.status_code,
                duration_ms = result.duration_ms,
                attempts = result.attempt_count(),
                "Webhook delivered"
            ),
            DeliveryOutcome::Rejected | DeliveryOutcome::Failed => tracing::warn!(
                event_id = %notification.id,
                event_type = %notification.event_type,
                outcome = ?outcome,
                status = ?result.status_code,
                duration_ms = result.duration_ms,
                attempts = result.attempt_count(),
                error = ?result.error,
                "Webhook delivery failed"
            ),
        }
    }
}

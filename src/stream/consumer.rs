use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::{mpsc, watch};

use crate::config::StreamConfig;
use crate::metrics::StreamMetrics;
use crate::notification::Notification;
use crate::shutdown::ShutdownSignal;

use super::backoff::{BackoffConfig, ReconnectBackoff};
use super::parser::{SseEvent, SseFrame, SseParser};

/// Event name carrying a JSON-encoded notification
pub const WEBHOOK_EVENT: &str = "webhook";

/// Event name used by the server for explicit keep-alives
pub const PING_EVENT: &str = "ping";

/// Resume header sent on every (re)connect once a cursor is known
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Lifecycle of the logical stream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

/// Items produced by the consumer, in arrival order
#[derive(Debug)]
pub enum StreamEvent {
    Connected,
    Webhook(Notification),
    /// `terminal` is set once reconnect attempts are exhausted; no further
    /// events follow it
    Disconnected { error: String, terminal: bool },
    Reconnecting { attempt: u32, delay: Duration },
}

/// Connection settings for one stream session
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream_url: String,
    /// Static headers sent on every connect (auth)
    pub headers: Vec<(String, String)>,
    pub max_reconnect_attempts: u32,
    pub backoff: BackoffConfig,
    pub connect_timeout: Duration,
    pub channel_capacity: usize,
}

impl ConsumerConfig {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self::from_settings(stream_url, &StreamConfig::default())
    }

    pub fn from_settings(stream_url: impl Into<String>, settings: &StreamConfig) -> Self {
        Self {
            stream_url: stream_url.into(),
            headers: Vec::new(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            backoff: BackoffConfig::from(settings),
            connect_timeout: settings.connect_timeout(),
            channel_capacity: settings.channel_capacity,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Mutable per-session stream state
#[derive(Debug, Default)]
struct StreamSession {
    last_event_id: Option<String>,
    reconnect_attempts: u32,
}

/// Shared between the driver task and every [`StreamHandle`]
struct Shared {
    state: watch::Sender<ConnectionState>,
    session: Mutex<StreamSession>,
    close: ShutdownSignal,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, StreamSession> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `next` unless the consumer has been closed
    fn transition(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Closed || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Event stream consumer with resumable reconnection.
///
/// [`connect`](Self::connect) spawns a driver task that owns the connection
/// and returns a [`StreamHandle`] for control plus [`StreamEvents`] to pull
/// decoded events from. Events are delivered one at a time in arrival order.
pub struct StreamConsumer {
    config: ConsumerConfig,
    client: reqwest::Client,
}

impl StreamConsumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: ConsumerConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Start the stream (`Idle -> Connecting`)
    pub fn connect(self) -> (StreamHandle, StreamEvents) {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let shared = Arc::new(Shared {
            state,
            session: Mutex::new(StreamSession::default()),
            close: ShutdownSignal::new(),
        });
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        shared.transition(ConnectionState::Connecting);

        let driver = Driver {
            backoff: ReconnectBackoff::with_config(self.config.backoff.clone()),
            config: self.config,
            client: self.client,
            shared: shared.clone(),
            tx,
        };
        tokio::spawn(driver.run());

        (StreamHandle { shared }, StreamEvents { rx })
    }
}

/// Control side of a running consumer
#[derive(Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Close the stream. Idempotent; suppresses any pending reconnect.
    pub fn close(&self) {
        self.shared.state.send_replace(ConnectionState::Closed);
        self.shared.close.trigger();
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Most recent successfully decoded notification id
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.session().last_event_id.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.session().reconnect_attempts
    }

    /// Resolve once the consumer reaches `state`
    pub async fn wait_for_state(&self, state: ConnectionState) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|current| *current == state).await;
    }
}

/// Pull side of a running consumer
pub struct StreamEvents {
    rx: mpsc::Receiver<StreamEvent>,
}

impl StreamEvents {
    /// Next event, or `None` once the consumer has stopped
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

enum ReadEnd {
    /// Closed locally or the event receiver went away
    Stopped,
    Lost(String),
}

struct Driver {
    config: ConsumerConfig,
    client: reqwest::Client,
    backoff: ReconnectBackoff,
    shared: Arc<Shared>,
    tx: mpsc::Sender<StreamEvent>,
}

impl Driver {
    async fn run(mut self) {
        tracing::info!(url = %self.config.stream_url, "Event stream consumer started");

        loop {
            self.shared.transition(ConnectionState::Connecting);

            let opened = tokio::select! {
                biased;
                _ = self.shared.close.cancelled() => break,
                result = self.open() => result,
            };

            let error = match opened {
                Ok(response) => {
                    if !self.on_connected().await {
                        break;
                    }
                    match self.read(response).await {
                        ReadEnd::Stopped => break,
                        ReadEnd::Lost(error) => error,
                    }
                }
                Err(error) => error,
            };

            if self.shared.close.is_triggered() {
                break;
            }

            self.shared.transition(ConnectionState::Disconnected);
            StreamMetrics::set_connected(false);
            tracing::warn!(error = %error, "Event stream disconnected");

            if !self
                .emit(StreamEvent::Disconnected {
                    error,
                    terminal: false,
                })
                .await
            {
                break;
            }

            let attempt = {
                let mut session = self.shared.session();
                if session.reconnect_attempts >= self.config.max_reconnect_attempts {
                    None
                } else {
                    session.reconnect_attempts += 1;
                    Some(session.reconnect_attempts)
                }
            };

            let Some(attempt) = attempt else {
                let error = format!(
                    "max reconnect attempts ({}) reached",
                    self.config.max_reconnect_attempts
                );
                tracing::error!(error = %error, "Giving up on event stream");
                self.emit(StreamEvent::Disconnected {
                    error,
                    terminal: true,
                })
                .await;
                // Stays Disconnected: restarting is the caller's decision
                return;
            };

            let delay = self.backoff.delay_for(attempt);
            StreamMetrics::record_reconnect();
            tracing::info!(
                attempt = attempt,
                max_attempts = self.config.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling event stream reconnect"
            );

            if !self
                .emit(StreamEvent::Reconnecting { attempt, delay })
                .await
            {
                break;
            }

            tokio::select! {
                biased;
                _ = self.shared.close.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.shared.state.send_replace(ConnectionState::Closed);
        StreamMetrics::set_connected(false);
        tracing::info!("Event stream consumer stopped");
    }

    async fn open(&self) -> Result<reqwest::Response, String> {
        let mut request = self
            .client
            .get(&self.config.stream_url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let cursor = self.shared.session().last_event_id.clone();
        if let Some(cursor) = cursor {
            tracing::debug!(last_event_id = %cursor, "Resuming event stream");
            request = request.header(LAST_EVENT_ID_HEADER, cursor);
        }

        let response = tokio::time::timeout(self.config.connect_timeout, request.send())
            .await
            .map_err(|_| {
                format!(
                    "connect timed out after {}ms",
                    self.config.connect_timeout.as_millis()
                )
            })?
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("stream responded with HTTP {}", status.as_u16()));
        }

        Ok(response)
    }

    async fn on_connected(&self) -> bool {
        self.shared.transition(ConnectionState::Connected);
        self.shared.session().reconnect_attempts = 0;
        StreamMetrics::set_connected(true);
        tracing::info!(url = %self.config.stream_url, "Event stream connected");
        self.emit(StreamEvent::Connected).await
    }

    async fn read(&mut self, response: reqwest::Response) -> ReadEnd {
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.shared.close.cancelled() => return ReadEnd::Stopped,
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return ReadEnd::Lost(e.to_string()),
                None => return ReadEnd::Lost("stream closed by server".to_string()),
            };

            for frame in parser.feed(&bytes) {
                match frame {
                    SseFrame::Event(event) => {
                        if !self.handle_event(event).await {
                            return ReadEnd::Stopped;
                        }
                    }
                    SseFrame::Comment(_) => StreamMetrics::record_keepalive(),
                    SseFrame::Retry(ms) => {
                        tracing::debug!(retry_ms = ms, "Server adjusted reconnect delay");
                        self.backoff.set_initial_delay(ms);
                    }
                }
            }
        }
    }

    /// Returns false when the consumer should stop
    async fn handle_event(&self, event: SseEvent) -> bool {
        match event.event.as_str() {
            WEBHOOK_EVENT => {}
            PING_EVENT => {
                StreamMetrics::record_keepalive();
                return true;
            }
            other => {
                StreamMetrics::record_ignored();
                tracing::debug!(event = %other, "Ignoring stream event");
                return true;
            }
        }

        let notification = match Notification::from_json(&event.data) {
            Ok(notification) => notification,
            Err(e) => {
                StreamMetrics::record_malformed();
                tracing::warn!(
                    error = %e,
                    stream_id = ?event.id,
                    data_len = event.data.len(),
                    "Dropping malformed webhook event"
                );
                return true;
            }
        };

        self.shared.session().last_event_id = Some(resume_cursor(event.id, &notification));
        StreamMetrics::record_webhook();

        tracing::debug!(
            event_id = %notification.id,
            event_type = %notification.event_type,
            "Webhook received"
        );

        self.emit(StreamEvent::Webhook(notification)).await
    }

    /// Hand an event to the reader; false if closed or nobody is listening
    async fn emit(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.shared.close.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}

/// Stream id if the server sent a non-empty one, else the notification id
fn resume_cursor(stream_id: Option<String>, notification: &Notification) -> String {
    stream_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| notification.id.clone())
}

//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use ara_webhook_relay::delivery::{ForwarderConfig, RetrySchedule};
use ara_webhook_relay::signing;

pub const DEV_SECRET: &str = "whsec_dev_x";

/// Bind an ephemeral port and return the listener with its base URL
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{addr}"))
}

pub fn spawn(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
}

/// Serve `app` on an ephemeral port
pub async fn serve(app: Router) -> String {
    let (listener, base) = bind().await;
    spawn(listener, app);
    base
}

/// Wire form of a notification signed the way the listener service signs it
pub fn notification_json(id: &str, event_type: &str, payload: &str) -> String {
    let record = signing::sign(payload.as_bytes(), DEV_SECRET.as_bytes());
    format!(
        r#"{{"id":"{id}","type":"{event_type}","payload":{payload},"signature":{{"t":{},"v1":"{}"}}}}"#,
        record.timestamp, record.signature
    )
}

/// Forwarder settings with millisecond retry delays
pub fn fast_forwarder(max_retries: u32) -> ForwarderConfig {
    ForwarderConfig {
        max_retries,
        timeout: Duration::from_secs(2),
        schedule: RetrySchedule::from_millis(&[10, 20, 30]),
        body_prefix_bytes: 500,
    }
}

/// Poll `check` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(limit, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

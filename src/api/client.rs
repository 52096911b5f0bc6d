use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;

use crate::auth::Credentials;
use crate::config::ServiceConfig;
use crate::error::{RelayError, Result};

use super::models::{ApiErrorBody, RegisterRequest, RegisteredSession};

/// Registration, keep-alive and teardown of a relay session
#[async_trait]
pub trait ListenerApi: Send + Sync {
    /// `POST /v1/dev/listeners`
    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredSession>;

    /// `POST /v1/dev/listeners/{id}/heartbeat`
    async fn heartbeat(&self, session_id: &str) -> Result<()>;

    /// `DELETE /v1/dev/listeners/{id}`
    async fn unregister(&self, session_id: &str) -> Result<()>;
}

/// [`ListenerApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpListenerApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl HttpListenerApi {
    pub fn new(config: &ServiceConfig, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn listeners_url(&self) -> String {
        format!("{}/v1/dev/listeners", self.base_url)
    }

    fn session_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.listeners_url(), session_id)
    }
}

#[async_trait]
impl ListenerApi for HttpListenerApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredSession> {
        let response = self
            .client
            .post(self.listeners_url())
            .timeout(self.timeout)
            .header(AUTHORIZATION, self.credentials.authorization_header())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<RegisteredSession>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("registration failed")
                    .to_string()
            });

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RelayError::Auth(message));
        }

        Err(RelayError::Registration {
            status: status.as_u16(),
            message,
        })
    }

    async fn heartbeat(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/heartbeat", self.session_url(session_id)))
            .timeout(self.timeout)
            .header(AUTHORIZATION, self.credentials.authorization_header())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RelayError::UnexpectedStatus {
                operation: "heartbeat",
                status: status.as_u16(),
            })
        }
    }

    async fn unregister(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.session_url(session_id))
            .timeout(self.timeout)
            .header(AUTHORIZATION, self.credentials.authorization_header())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RelayError::UnexpectedStatus {
                operation: "unregister",
                status: status.as_u16(),
            })
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/dev/listeners`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Local URL notifications will be forwarded to
    pub forward_to: String,
    /// Event types to receive (empty = all)
    pub events: Vec<String>,
}

/// A registered relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSession {
    pub session_id: String,
    /// Secret the downstream receiver uses to verify relayed signatures
    pub dev_webhook_secret: String,
    pub stream_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Error body returned by the listener service
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: Option<ApiErrorDetail>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable message in the body, if any
    pub fn message(&self) -> Option<String> {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or_else(|| self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_is_camel_case() {
        let request = RegisterRequest {
            forward_to: "http://localhost:3000/webhooks".into(),
            events: vec!["payment.succeeded".into()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["forwardTo"], "http://localhost:3000/webhooks");
        assert_eq!(json["events"][0], "payment.succeeded");
    }

    #[test]
    fn test_parse_registered_session() {
        let json = r#"{
            "sessionId": "sess_1",
            "devWebhookSecret": "whsec_dev_x",
            "streamUrl": "https://api.ara.dev/v1/dev/listeners/sess_1/stream",
            "expiresAt": "2026-10-18T12:00:00Z"
        }"#;
        let session: RegisteredSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_id, "sess_1");
        assert_eq!(session.dev_webhook_secret, "whsec_dev_x");
        assert!(session.expires_at.is_some());
    }

    #[test]
    fn test_error_body_message() {
        let nested: ApiErrorBody =
            serde_json::from_str(r#"{"error":{"code":"UNAUTHORIZED","message":"bad key"}}"#)
                .unwrap();
        assert_eq!(nested.message().as_deref(), Some("bad key"));

        let flat: ApiErrorBody = serde_json::from_str(r#"{"message":"quota exceeded"}"#).unwrap();
        assert_eq!(flat.message().as_deref(), Some("quota exceeded"));
    }
}

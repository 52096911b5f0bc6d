use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::signing::SignatureRecord;

/// One webhook occurrence delivered by the remote stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier, used as idempotency key and resume cursor
    pub id: String,
    /// Dot-separated event category (e.g., "payment.succeeded")
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload, kept as the exact JSON text received
    pub payload: Box<RawValue>,
    /// Signature pre-computed by the remote side for the receiver
    pub signature: NotificationSignature,
}

/// Wire form of a relayed signature: `{"t": 1700000000, "v1": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSignature {
    #[serde(rename = "t")]
    pub timestamp: i64,
    pub v1: String,
}

impl Notification {
    /// Parse a stream event body
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Payload bytes exactly as they will be forwarded
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.get().as_bytes()
    }

    /// The relayed signature as a `t=...,v1=...` header value
    pub fn signature_header(&self) -> String {
        SignatureRecord::from(&self.signature).header()
    }
}

impl From<&NotificationSignature> for SignatureRecord {
    fn from(sig: &NotificationSignature) -> Self {
        SignatureRecord::new(sig.timestamp, sig.v1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notification() {
        let json = r#"{
            "id": "evt_1",
            "type": "payment.succeeded",
            "payload": {"amount":1000},
            "signature": {"t": 1700000000, "v1": "abc"}
        }"#;

        let notification = Notification::from_json(json).unwrap();
        assert_eq!(notification.id, "evt_1");
        assert_eq!(notification.event_type, "payment.succeeded");
        assert_eq!(notification.payload_bytes(), br#"{"amount":1000}"#);
        assert_eq!(notification.signature_header(), "t=1700000000,v1=abc");
    }

    #[test]
    fn test_payload_is_not_reformatted() {
        let json = r#"{"id":"evt_2","type":"a.b","payload":{ "b" : 2, "a" : [1, 2.50] },"signature":{"t":1,"v1":"x"}}"#;
        let notification = Notification::from_json(json).unwrap();
        assert_eq!(notification.payload.get(), r#"{ "b" : 2, "a" : [1, 2.50] }"#);
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(Notification::from_json(r#"{"id":"evt_3"}"#).is_err());
        assert!(Notification::from_json("not json").is_err());
        assert!(Notification::from_json(
            r#"{"id":"evt_4","type":"a","payload":{},"signature":{"t":"soon","v1":"x"}}"#
        )
        .is_err());
    }
}

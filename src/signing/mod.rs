//! Timestamped HMAC-SHA256 webhook signatures.
//!
//! The signed message is `"{timestamp}.{payload}"` and the header wire format is
//! exactly `t=<unix-seconds>,v1=<hex-hmac-sha256>`. Downstream receivers verify
//! relayed notifications with [`verify`] using the per-session secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature on forwarded requests
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Default freshness window for [`verify`]
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// A timestamp and the hex-encoded digest computed at that timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub timestamp: i64,
    pub signature: String,
}

impl SignatureRecord {
    pub fn new(timestamp: i64, signature: impl Into<String>) -> Self {
        Self {
            timestamp,
            signature: signature.into(),
        }
    }

    /// Render as `t=<timestamp>,v1=<signature>`
    pub fn header(&self) -> String {
        format!("t={},v1={}", self.timestamp, self.signature)
    }
}

/// Sign `payload` with the current Unix time
pub fn sign(payload: &[u8], secret: &[u8]) -> SignatureRecord {
    sign_at(payload, secret, now())
}

/// Sign `payload` at an explicit timestamp
pub fn sign_at(payload: &[u8], secret: &[u8], timestamp: i64) -> SignatureRecord {
    let mac = keyed_mac(secret, timestamp, payload);
    SignatureRecord {
        timestamp,
        signature: hex::encode(mac.finalize().into_bytes()),
    }
}

/// Parse a `t=...,v1=...` header.
///
/// Element order does not matter. When a prefix appears more than once the
/// first occurrence wins. Returns `None` when either element is missing, the
/// timestamp is not an integer, or the signature is empty.
pub fn parse_header(header: &str) -> Option<SignatureRecord> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for element in header.split(',') {
        let element = element.trim();
        if let Some(value) = element.strip_prefix("t=") {
            timestamp.get_or_insert(value);
        } else if let Some(value) = element.strip_prefix("v1=") {
            signature.get_or_insert(value);
        }
    }

    let timestamp = timestamp?.parse::<i64>().ok()?;
    let signature = signature?;
    if signature.is_empty() {
        return None;
    }

    Some(SignatureRecord::new(timestamp, signature))
}

/// Verify `header` against `payload` using the current time
pub fn verify(payload: &[u8], header: &str, secret: &[u8], tolerance_secs: i64) -> bool {
    verify_at(payload, header, secret, tolerance_secs, now())
}

/// Verify `header` against `payload` as of `now`.
///
/// Rejects timestamps more than `tolerance_secs` away from `now` in either
/// direction. The digest comparison is constant-time; a signature that is
/// not valid hex or has the wrong length simply fails.
pub fn verify_at(
    payload: &[u8],
    header: &str,
    secret: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> bool {
    let Some(record) = parse_header(header) else {
        return false;
    };

    if now.abs_diff(record.timestamp) > tolerance_secs.unsigned_abs() {
        return false;
    }

    let Ok(provided) = hex::decode(&record.signature) else {
        return false;
    };

    keyed_mac(secret, record.timestamp, payload)
        .verify_slice(&provided)
        .is_ok()
}

fn keyed_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

//! Request signing
//!
//! Builds the replay-resistant HMAC-SHA256 authentication headers attached to
//! every outbound control plane request.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Authentication headers derived for a single outbound request.
///
/// A fresh set is computed per call; headers are never cached or reused
/// across requests.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// Lower-case hex HMAC-SHA256 of the canonical payload
    pub signature: String,
    /// Milliseconds since epoch at signing time
    pub timestamp: String,
    /// Fresh random token, unique per call
    pub nonce: String,
}

/// Sign a request body with the raw secret bytes.
///
/// The canonical payload is the UTF-8 string `"{timestamp}:{nonce}:{body}"`,
/// where `body` is the exact string that will be transmitted (empty for
/// bodyless calls).
pub fn sign(secret: &[u8], body: &str) -> Result<SignedHeaders> {
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let nonce = Uuid::new_v4().to_string();

    let payload = canonical_payload(&timestamp, &nonce, body);
    let mut mac =
        HmacSha256::new_from_slice(secret).context("Failed to initialize HMAC from secret")?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(SignedHeaders {
        signature,
        timestamp,
        nonce,
    })
}

/// Recompute and compare a signature in constant time.
///
/// Rejects on any mismatch of signature, timestamp, nonce, or body.
pub fn verify(secret: &[u8], signature: &str, timestamp: &str, nonce: &str, body: &str) -> bool {
    let provided = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(canonical_payload(timestamp, nonce, body).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

fn canonical_payload(timestamp: &str, nonce: &str, body: &str) -> String {
    format!("{}:{}:{}", timestamp, nonce, body)
}

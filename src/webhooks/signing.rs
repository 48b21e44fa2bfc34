//! HMAC-SHA256 payload signing.
//!
//! The signed bytes are the canonical JSON form of the payload (object keys
//! sorted at every depth, no insignificant whitespace). That exact string is
//! also the request body, so receivers verify against the raw body they got.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::constants::webhook::SIGNATURE_PREFIX;

type HmacSha256 = Hmac<Sha256>;

/// Canonical body plus its signature header value, if a secret is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub body: String,
    pub signature: Option<String>,
}

#[derive(Clone, Default)]
pub struct WebhookSigner {
    secret: Option<String>,
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner")
            .field("has_secret", &self.secret.is_some())
            .finish()
    }
}

/// Rebuild `value` with every object's keys in sorted order
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

impl WebhookSigner {
    /// Empty secrets disable signing
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    fn mac(&self, body: &[u8]) -> Option<HmacSha256> {
        let secret = self.secret.as_ref()?;
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(mac)
    }

    /// `sha256=<hex>` over raw bytes
    pub fn signature_for(&self, body: &[u8]) -> Option<String> {
        self.mac(body)
            .map(|mac| format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
    }

    pub fn sign(&self, payload: &Value) -> SignedPayload {
        let body = canonical_json(payload);
        let signature = self.signature_for(body.as_bytes());
        SignedPayload { body, signature }
    }

    /// Constant-time check of a received `X-Hub-Signature-256` header value
    pub fn verify(&self, body: &[u8], header: &str) -> bool {
        let Some(hex_digest) = header.strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            return false;
        };
        self.mac(body)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

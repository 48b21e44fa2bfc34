//! # Webhook Dispatch & Signing
//!
//! Outbound notifications for task transitions. Payloads are canonical JSON
//! signed with HMAC-SHA256 and sent in the `X-Hub-Signature-256` header.
//!
//! ## Key Components
//!
//! - [`WebhookEventType`] - closed event enumeration
//! - [`WebhookSigner`] - signing and receiver-side verification
//! - [`WebhookDispatcher`] - URL resolution, payload building, single delivery attempts
//! - [`WebhookTransport`] - the HTTP POST capability, with a reqwest implementation

pub mod dispatcher;
pub mod events;
pub mod payload;
pub mod signing;
pub mod transport;

pub use dispatcher::{DeliveryOutcome, WebhookDispatcher, WebhookNotification};
pub use events::WebhookEventType;
pub use payload::{task_event_payload, PayloadBuilder};
pub use signing::{canonical_json, SignedPayload, WebhookSigner};
pub use transport::{HttpWebhookTransport, TransportError, WebhookResponse, WebhookTransport};

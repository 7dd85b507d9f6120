//! Webhook ingestion: authenticity verification and payload normalization.

pub mod event;
pub mod verify;

pub use event::{EventKind, PublishEnvironment, WebhookEvent, normalize_event, publish_environment};
pub use verify::verify_signature;

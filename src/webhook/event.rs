//! Normalization and classification of heterogeneous webhook payloads.
//!
//! Different webhook senders nest the event name, entry object, and
//! identifiers differently. Each datum is resolved from an explicit ordered
//! list of candidate locations (JSON pointers against the raw payload); the
//! first hit wins. The lists are the documented contract, not incidental
//! code order.

use serde_json::Value;

/// Candidate locations for the event name.
const EVENT_LOCATIONS: [&str; 2] = ["/event", "/data/event"];

/// Candidate locations for a publish-details structure, used to classify
/// payloads that omit the event name.
const PUBLISH_DETAILS_LOCATIONS: [&str; 2] = ["/data/publish_details", "/publish_details"];

/// Candidate locations for the entry object, most specific first.
const ENTRY_LOCATIONS: [&str; 5] = ["/data/entry", "/entry", "/data/data/entry", "/data", ""];

/// Candidate locations for the entry uid, tried on the resolved entry first,
/// then on the raw payload.
const ENTRY_UID_LOCATIONS: [&str; 2] = ["/uid", "/entry_uid"];
const PAYLOAD_UID_LOCATIONS: [&str; 1] = ["/data/entry_uid"];

/// Candidate locations for the content-type uid on the resolved entry.
const ENTRY_CONTENT_TYPE_LOCATIONS: [&str; 3] =
    ["/content_type_uid", "/content_type/uid", "/content_type"];

/// Candidate locations for the content-type uid on the raw payload.
const PAYLOAD_CONTENT_TYPE_LOCATIONS: [&str; 5] = [
    "/content_type_uid",
    "/content_type/uid",
    "/data/content_type_uid",
    "/data/content_type/uid",
    "/module",
];

/// Bare event words canonicalized to their dotted `entry.*` form.
const KNOWN_BARE_EVENTS: [&str; 7] = [
    "publish",
    "unpublish",
    "delete",
    "update",
    "create",
    "save",
    "republish",
];

/// Classified kind of an incoming webhook event.
///
/// Only `Publish` triggers an upsert; `Unpublish` and `Delete` trigger
/// removal; everything else is acknowledged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Entry was published.
    Publish,
    /// Entry was unpublished.
    Unpublish,
    /// Entry was deleted.
    Delete,
    /// Entry was updated without publishing.
    Update,
    /// Entry was created.
    Create,
    /// Entry was saved as a draft.
    Save,
    /// Entry was republished.
    Republish,
    /// Anything this system does not recognize.
    Unknown,
}

impl EventKind {
    fn from_canonical(event: &str) -> Self {
        match event {
            "entry.publish" => Self::Publish,
            "entry.unpublish" => Self::Unpublish,
            "entry.delete" => Self::Delete,
            "entry.update" => Self::Update,
            "entry.create" => Self::Create,
            "entry.save" => Self::Save,
            "entry.republish" => Self::Republish,
            _ => Self::Unknown,
        }
    }
}

/// A webhook payload normalized into one shape.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Classified event kind.
    pub kind: EventKind,
    /// Canonicalized event name, kept for acknowledgments and logs.
    pub event_name: String,
    /// Entry snapshot carried by the payload.
    pub entry: Value,
    /// Stable entry identifier, when the payload carries one.
    pub entry_uid: Option<String>,
    /// Content-type uid; empty when no location yields one.
    pub content_type_uid: String,
}

/// Normalize a raw webhook payload.
pub fn normalize_event(payload: &Value) -> WebhookEvent {
    let event_name = canonical_event_name(payload);
    let kind = EventKind::from_canonical(&event_name);

    let entry = resolve_entry(payload);
    let entry_uid = first_string(&entry, &ENTRY_UID_LOCATIONS)
        .or_else(|| first_string(payload, &PAYLOAD_UID_LOCATIONS))
        .filter(|uid| !uid.is_empty());
    let content_type_uid = resolve_content_type(payload, &entry);

    WebhookEvent {
        kind,
        event_name,
        entry,
        entry_uid,
        content_type_uid,
    }
}

/// Publish environment carried by a payload, by uid and by name.
#[derive(Debug, Clone, Default)]
pub struct PublishEnvironment {
    /// Environment uid, when present.
    pub uid: Option<String>,
    /// Environment name, when present.
    pub name: Option<String>,
}

impl PublishEnvironment {
    /// Case-insensitive match against a configured target environment.
    ///
    /// An event carrying no environment information does not match; gating
    /// is only skipped when no target is configured at all.
    pub fn matches(&self, target: &str) -> bool {
        [self.uid.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value.eq_ignore_ascii_case(target))
    }

    /// Best identifier available for acknowledgment messages.
    pub fn describe(&self) -> &str {
        self.uid
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unspecified")
    }
}

/// Extract publish-environment identifiers from a payload and its entry.
pub fn publish_environment(payload: &Value, entry: &Value) -> PublishEnvironment {
    let details = entry
        .get("publish_details")
        .or_else(|| payload.pointer("/data/publish_details"))
        .cloned()
        .unwrap_or(Value::Null);

    let uid = first_string(&details, &["/environment", "/environment_uid"])
        .or_else(|| first_string(entry, &["/environment"]));
    let name = first_string(&details, &["/environment_name", "/environmentName"]);

    PublishEnvironment { uid, name }
}

fn canonical_event_name(payload: &Value) -> String {
    let mut event = first_string(payload, &EVENT_LOCATIONS).unwrap_or_default();

    if event.is_empty()
        && PUBLISH_DETAILS_LOCATIONS
            .iter()
            .any(|pointer| payload.pointer(pointer).is_some_and(|v| !v.is_null()))
    {
        // senders that omit the event name still mark publishes
        event = "entry.publish".to_string();
    }

    if !event.is_empty() && !event.starts_with("entry.") {
        let bare = event.to_lowercase();
        if KNOWN_BARE_EVENTS.contains(&bare.as_str()) {
            event = format!("entry.{bare}");
        }
    }

    event
}

fn resolve_entry(payload: &Value) -> Value {
    ENTRY_LOCATIONS
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .find(|candidate| candidate.is_object())
        .cloned()
        .unwrap_or(Value::Null)
}

fn resolve_content_type(payload: &Value, entry: &Value) -> String {
    first_string(entry, &ENTRY_CONTENT_TYPE_LOCATIONS[..2])
        .or_else(|| first_string(payload, &PAYLOAD_CONTENT_TYPE_LOCATIONS))
        .or_else(|| first_string(entry, &ENTRY_CONTENT_TYPE_LOCATIONS[2..]))
        .unwrap_or_default()
}

fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
        .next()
}

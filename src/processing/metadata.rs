//! Projection of arbitrary entries into index-safe metadata.

use serde_json::{Map, Value};

/// Title fields tried in order; the first string value wins.
const TITLE_FIELDS: [&str; 5] = ["title", "heading", "page_title", "meta_title", "name"];

/// Description fields tried in order; the first string value wins.
const DESCRIPTION_FIELDS: [&str; 4] = ["description", "summary", "body", "meta_description"];

/// Primitive entry fields carried into record metadata when present.
const CANDIDATE_FIELDS: [&str; 10] = [
    "title",
    "description",
    "summary",
    "url",
    "slug",
    "locale",
    "uid",
    "_version",
    "updated_at",
    "created_at",
];

/// Maximum length of the text snippet stored with each record.
const SNIPPET_CHARS: usize = 300;

/// Canonical display fields resolved from an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFields {
    /// Human-readable title, defaulting to a placeholder.
    pub title: String,
    /// Short description, defaulting to empty.
    pub description: String,
    /// Entry URL, synthesized from the content type and uid when absent.
    pub url: String,
}

/// Resolve the canonical title/description/url for an entry.
pub fn extract_metadata(entry: &Value, content_type: &str) -> CanonicalFields {
    let title = first_string(entry, &TITLE_FIELDS)
        .unwrap_or("Untitled")
        .to_string();
    let description = first_string(entry, &DESCRIPTION_FIELDS)
        .unwrap_or_default()
        .to_string();
    let url = match entry.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            let uid = entry.get("uid").and_then(Value::as_str).unwrap_or_default();
            format!("/{content_type}/{uid}")
        }
    };

    CanonicalFields {
        title,
        description,
        url,
    }
}

/// Restrict a mapping to the primitive kinds the vector index accepts.
///
/// Nulls are dropped, scalars pass through, sequences become
/// sequences-of-string, and nested objects are serialized to a JSON string.
/// This function is total: a field that resists serialization degrades to its
/// display form rather than failing the whole mapping.
pub fn sanitize_metadata(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                out.insert(key.clone(), value.clone());
            }
            Value::Array(items) => {
                let strings = items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => Value::String(text.clone()),
                        other => Value::String(stringify(other)),
                    })
                    .collect();
                out.insert(key.clone(), Value::Array(strings));
            }
            Value::Object(_) => {
                out.insert(key.clone(), Value::String(stringify(value)));
            }
        }
    }
    out
}

/// Assemble the flat metadata stored with a vector record.
///
/// Combines primitive fields from [`CANDIDATE_FIELDS`], a short snippet of the
/// embedding text, and the canonical `type`/`uid`/`title`/`description`/`url`/
/// `locale` fields, then sanitizes the result.
pub fn build_record_metadata(
    entry: &Value,
    content_type: &str,
    uid: &str,
    text: &str,
) -> Map<String, Value> {
    let content_type = if content_type.is_empty() {
        "content"
    } else {
        content_type
    };
    let canonical = extract_metadata(entry, content_type);

    let mut fields = Map::new();
    for key in CANDIDATE_FIELDS {
        if let Some(value) = entry.get(key)
            && !value.is_null()
            && !value.is_object()
            && !value.is_array()
        {
            fields.insert(key.to_string(), value.clone());
        }
    }
    fields.insert(
        "snippet".to_string(),
        Value::String(text.chars().take(SNIPPET_CHARS).collect()),
    );
    fields.insert(
        "type".to_string(),
        Value::String(content_type.to_string()),
    );
    fields.insert("uid".to_string(), Value::String(uid.to_string()));
    fields.insert("title".to_string(), Value::String(canonical.title));
    fields.insert(
        "description".to_string(),
        Value::String(canonical.description),
    );
    fields.insert("url".to_string(), Value::String(canonical.url));
    fields.insert(
        "locale".to_string(),
        Value::String(resolve_locale(entry).to_string()),
    );

    sanitize_metadata(&fields)
}

/// Resolve an entry's locale, falling back to its publish details, then `en-us`.
pub fn resolve_locale(entry: &Value) -> &str {
    entry
        .get("locale")
        .and_then(Value::as_str)
        .or_else(|| {
            entry
                .pointer("/publish_details/locale")
                .and_then(Value::as_str)
        })
        .unwrap_or("en-us")
}

fn first_string<'a>(entry: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| entry.get(*field).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

fn stringify(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

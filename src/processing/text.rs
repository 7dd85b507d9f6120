//! Flattening of nested CMS entries into embeddable text.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Field names carrying no semantic text; skipped during traversal.
///
/// Keys beginning with `$` or `_` are bookkeeping added by the CMS SDK and are
/// skipped by prefix, so entries like `_version` need no listing here.
const SKIP_KEYS: [&str; 11] = [
    "uid",
    "url",
    "href",
    "filename",
    "content_type",
    "file_size",
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "publish_details",
];

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid html tag pattern"))
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(https?:)?//").expect("valid url pattern"))
}

/// Build the text blob embedded for an entry.
///
/// Walks the entry depth-first over mappings and sequences, collecting every
/// string value that survives cleanup: HTML tags stripped, whitespace
/// collapsed, empties and bare URLs dropped. Fragments are deduplicated while
/// preserving first-seen order, joined, and hard-truncated to `max_chars`
/// characters. An empty return value means the entry has no semantic text and
/// must not be embedded.
pub fn entry_to_text(entry: &Value, max_chars: usize) -> String {
    let mut seen = HashSet::new();
    let mut fragments = Vec::new();
    collect(entry, &mut seen, &mut fragments);

    let text = fragments.join(" \n");
    let text = text.trim();
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}

fn collect(value: &Value, seen: &mut HashSet<String>, fragments: &mut Vec<String>) {
    match value {
        Value::String(raw) => push_fragment(raw, seen, fragments),
        Value::Array(items) => {
            for item in items {
                collect(item, seen, fragments);
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                let lowered = key.to_lowercase();
                if lowered.starts_with('$') || lowered.starts_with('_') {
                    continue;
                }
                if SKIP_KEYS.contains(&lowered.as_str()) {
                    continue;
                }
                collect(val, seen, fragments);
            }
        }
        // Numbers, booleans, and nulls carry no embeddable text.
        _ => {}
    }
}

fn push_fragment(raw: &str, seen: &mut HashSet<String>, fragments: &mut Vec<String>) {
    let cleaned = clean(raw);
    if cleaned.is_empty() || url_pattern().is_match(&cleaned) {
        return;
    }
    if seen.insert(cleaned.clone()) {
        fragments.push(cleaned);
    }
}

fn clean(raw: &str) -> String {
    let stripped = html_tag_pattern().replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extraction_is_deterministic() {
        let entry = json!({
            "title": "Launch notes",
            "blocks": [
                { "block": { "title": "Overview", "copy": "All systems go" } },
                { "block": { "title": "Details", "copy": "Rollout begins Monday" } }
            ]
        });
        let first = entry_to_text(&entry, 20_000);
        let second = entry_to_text(&entry, 20_000);
        assert_eq!(first, second);
        assert!(first.contains("Launch notes"));
        assert!(first.contains("Rollout begins Monday"));
    }

    #[test]
    fn strips_html_and_collapses_whitespace() {
        let entry = json!({ "rich_text": "<p>Hello   <b>world</b></p>\n\n<br/>" });
        assert_eq!(entry_to_text(&entry, 20_000), "Hello world");
    }

    #[test]
    fn drops_bare_urls() {
        let entry = json!({
            "title": "Page",
            "link": "https://example.com/page",
            "cdn": "//cdn.example.com/asset.js"
        });
        let text = entry_to_text(&entry, 20_000);
        assert_eq!(text, "Page");
    }

    #[test]
    fn skips_structural_keys_and_reserved_prefixes() {
        let entry = json!({
            "uid": "blt123",
            "_version": "7",
            "$meta": "internal",
            "created_by": "author-uid",
            "publish_details": { "environment": "prod-env" },
            "heading": "Visible"
        });
        assert_eq!(entry_to_text(&entry, 20_000), "Visible");
    }

    #[test]
    fn deduplicates_preserving_first_seen_order() {
        let entry = json!({
            "title": "Repeated",
            "sections": [
                { "heading": "Repeated" },
                { "heading": "Unique" }
            ]
        });
        assert_eq!(entry_to_text(&entry, 20_000), "Repeated \nUnique");
    }

    #[test]
    fn truncates_to_character_budget() {
        let entry = json!({ "body": "abcdefghij".repeat(10) });
        let text = entry_to_text(&entry, 25);
        assert_eq!(text.chars().count(), 25);
    }

    #[test]
    fn returns_empty_for_non_semantic_entries() {
        let entry = json!({ "uid": "blt1", "file_size": 2048, "published": true });
        assert_eq!(entry_to_text(&entry, 20_000), "");
    }
}

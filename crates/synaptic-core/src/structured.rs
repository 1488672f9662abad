//! `[{section, content}]` arrays and their keyed form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One harvested or model-supplied section. `content` is a string, list of strings or mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSection {
    pub section: String,
    pub content: Value,
}

impl StructuredSection {
    pub fn text(section: &str, content: impl Into<String>) -> Self {
        Self {
            section: section.to_string(),
            content: Value::String(content.into()),
        }
    }

    pub fn list(section: &str, items: Vec<String>) -> Self {
        Self {
            section: section.to_string(),
            content: Value::Array(items.into_iter().map(Value::String).collect()),
        }
    }
}

pub fn sections_to_value(sections: &[StructuredSection]) -> Value {
    serde_json::to_value(sections).unwrap_or(Value::Array(Vec::new()))
}

fn section_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Fold a section array into `{section: content}`.
///
/// Anything that is not an array yields an empty map. Entries without a usable `section` are
/// skipped. Entries that have a `section` but no `content` keep the key with an explicit `null`.
/// That last rule looks accidental but existing consumers depend on it; don't copy it elsewhere.
pub fn to_mapping(data: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(items) = data.as_array() else {
        return out;
    };
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(key) = obj.get("section").and_then(section_key) else {
            continue;
        };
        let content = obj.get("content").cloned().unwrap_or(Value::Null);
        out.insert(key, content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_section_array_to_mapping() {
        let input = json!([
            {"section": "title", "content": "Test Title"},
            {"section": "author", "content": "Test Author"}
        ]);
        let out = to_mapping(&input);
        assert_eq!(Value::Object(out), json!({"title": "Test Title", "author": "Test Author"}));
    }

    #[test]
    fn null_and_non_array_inputs_give_empty_mapping() {
        assert!(to_mapping(&Value::Null).is_empty());
        assert!(to_mapping(&json!("not an array")).is_empty());
        assert!(to_mapping(&json!({"section": "t"})).is_empty());
        assert!(to_mapping(&json!([])).is_empty());
    }

    #[test]
    fn missing_section_is_dropped_and_missing_content_is_explicit_null() {
        let input = json!([
            {"section": "t", "content": "X"},
            {"content": "no section"},
            {"section": "a"}
        ]);
        let out = to_mapping(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out["t"], json!("X"));
        assert!(out.contains_key("a"));
        assert_eq!(out["a"], Value::Null);
    }

    #[test]
    fn later_entries_win_and_content_shapes_pass_through() {
        let input = json!([
            {"section": "authors", "content": "first"},
            {"section": "authors", "content": ["A. One", "B. Two"]},
            {"section": "meta", "content": {"venue": "NeurIPS"}},
            {"section": "", "content": "empty key skipped"},
            null,
            "stray"
        ]);
        let out = to_mapping(&input);
        assert_eq!(out["authors"], json!(["A. One", "B. Two"]));
        assert_eq!(out["meta"]["venue"], "NeurIPS");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn typed_sections_round_into_mapping() {
        let sections = vec![
            StructuredSection::text("title", "Paper"),
            StructuredSection::list("authors", vec!["A".into()]),
        ];
        let out = to_mapping(&sections_to_value(&sections));
        assert_eq!(out["title"], "Paper");
        assert_eq!(out["authors"], json!(["A"]));
    }
}

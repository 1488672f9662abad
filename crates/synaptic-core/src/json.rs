//! Tolerant JSON recovery for model output.
//!
//! Models are told to answer with raw JSON, but often wrap it in prose or code fences. We take
//! the widest span (first opener to last closer) of whichever bracket kind opens first.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJsonFound,
    #[error("malformed JSON in model output: {0}")]
    Malformed(String),
    #[error("model output is JSON but not an object")]
    NotAnObject,
}

fn greedy_span(raw: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| (start, &raw[start..=end]))
}

/// Recover the JSON value embedded in `raw`.
///
/// The span whose opener comes first wins, so a bare array stays an array however many
/// elements it has. The other span is only tried when the first one does not parse.
pub fn parse_model_output(raw: &str) -> Result<serde_json::Value, ParseError> {
    let mut spans: Vec<(usize, &str)> = [greedy_span(raw, '{', '}'), greedy_span(raw, '[', ']')]
        .into_iter()
        .flatten()
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let mut first_err: Option<String> = None;
    for (_, span) in spans {
        match serde_json::from_str::<serde_json::Value>(span) {
            Ok(v) => return Ok(v),
            Err(e) => {
                first_err.get_or_insert_with(|| e.to_string());
            }
        }
    }
    match first_err {
        Some(e) => Err(ParseError::Malformed(e)),
        None => Err(ParseError::NoJsonFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let raw = "Sure! Here you go: {\"exploits\":[]} Thanks.";
        assert_eq!(parse_model_output(raw).unwrap(), json!({"exploits": []}));
    }

    #[test]
    fn extracts_object_from_code_fence() {
        let raw = "```json\n{\"gaps\": [\"no controls\"], \"models\": []}\n```";
        let v = parse_model_output(raw).unwrap();
        assert_eq!(v["gaps"][0], "no controls");
    }

    #[test]
    fn nested_braces_use_outermost_span() {
        let raw = "x {\"a\": {\"b\": [1, {\"c\": 2}]}} y";
        assert_eq!(
            parse_model_output(raw).unwrap(),
            json!({"a": {"b": [1, {"c": 2}]}})
        );
    }

    #[test]
    fn bracket_prefix_does_not_shadow_object() {
        let raw = "[note] result: {\"exploits\": [\"x\"]}";
        assert_eq!(
            parse_model_output(raw).unwrap(),
            json!({"exploits": ["x"]})
        );
    }

    #[test]
    fn bare_array_is_accepted() {
        let raw = "Sections: [{\"section\": \"title\", \"content\": \"T\"}]";
        assert!(parse_model_output(raw).unwrap().is_array());
    }

    #[test]
    fn array_shape_does_not_depend_on_element_count() {
        let one = parse_model_output(r#"[{"exploits": ["x"]}]"#).unwrap();
        assert_eq!(one, json!([{"exploits": ["x"]}]));
        let two = parse_model_output(r#"[{"exploits": ["x"]}, {"gaps": []}]"#).unwrap();
        assert_eq!(two.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn no_braces_is_no_json_found() {
        assert_eq!(
            parse_model_output("I could not analyze this page."),
            Err(ParseError::NoJsonFound)
        );
        // A closer before the opener is not a span either.
        assert_eq!(parse_model_output("} oops {"), Err(ParseError::NoJsonFound));
    }

    #[test]
    fn broken_span_is_malformed() {
        let err = parse_model_output("here: {\"exploits\": [} done").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)), "{err:?}");
    }

    proptest! {
        #[test]
        fn never_panics(raw in any::<String>()) {
            let _ = parse_model_output(&raw);
        }

        #[test]
        fn recovers_any_object_wrapped_in_brace_free_prose(
            prefix in "[^{}\\[\\]]{0,40}",
            suffix in "[^{}\\[\\]]{0,40}",
            key in "[a-z]{1,10}",
            n in any::<i32>(),
        ) {
            let obj = json!({ key.clone(): n });
            let raw = format!("{prefix}{obj}{suffix}");
            prop_assert_eq!(parse_model_output(&raw).unwrap(), obj);
        }
    }
}

//! Response envelope unwrapping.
//!
//! The backend has shipped several wrappings of the same payload over time:
//! a bare object, `{data: …}`, `{result: …}`, `{data: {result: …}}` and
//! `{result: {data: …}}`. Newer responses nest one level deeper, so the
//! deepest wrapper is probed first.

use serde_json::{Map, Value};

use super::coerce::try_parse_json;

const ENVELOPE_KEYS: [&str; 2] = ["data", "result"];

/// Owned, normalized copy of a raw response that can be probed for candidates.
///
/// Construction parses JSON-encoded text at the root and at every envelope
/// level, so composers never see stringified payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    root: Value,
}

impl Envelope {
    #[must_use]
    pub fn parse(raw: &Value) -> Self {
        let mut root = try_parse_json(raw).into_owned();
        if let Value::Object(map) = &mut root {
            for key in ENVELOPE_KEYS {
                if let Some(inner) = map.get_mut(key) {
                    *inner = try_parse_json(inner).into_owned();
                    if let Value::Object(inner_map) = inner {
                        for nested in ENVELOPE_KEYS {
                            if let Some(deep) = inner_map.get_mut(nested) {
                                *deep = try_parse_json(deep).into_owned();
                            }
                        }
                    }
                }
            }
        }
        Self { root }
    }

    /// The normalized root value.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Candidate payload objects, most specific first:
    /// `data.result`, `result.data`, `data`, `result`, then the root itself.
    #[must_use]
    pub fn candidates(&self) -> Vec<&Map<String, Value>> {
        let Some(root) = self.root.as_object() else {
            return Vec::new();
        };
        let data = root.get("data").and_then(Value::as_object);
        let result = root.get("result").and_then(Value::as_object);
        let data_result = data.and_then(|d| d.get("result")).and_then(Value::as_object);
        let result_data = result.and_then(|r| r.get("data")).and_then(Value::as_object);

        [data_result, result_data, data, result, Some(root)]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Candidate values (not only objects) at each envelope position, in the
    /// same order as [`candidates`](Self::candidates). Used when the payload
    /// may be an array rather than a record.
    #[must_use]
    pub fn candidate_values(&self) -> Vec<&Value> {
        let root = &self.root;
        let data = root.get("data");
        let result = root.get("result");
        let data_result = data.and_then(|d| d.get("result"));
        let result_data = result.and_then(|r| r.get("data"));

        [data_result, result_data, data, result, Some(root)]
            .into_iter()
            .flatten()
            .collect()
    }

    /// The most specific candidate object, as a value.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.candidate_values().into_iter().find(|v| v.is_object())
    }
}

/// Convenience wrapper returning owned candidates for one-off probing.
#[must_use]
pub fn unwrap_envelope(raw: &Value) -> Vec<Map<String, Value>> {
    Envelope::parse(raw)
        .candidates()
        .into_iter()
        .cloned()
        .collect()
}

/// Strip a top-level `{result: …}` wrapper, as the transport layer does for
/// calls that request result unwrapping.
#[must_use]
pub fn unwrap_common_result(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn candidates_are_deepest_first() {
        let raw = json!({
            "data": {"result": {"level": "data.result"}, "level": "data"},
            "level": "root"
        });
        let envelope = Envelope::parse(&raw);
        let levels: Vec<_> = envelope
            .candidates()
            .iter()
            .filter_map(|c| c.get("level").and_then(Value::as_str))
            .collect();
        assert_eq!(levels, ["data.result", "data", "root"]);
    }

    #[test]
    fn result_data_is_probed() {
        let raw = json!({"result": {"data": {"x": 1}}});
        let envelope = Envelope::parse(&raw);
        assert_eq!(envelope.candidates()[0].get("x"), Some(&json!(1)));
    }

    #[test]
    fn stringified_root_and_levels_are_parsed() {
        let raw = json!("{\"data\": \"{\\\"result\\\": {\\\"x\\\": 2}}\"}");
        let envelope = Envelope::parse(&raw);
        assert_eq!(envelope.candidates()[0].get("x"), Some(&json!(2)));
    }

    #[test]
    fn unparseable_string_yields_no_candidates() {
        assert!(unwrap_envelope(&json!("oops")).is_empty());
        assert!(unwrap_envelope(&json!(null)).is_empty());
        assert!(unwrap_envelope(&json!([1, 2])).is_empty());
    }

    #[test]
    fn common_result_unwrap() {
        assert_eq!(unwrap_common_result(json!({"result": [1]})), json!([1]));
        assert_eq!(unwrap_common_result(json!({"data": 1})), json!({"data": 1}));
        assert_eq!(unwrap_common_result(json!("text")), json!("text"));
    }
}

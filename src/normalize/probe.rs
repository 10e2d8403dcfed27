//! Declarative field probes.
//!
//! A [`Probe`] pairs a key path with a type guard. Composers list probes in
//! priority order and let [`first_match`] evaluate them, so probe order is
//! data rather than nested optional chaining.

use serde_json::{Map, Value};

use super::coerce::{as_record, coerce_non_empty_string};

/// Nesting limit for recursive searches.
pub const MAX_DEEP_SEARCH_DEPTH: usize = 5;

/// A key path plus the guard that accepts and converts the value found there.
#[derive(Debug, Clone, Copy)]
pub struct Probe<T> {
    pub path: &'static [&'static str],
    pub guard: fn(&Value) -> Option<T>,
}

impl<T> Probe<T> {
    #[must_use]
    pub const fn new(path: &'static [&'static str], guard: fn(&Value) -> Option<T>) -> Self {
        Self { path, guard }
    }

    /// Evaluate this probe against one candidate object.
    #[must_use]
    pub fn eval(&self, candidate: &Map<String, Value>) -> Option<T> {
        lookup(candidate, self.path).and_then(self.guard)
    }
}

/// Follow `path` through nested objects.
#[must_use]
pub fn lookup<'a>(record: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = record.get(*first)?;
    for key in rest {
        current = as_record(current)?.get(*key)?;
    }
    Some(current)
}

/// Scan candidates in order and, within each, probes in order; return the
/// first value a guard accepts.
#[must_use]
pub fn first_match<T>(candidates: &[&Map<String, Value>], probes: &[Probe<T>]) -> Option<T> {
    candidates
        .iter()
        .find_map(|candidate| probes.iter().find_map(|probe| probe.eval(candidate)))
}

/// Single-key form of [`first_match`]: the first alias present on the first
/// candidate that has one, converted by `guard`.
#[must_use]
pub fn extract_field<T>(
    candidates: &[&Map<String, Value>],
    aliases: &[&str],
    guard: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    candidates.iter().find_map(|candidate| {
        aliases
            .iter()
            .find_map(|alias| candidate.get(*alias).and_then(&guard))
    })
}

/// First value under any alias that `guard` accepts, searching nested
/// objects and arrays up to [`MAX_DEEP_SEARCH_DEPTH`] levels.
///
/// Within an object the aliases are tried before descending into its values.
#[must_use]
pub fn deep_find<T, G>(source: &Value, keys: &[&str], guard: G) -> Option<T>
where
    G: Fn(&Value) -> Option<T>,
{
    deep_find_at(source, keys, &guard, 0)
}

fn deep_find_at<T, G>(source: &Value, keys: &[&str], guard: &G, depth: usize) -> Option<T>
where
    G: Fn(&Value) -> Option<T>,
{
    if depth > MAX_DEEP_SEARCH_DEPTH {
        return None;
    }
    match source {
        Value::Array(items) => items
            .iter()
            .find_map(|item| deep_find_at(item, keys, guard, depth + 1)),
        Value::Object(record) => keys
            .iter()
            .find_map(|key| record.get(*key).and_then(guard))
            .or_else(|| {
                record
                    .values()
                    .find_map(|value| deep_find_at(value, keys, guard, depth + 1))
            }),
        _ => None,
    }
}

/// String form of [`deep_find`]. Only values under one of `keys` match; a
/// bare string `source` or a string under any other key never does.
#[must_use]
pub fn deep_find_string(source: &Value, keys: &[&str]) -> Option<String> {
    deep_find(source, keys, coerce_non_empty_string)
}

/// First non-empty list of objects under any alias, searching nested values
/// up to [`MAX_DEEP_SEARCH_DEPTH`] levels. An array of objects met during the
/// walk is itself a match.
#[must_use]
pub fn deep_find_record_array<'a>(
    source: &'a Value,
    keys: &[&str],
) -> Option<Vec<&'a Map<String, Value>>> {
    deep_find_record_array_at(source, keys, 0)
}

fn deep_find_record_array_at<'a>(
    source: &'a Value,
    keys: &[&str],
    depth: usize,
) -> Option<Vec<&'a Map<String, Value>>> {
    if depth > MAX_DEEP_SEARCH_DEPTH {
        return None;
    }
    match source {
        Value::Array(items) => {
            let records: Vec<_> = items.iter().filter_map(Value::as_object).collect();
            if !records.is_empty() {
                return Some(records);
            }
            items
                .iter()
                .find_map(|item| deep_find_record_array_at(item, keys, depth + 1))
        }
        Value::Object(record) => keys
            .iter()
            .find_map(|key| {
                let records: Vec<_> = record
                    .get(*key)?
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_object)
                    .collect();
                (!records.is_empty()).then_some(records)
            })
            .or_else(|| {
                record
                    .values()
                    .find_map(|value| deep_find_record_array_at(value, keys, depth + 1))
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::normalize::coerce::coerce_number;

    const TEMP_PROBES: &[Probe<f64>] = &[
        Probe::new(&["current", "temp"], coerce_number),
        Probe::new(&["current", "temperature"], coerce_number),
    ];

    #[test]
    fn first_match_prefers_earlier_candidate() {
        let deep = json!({"current": {"temperature": 20}});
        let shallow = json!({"current": {"temp": 10}});
        let candidates = [deep.as_object().unwrap(), shallow.as_object().unwrap()];
        assert_eq!(first_match(&candidates, TEMP_PROBES), Some(20.0));
    }

    #[test]
    fn first_match_skips_rejected_values() {
        let record = json!({"current": {"temp": "n/a", "temperature": "18.5"}});
        let candidates = [record.as_object().unwrap()];
        assert_eq!(first_match(&candidates, TEMP_PROBES), Some(18.5));
    }

    #[test]
    fn extract_field_total_miss() {
        let record = json!({"a": 1});
        let candidates = [record.as_object().unwrap()];
        assert_eq!(extract_field(&candidates, &["b", "c"], coerce_number), None);
        assert_eq!(extract_field(&[], &["a"], coerce_number), None);
    }

    #[test]
    fn deep_string_search_walks_nested_values() {
        let raw = json!({"payload": [{"meta": {"accessToken": " tok "}}]});
        assert_eq!(
            deep_find_string(&raw, &["access_token", "accessToken"]),
            Some("tok".to_string())
        );
    }

    #[test]
    fn deep_string_search_ignores_unrelated_strings() {
        let raw = json!({"access_token": "A", "profile": {"nickname": "kim"}});
        assert_eq!(deep_find_string(&raw, &["refresh_token"]), None);
        assert_eq!(deep_find_string(&json!(" bare "), &["x"]), None);
    }

    #[test]
    fn deep_string_search_is_depth_limited() {
        let raw = json!({"a": {"b": {"c": {"d": {"e": {"f": {"g": {"token": "x"}}}}}}}});
        assert_eq!(deep_find_string(&raw, &["token"]), None);
    }

    #[test]
    fn deep_find_numbers() {
        let raw = json!({"farm": {"lat": "37.5", "lon": 127}});
        assert_eq!(deep_find(&raw, &["latitude", "lat"], coerce_number), Some(37.5));
        assert_eq!(deep_find(&raw, &["longitude", "lon"], coerce_number), Some(127.0));
    }

    #[test]
    fn deep_record_array_prefers_alias() {
        let raw = json!({"user": {"farms": [{"farmId": 1}, 3]}});
        let farms = deep_find_record_array(&raw, &["farms"]).unwrap();
        assert_eq!(farms.len(), 1);
        assert_eq!(farms[0].get("farmId"), Some(&json!(1)));
    }
}

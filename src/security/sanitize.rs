//! Payload sanitization against document-query operator injection.
//!
//! # Responsibilities
//! - Hold the denylist of operator keys (`$ne`, `$gt`, `$where`, ...)
//! - Strip denylisted keys at every depth of a JSON value
//! - Report what was stripped so the caller can log it
//!
//! # Design Decisions
//! - One pure transform, applied to body and query alike
//! - Containers are never removed, only the offending keys inside them
//! - Sanitization never fails; the request proceeds with the cleaned payload

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::SanitizeConfig;

/// MongoDB operators recognised as injection markers by default.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "$where",
    "$ne",
    "$in",
    "$nin",
    "$gt",
    "$gte",
    "$lt",
    "$lte",
    "$exists",
    "$regex",
    "$options",
    "$expr",
    "$jsonSchema",
    "$mod",
    "$all",
    "$size",
    "$elemMatch",
    "$slice",
];

/// Immutable set of keys that must never reach a query builder.
#[derive(Debug, Clone)]
pub struct SanitizationPolicy {
    denylist: HashSet<String>,
    /// Any key starting with this prefix is denylisted as well.
    reserved_prefix: Option<String>,
}

impl SanitizationPolicy {
    pub fn new<I, S>(keys: I, reserved_prefix: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denylist: keys.into_iter().map(Into::into).collect(),
            reserved_prefix: reserved_prefix.filter(|p| !p.is_empty()),
        }
    }

    pub fn from_config(config: &SanitizeConfig) -> Self {
        let mut policy = Self::new(DEFAULT_DENYLIST.iter().copied(), config.reserved_prefix.clone());
        policy.denylist.extend(config.extra_keys.iter().cloned());
        policy
    }

    /// Case-sensitive check of a single object key.
    pub fn is_denied(&self, key: &str) -> bool {
        if self.denylist.contains(key) {
            return true;
        }
        matches!(&self.reserved_prefix, Some(prefix) if key.starts_with(prefix.as_str()))
    }
}

impl Default for SanitizationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied(), None)
    }
}

/// Outcome of a sanitization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub value: Value,
    /// Dotted paths of every key that was removed.
    pub stripped: Vec<String>,
}

impl Sanitized {
    pub fn is_clean(&self) -> bool {
        self.stripped.is_empty()
    }
}

/// Recursive key-stripping transform driven by a [`SanitizationPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PayloadSanitizer {
    policy: SanitizationPolicy,
}

impl PayloadSanitizer {
    pub fn new(policy: SanitizationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SanitizationPolicy {
        &self.policy
    }

    /// Return a copy of `value` with every denylisted key removed.
    pub fn sanitize(&self, value: &Value) -> Value {
        self.sanitize_with_report(value).value
    }

    /// Same as [`sanitize`](Self::sanitize), also listing the stripped key paths.
    pub fn sanitize_with_report(&self, value: &Value) -> Sanitized {
        let mut stripped = Vec::new();
        let value = self.strip(value, "", &mut stripped);
        Sanitized { value, stripped }
    }

    fn strip(&self, value: &Value, path: &str, stripped: &mut Vec<String>) -> Value {
        match value {
            Value::Object(map) => {
                let mut clean = Map::with_capacity(map.len());
                for (key, val) in map {
                    let child = join_path(path, key);
                    if self.policy.is_denied(key) {
                        stripped.push(child);
                        continue;
                    }
                    clean.insert(key.clone(), self.strip(val, &child, stripped));
                }
                Value::Object(clean)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.strip(item, &join_path(path, &i.to_string()), stripped))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contains_key(value: &Value, key: &str) -> bool {
        match value {
            Value::Object(map) => map.iter().any(|(k, v)| k == key || contains_key(v, key)),
            Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
            _ => false,
        }
    }

    #[test]
    fn test_strips_top_level_operator() {
        let sanitizer = PayloadSanitizer::default();
        let input = json!({"email": "a@b.c", "password": {"$ne": null}});
        let out = sanitizer.sanitize(&input);
        assert_eq!(out, json!({"email": "a@b.c", "password": {}}));
    }

    #[test]
    fn test_strips_at_every_depth_and_inside_arrays() {
        let sanitizer = PayloadSanitizer::default();
        let input = json!({
            "filters": [
                {"price": {"$gt": 0, "max": 900}},
                {"$where": "sleep(1000)"},
                "plain",
                3
            ],
            "meta": {"deep": {"deeper": {"$regex": ".*", "ok": true}}}
        });
        let report = sanitizer.sanitize_with_report(&input);

        assert_eq!(
            report.value,
            json!({
                "filters": [
                    {"price": {"max": 900}},
                    {},
                    "plain",
                    3
                ],
                "meta": {"deep": {"deeper": {"ok": true}}}
            })
        );
        assert_eq!(
            report.stripped,
            vec![
                "filters.0.price.$gt".to_string(),
                "filters.1.$where".to_string(),
                "meta.deep.deeper.$regex".to_string(),
            ]
        );
    }

    #[test]
    fn test_primitives_pass_through() {
        let sanitizer = PayloadSanitizer::default();
        for value in [json!(null), json!(1.5), json!("$ne"), json!(false)] {
            assert_eq!(sanitizer.sanitize(&value), value);
        }
    }

    #[test]
    fn test_idempotent() {
        let sanitizer = PayloadSanitizer::default();
        let inputs = [
            json!({"a": {"$in": [1, 2]}, "b": [{"$exists": true, "c": 1}]}),
            json!([{"$or": 1}, {"$and": [{"$gt": 2}]}]),
            json!({"title": "2br near campus", "rent": 850}),
        ];
        for input in inputs {
            let once = sanitizer.sanitize(&input);
            assert_eq!(sanitizer.sanitize(&once), once);
        }
    }

    #[test]
    fn test_every_denylisted_key_removed_and_rest_preserved() {
        let sanitizer = PayloadSanitizer::default();
        for op in DEFAULT_DENYLIST {
            let input = json!({
                "keep": 1,
                "nested": [{ *op: "x", "name": "ok" }, { "inner": { *op: { "y": 2 } } }]
            });
            let out = sanitizer.sanitize(&input);
            assert!(!contains_key(&out, op), "{op} survived");
            assert_eq!(out["keep"], json!(1));
            assert_eq!(out["nested"][0]["name"], json!("ok"));
            assert_eq!(out["nested"][1]["inner"], json!({}));
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let sanitizer = PayloadSanitizer::default();
        let input = json!({"$ne": 1});
        let _ = sanitizer.sanitize(&input);
        assert_eq!(input, json!({"$ne": 1}));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let sanitizer = PayloadSanitizer::default();
        let input = json!({"$NE": 1, "$Where": 2});
        assert_eq!(sanitizer.sanitize(&input), input);
    }

    #[test]
    fn test_reserved_prefix_blocks_unknown_operators() {
        let sanitizer = PayloadSanitizer::new(SanitizationPolicy::new(
            DEFAULT_DENYLIST.iter().copied(),
            Some("$".to_string()),
        ));
        let input = json!({"$or": [{"a": 1}], "price$": 2});
        assert_eq!(sanitizer.sanitize(&input), json!({"price$": 2}));
    }
}

//! Bracket-notation decoding for query strings and URL-encoded forms.
//!
//! `price[$gt]=0&tags[]=quiet&tags[]=pets` decodes to
//! `{"price": {"$gt": "0"}, "tags": ["quiet", "pets"]}` so nested operator
//! keys reach the sanitizer the same way they would reach a query builder.
//!
//! Rewrites work pair by pair over the raw input: a pair is either kept
//! byte-for-byte or dropped, so repeated keys and the caller's own encoding
//! survive untouched.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Decode `input` into a JSON object. Invalid UTF-8 is replaced, not refused.
pub fn parse_nested(input: impl AsRef<[u8]>) -> Value {
    let mut root = Map::new();
    for (key, value) in form_urlencoded::parse(input.as_ref()) {
        let segments = split_key(&key);
        insert(&mut root, &segments, value.into_owned());
    }
    Value::Object(root)
}

/// The raw `&`-separated pairs of `input`, still percent-encoded.
pub fn raw_pairs(input: &[u8]) -> impl Iterator<Item = &[u8]> {
    input.split(|b| *b == b'&').filter(|pair| !pair.is_empty())
}

/// `a[b][]` → `["a", "b", ""]`. Anything malformed is one literal key.
fn split_key(key: &str) -> Vec<String> {
    let literal = || vec![key.to_string()];

    let open = match key.find('[') {
        Some(0) | None => return literal(),
        Some(i) => i,
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(close) => {
                segments.push(inner[..close].to_string());
                rest = &inner[close + 1..];
            }
            None => return literal(),
        }
    }
    if !rest.is_empty() {
        return literal();
    }
    segments
}

fn insert(map: &mut Map<String, Value>, segments: &[String], value: String) {
    let Some((key, tail)) = segments.split_first() else {
        return;
    };

    if tail.is_empty() {
        match map.get_mut(key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            // Repeated plain keys collect into an array.
            Some(existing @ Value::String(_)) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, Value::String(value)]);
            }
            _ => {
                map.insert(key.clone(), Value::String(value));
            }
        }
        return;
    }

    let slot = map.entry(key.clone()).or_insert(Value::Null);
    descend(slot, tail, value);
}

fn descend(slot: &mut Value, segments: &[String], value: String) {
    let Some((key, tail)) = segments.split_first() else {
        return;
    };

    if key.is_empty() {
        if !slot.is_array() {
            let seed = match slot.take() {
                Value::Null => Vec::new(),
                scalar => vec![scalar],
            };
            *slot = Value::Array(seed);
        }
        let Value::Array(items) = slot else {
            return;
        };
        if tail.is_empty() {
            items.push(Value::String(value));
        } else {
            let mut child = Value::Null;
            descend(&mut child, tail, value);
            items.push(child);
        }
        return;
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        insert(map, segments, value);
    }
}

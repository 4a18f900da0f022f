//! Removal of fields that change on every build.

use crate::patch::{split_pointer, unescape_token};
use serde_json::Value;

/// Copy of `value` with every field matched by `volatile_fields` removed.
///
/// Patterns are JSON pointers; a `*` token matches any single key or index.
/// Patterns that match nothing are ignored.
pub fn normalize(value: &Value, volatile_fields: &[String]) -> Value {
    let mut normalized = value.clone();
    for pattern in volatile_fields {
        let tokens: Vec<String> = split_pointer(pattern)
            .into_iter()
            .map(unescape_token)
            .collect();
        if !tokens.is_empty() {
            strip(&mut normalized, &tokens);
        }
    }
    normalized
}

fn strip(value: &mut Value, tokens: &[String]) {
    let Some((head, rest)) = tokens.split_first() else {
        return;
    };
    let wildcard = head == "*";

    match value {
        Value::Object(map) => {
            if rest.is_empty() {
                if wildcard {
                    map.clear();
                } else {
                    map.remove(head);
                }
            } else if wildcard {
                for child in map.values_mut() {
                    strip(child, rest);
                }
            } else if let Some(child) = map.get_mut(head) {
                strip(child, rest);
            }
        }
        Value::Array(items) => {
            if rest.is_empty() {
                if wildcard {
                    items.clear();
                } else if let Ok(index) = head.parse::<usize>()
                    && index < items.len()
                {
                    items.remove(index);
                }
            } else if wildcard {
                for child in items.iter_mut() {
                    strip(child, rest);
                }
            } else if let Some(child) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                strip(child, rest);
            }
        }
        _ => {}
    }
}

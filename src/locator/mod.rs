//! Key search over untyped provider JSON.
//!
//! YouTube embeds its page state as deeply nested JSON whose shape changes often, so fields are
//! located by key at any depth instead of by path. Traversal is depth-first in document order
//! (objects entry by entry, descending into each value before moving to the next entry; arrays
//! element by element) and uses an explicit stack, so nesting depth is bounded only by memory.

use serde_json::map::Iter as EntryIter;
use serde_json::Value;
use std::slice::Iter as ItemIter;

enum Frame<'a> {
    Entries(EntryIter<'a>),
    Items(ItemIter<'a, Value>),
}

fn push<'a>(stack: &mut Vec<Frame<'a>>, value: &'a Value) {
    match value {
        Value::Object(map) => stack.push(Frame::Entries(map.iter())),
        Value::Array(items) => stack.push(Frame::Items(items.iter())),
        _ => {}
    }
}

/// Walk `root` in document order, calling `visit` for every object entry.
///
/// Returning `true` from `visit` stops the walk.
fn walk<'a>(root: &'a Value, mut visit: impl FnMut(&'a str, &'a Value) -> bool) {
    let mut stack = Vec::new();
    push(&mut stack, root);

    while let Some(frame) = stack.last_mut() {
        let next = match frame {
            Frame::Entries(entries) => match entries.next() {
                Some((key, value)) => {
                    if visit(key.as_str(), value) {
                        return;
                    }
                    Some(value)
                }
                None => None,
            },
            Frame::Items(items) => items.next(),
        };

        match next {
            Some(child) => push(&mut stack, child),
            None => {
                stack.pop();
            }
        }
    }
}

/// Return the value of the first entry named `key`, searching at any depth.
///
/// A matching entry whose value is `null` is still a match.
pub fn find<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut found = None;
    walk(root, |k, v| {
        if k == key {
            found = Some(v);
            true
        } else {
            false
        }
    });
    found
}

/// Return every value stored under `key`, in traversal order.
///
/// Matches nested inside an earlier match are included.
pub fn find_all<'a>(root: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    walk(root, |k, v| {
        if k == key {
            found.push(v);
        }
        false
    });
    found
}

/// Like `find_all`, but collects entries named by any of `keys`, interleaved in traversal order.
pub fn find_all_of<'a>(root: &'a Value, keys: &[&str]) -> Vec<&'a Value> {
    let mut found = Vec::new();
    walk(root, |k, v| {
        if keys.contains(&k) {
            found.push(v);
        }
        false
    });
    found
}

/// Convenience for `find` followed by `text_of`.
pub fn find_text(root: &Value, key: &str) -> Option<String> {
    find(root, key).and_then(text_of)
}

/// Flatten a provider text field into a plain string.
///
/// Handles bare strings and numbers, `{"simpleText": ..}`, `{"runs": [{"text": ..}]}` and
/// `{"content": ..}`. Empty results are `None`.
pub fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("simpleText") {
                s.clone()
            } else if let Some(Value::Array(runs)) = map.get("runs") {
                runs.iter()
                    .filter_map(|run| run.get("text").and_then(Value::as_str))
                    .collect::<String>()
            } else if let Some(Value::String(s)) = map.get("content") {
                s.clone()
            } else {
                return None;
            }
        }
        _ => return None,
    };

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_nested_key() {
        let data = json!({"a": {"b": {"target": 5}}});
        assert_eq!(find(&data, "target"), Some(&json!(5)));
    }

    #[test]
    fn test_find_missing_key() {
        let data = json!({"a": {"b": [1, 2, {"c": "d"}]}});
        assert_eq!(find(&data, "target"), None);
        assert_eq!(find(&json!(42), "target"), None);
    }

    #[test]
    fn test_find_first_in_list_order() {
        let data = json!([{"x": 1}, {"target": "first"}, {"target": "second"}]);
        assert_eq!(find(&data, "target"), Some(&json!("first")));
    }

    #[test]
    fn test_find_descends_before_next_entry() {
        // the nested match under "a" precedes the sibling "target" entry in traversal order
        let data = json!({"a": {"target": "deep"}, "target": "shallow"});
        assert_eq!(find(&data, "target"), Some(&json!("deep")));
    }

    #[test]
    fn test_find_returns_structured_values() {
        let data = json!({"outer": {"details": {"title": "t", "viewCount": "10"}}});
        let details = find(&data, "details").unwrap();
        assert_eq!(find(details, "viewCount"), Some(&json!("10")));
    }

    #[test]
    fn test_find_null_is_a_match() {
        let data = json!({"target": null, "other": {"target": 1}});
        assert_eq!(find(&data, "target"), Some(&Value::Null));
    }

    #[test]
    fn test_find_survives_deep_nesting() {
        let mut data = json!({"target": "bottom"});
        for _ in 0..20_000 {
            // move each level in; json! would re-serialize the tree recursively
            let mut wrap = serde_json::Map::new();
            wrap.insert("wrap".to_string(), data);
            data = Value::Array(vec![Value::Object(wrap)]);
        }
        assert_eq!(find(&data, "target"), Some(&json!("bottom")));
        // serde_json's recursive Drop would overflow on this depth
        std::mem::forget(data);
    }

    #[test]
    fn test_find_all_of_interleaves_keys() {
        let data = json!([
            {"gridVideoRenderer": {"videoId": "g1"}},
            {"videoRenderer": {"videoId": "r1"}},
            {"gridVideoRenderer": {"videoId": "g2"}}
        ]);
        let ids: Vec<_> = find_all_of(&data, &["videoRenderer", "gridVideoRenderer"])
            .into_iter()
            .filter_map(|v| v.get("videoId").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["g1", "r1", "g2"]);
    }

    #[test]
    fn test_find_all_in_document_order() {
        let data = json!({
            "items": [
                {"videoRenderer": {"videoId": "a"}},
                {"shelf": {"videoRenderer": {"videoId": "b"}}},
                {"videoRenderer": {"videoId": "c"}}
            ]
        });
        let ids: Vec<_> = find_all(&data, "videoId")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_text_of_variants() {
        assert_eq!(text_of(&json!("plain")), Some("plain".to_string()));
        assert_eq!(text_of(&json!({"simpleText": "simple"})), Some("simple".to_string()));
        assert_eq!(
            text_of(&json!({"runs": [{"text": "Hello, "}, {"text": "world"}]})),
            Some("Hello, world".to_string())
        );
        assert_eq!(text_of(&json!({"content": "desc"})), Some("desc".to_string()));
        assert_eq!(text_of(&json!(1234)), Some("1234".to_string()));
        assert_eq!(text_of(&json!({"other": 1})), None);
        assert_eq!(text_of(&json!("   ")), None);
    }
}

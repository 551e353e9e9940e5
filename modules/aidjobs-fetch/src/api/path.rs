use serde_json::Value;

/// Resolve a dotted path (`results.jobs`, `tags[0]`, `$.data.items[*]`)
/// against a JSON value. A `$.` or `$` prefix is accepted and stripped.
pub fn resolve_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = step(current, &segment)?;
    }
    Some(current)
}

/// Resolve a path expected to yield the item array. A terminal `[*]` (or a
/// path landing on an array) yields the elements; a single object yields a
/// one-element list. Empty or "." paths fall back to common wrapper keys.
pub fn resolve_items(root: &Value, path: &str) -> Vec<Value> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == "$" {
        return items_at_root(root);
    }

    let value = match resolve_value(root, trimmed) {
        Some(v) => v,
        None => return Vec::new(),
    };

    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn items_at_root(root: &Value) -> Vec<Value> {
    match root {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            for key in ["data", "items", "results", "jobs"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.clone();
                }
            }
            vec![root.clone()]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

fn segments(path: &str) -> Vec<Segment> {
    let stripped = path
        .trim()
        .strip_prefix("$.")
        .or_else(|| path.trim().strip_prefix('$'))
        .unwrap_or(path.trim());

    let mut result = Vec::new();
    for part in stripped.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        // Leading key before any bracket.
        if let Some(bracket) = rest.find('[') {
            let key = &rest[..bracket];
            if !key.is_empty() {
                result.push(Segment::Key(key.to_string()));
            }
            rest = &rest[bracket..];
            // One or more [n] / [*] suffixes.
            while let Some(close) = rest.find(']') {
                let inner = &rest[1..close];
                if inner == "*" {
                    result.push(Segment::Wildcard);
                } else if let Ok(index) = inner.parse::<usize>() {
                    result.push(Segment::Index(index));
                }
                rest = &rest[close + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
        } else {
            result.push(Segment::Key(rest.to_string()));
        }
    }
    result
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match segment {
        Segment::Key(key) => value.as_object()?.get(key),
        Segment::Index(index) => value.as_array()?.get(*index),
        // A wildcard mid-path is only meaningful as a terminal "take the
        // array" marker; treat it as identity on arrays.
        Segment::Wildcard => {
            if value.is_array() {
                Some(value)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_path_traverses_objects() {
        let data = json!({"a": {"b": {"c": 42}}});
        assert_eq!(resolve_value(&data, "a.b.c"), Some(&json!(42)));
        assert_eq!(resolve_value(&data, "a.b.missing"), None);
    }

    #[test]
    fn indexed_path_traverses_arrays() {
        let data = json!({"tags": ["wash", "health"]});
        assert_eq!(resolve_value(&data, "tags[0]"), Some(&json!("wash")));
        assert_eq!(resolve_value(&data, "tags[1]"), Some(&json!("health")));
        assert_eq!(resolve_value(&data, "tags[5]"), None);
    }

    #[test]
    fn jsonpath_prefix_accepted() {
        let data = json!({"data": {"jobs": [1, 2]}});
        assert_eq!(
            resolve_items(&data, "$.data.jobs"),
            vec![json!(1), json!(2)]
        );
        assert_eq!(
            resolve_items(&data, "data.jobs[*]"),
            vec![json!(1), json!(2)]
        );
    }

    #[test]
    fn root_fallback_tries_common_keys() {
        let data = json!({"results": [{"t": 1}]});
        assert_eq!(resolve_items(&data, "."), vec![json!({"t": 1})]);

        let bare = json!([{"t": 2}]);
        assert_eq!(resolve_items(&bare, ""), vec![json!({"t": 2})]);
    }

    #[test]
    fn single_object_wrapped_as_one_item() {
        let data = json!({"job": {"title": "Officer"}});
        assert_eq!(resolve_items(&data, "job"), vec![json!({"title": "Officer"})]);
    }

    #[test]
    fn nested_index_then_key() {
        let data = json!({"pages": [{"items": [{"id": 7}]}]});
        assert_eq!(
            resolve_value(&data, "pages[0].items[0].id"),
            Some(&json!(7))
        );
    }
}

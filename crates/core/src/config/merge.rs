//! Deep merging of JSON configuration values
//!
//! Objects merge key by key, arrays append, everything else is replaced by
//! the incoming value. Keys keep their first-seen position.

use serde_json::Value;

/// Merges `incoming` into `target`.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(incoming)) => {
            target.extend(incoming);
        }
        (target, incoming) => *target = incoming,
    }
}

/// Merges `incoming` into `target`, replacing arrays instead of appending.
///
/// Used for dependency maps and package scripts where re-running must be
/// idempotent.
pub fn merge_replacing_arrays(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_replacing_arrays(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_objects_merge_recursively() {
        let mut target = json!({"a": {"x": 1, "y": 2}, "b": true});
        deep_merge(&mut target, json!({"a": {"y": 3, "z": 4}, "c": "new"}));
        assert_eq!(
            target,
            json!({"a": {"x": 1, "y": 3, "z": 4}, "b": true, "c": "new"})
        );
    }

    #[test]
    fn test_arrays_append() {
        let mut target = json!({"ext": [".js"]});
        deep_merge(&mut target, json!({"ext": [".ts", ".tsx"]}));
        assert_eq!(target, json!({"ext": [".js", ".ts", ".tsx"]}));
    }

    #[test]
    fn test_scalars_and_mismatched_types_replace() {
        let mut target = json!({"mode": "development", "devtool": {"a": 1}});
        deep_merge(&mut target, json!({"mode": "production", "devtool": false}));
        assert_eq!(target, json!({"mode": "production", "devtool": false}));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let mut target = json!({"z": 1, "a": 1});
        deep_merge(&mut target, json!({"m": 1, "z": 2}));
        let keys: Vec<_> = target.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_replacing_arrays_variant() {
        let mut target = json!({"files": ["a"], "deps": {"x": "1"}});
        merge_replacing_arrays(&mut target, json!({"files": ["b"], "deps": {"y": "2"}}));
        assert_eq!(target, json!({"files": ["b"], "deps": {"x": "1", "y": "2"}}));
    }
}

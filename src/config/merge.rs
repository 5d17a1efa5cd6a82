//! Layer merging on `serde_json::Value` trees.
//!
//! Each configuration layer is serialized to a JSON object and folded over
//! the defaults. Arrays are replaced as a whole, never concatenated, so a
//! node list from the command line replaces the one from the file.

use serde_json::Value;

/// Deep merge `overlay` onto `base`; `overlay` wins on conflicts.
///
/// A null overlay value means "not specified" and keeps the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None if overlay_value.is_null() => continue,
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge `overlay` into `base` in place and return the top-level keys it set.
///
/// Keys are returned in the overlay's iteration order, which for
/// `serde_json::Map` is sorted by key.
pub fn merge_layer(base: &mut Value, overlay: Value) -> Vec<String> {
    let touched = match &overlay {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect(),
        _ => Vec::new(),
    };
    let current = std::mem::take(base);
    *base = deep_merge(current, overlay);
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overlay_replaces_scalars() {
        let base = json!({"backend": "etcd", "interval": 600});
        let overlay = json!({"interval": 30});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"backend": "etcd", "interval": 30})
        );
    }

    #[test]
    fn test_node_lists_are_replaced() {
        let base = json!({"nodes": ["10.0.0.1:4100", "10.0.0.2:4100"]});
        let overlay = json!({"nodes": ["10.0.0.9:4100"]});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"nodes": ["10.0.0.9:4100"]})
        );
    }

    #[test]
    fn test_null_keeps_base() {
        let base = json!({"client_cert": "/etc/ssl/client.pem", "prefix": "/"});
        let overlay = json!({"client_cert": null});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"client_cert": "/etc/ssl/client.pem", "prefix": "/"})
        );
    }

    #[test]
    fn test_nested_objects_merge_field_by_field() {
        let base = json!({"tls": {"cert": "a", "key": "b"}});
        let overlay = json!({"tls": {"key": "c"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"tls": {"cert": "a", "key": "c"}})
        );
    }

    #[test]
    fn test_merge_layer_reports_touched_keys() {
        let mut base = json!({"backend": "etcd", "prefix": "/", "quiet": false});
        let touched = merge_layer(
            &mut base,
            json!({"quiet": true, "backend": "consul", "debug": null}),
        );
        assert_eq!(touched, vec!["backend".to_string(), "quiet".to_string()]);
        assert_eq!(base, json!({"backend": "consul", "prefix": "/", "quiet": true}));
    }
}

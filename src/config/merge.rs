//! Field-by-field merging of configuration tiers.
//!
//! Higher tiers override lower ones key by key; arrays and scalars are
//! replaced whole.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// A null overlay means "not specified" and keeps the base value.
///
/// # Example
/// ```
/// use serde_json::json;
/// use task_publish::config::deep_merge;
///
/// let defaults = json!({ "sync": { "interval_minutes": 60, "startup_delay_ms": 2000 } });
/// let project = json!({ "sync": { "interval_minutes": 15 } });
/// let merged = deep_merge(defaults, project);
/// assert_eq!(merged["sync"]["interval_minutes"], 15);
/// assert_eq!(merged["sync"]["startup_delay_ms"], 2000);
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
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

/// Fold tiers from lowest to highest priority.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

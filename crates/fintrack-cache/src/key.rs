//! Canonical cache keys.

use serde_json::Value;

/// Build the cache key for an endpoint and its parameters.
///
/// Format is `<endpoint>|<k1>:<v1>|<k2>:<v2>` with keys sorted
/// lexicographically and values JSON-encoded, so two calls with the same
/// logical parameters collide regardless of property order. `None`, `null`
/// and an empty object all produce the bare endpoint. A non-object value is
/// appended as a single JSON segment.
pub fn cache_key(endpoint: &str, params: Option<&Value>) -> String {
    match params {
        None | Some(Value::Null) => endpoint.to_string(),
        Some(Value::Object(map)) => {
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut key = endpoint.to_string();
            for (name, value) in pairs {
                key.push('|');
                key.push_str(name);
                key.push(':');
                key.push_str(&value.to_string());
            }
            key
        }
        Some(other) => format!("{}|{}", endpoint, other),
    }
}

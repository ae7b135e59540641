//! Credential redaction for structured log fields.

use serde_json::{Map, Value};

/// Replacement written in place of a sensitive value.
pub(crate) const REDACTED: &str = "[REDACTED]";

const DENYLIST_KEYS: [&str; 9] = [
    "token",
    "access_token",
    "refresh_token",
    "accesstoken",
    "refreshtoken",
    "authorization",
    "cookie",
    "password",
    "secret",
];

/// Returns true when a field name suggests a credential.
pub(crate) fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    DENYLIST_KEYS
        .iter()
        .any(|denied| lower == *denied || lower.ends_with(&format!("_{denied}")))
}

/// Redact a field value by key name and by value shape.
pub(crate) fn redact_value(key: &str, value: &Value) -> Value {
    if is_sensitive_key(key) {
        return Value::String(REDACTED.to_string());
    }

    match value {
        Value::String(s) if looks_like_credential(s) => Value::String(REDACTED.to_string()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), redact_value(k, v));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| redact_value(key, item)).collect())
        }
        _ => value.clone(),
    }
}

fn looks_like_credential(raw: &str) -> bool {
    if raw.to_ascii_lowercase().starts_with("bearer ") {
        return true;
    }
    // JWT: three dot-separated segments
    raw.matches('.').count() == 2 && raw.len() > 40 && !raw.contains(' ')
}

//! Response shaping applied to every JSON payload before it leaves the
//! server: string bounding, the `ok` flag, and a `_ts` timestamp.

use serde_json::Value;

/// Longest string (in chars) a response may carry. Longer values are cut
/// to 279 chars plus a trailing ellipsis, so the result is exactly 280.
pub const MAX_STRING_LEN: usize = 280;

/// Finalize a handler result into the outgoing envelope.
///
/// Non-object values are wrapped under `data` so the envelope fields
/// always have somewhere to live.
pub fn finalize(value: Value) -> Value {
    let mut value = match value {
        Value::Object(_) => value,
        other => serde_json::json!({ "data": other }),
    };
    bound_strings(&mut value);
    if let Value::Object(map) = &mut value {
        map.entry("ok").or_insert(Value::Bool(true));
        map.insert(
            "_ts".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    value
}

/// Recursively truncate every string in the tree to `MAX_STRING_LEN` chars.
fn bound_strings(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.chars().count() > MAX_STRING_LEN {
                let mut cut: String = s.chars().take(MAX_STRING_LEN - 1).collect();
                cut.push('…');
                *s = cut;
            }
        }
        Value::Array(items) => {
            for item in items {
                bound_strings(item);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                bound_strings(item);
            }
        }
        _ => {}
    }
}

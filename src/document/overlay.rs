use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Merges a partial JSON body onto an existing value.
///
/// Objects merge key by key, recursively. Any other patch value, arrays and
/// null included, replaces what was there.
pub fn overlay_json(
    existing: &mut Value,
    patch: Value,
) {
    match (existing, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (k, v) in patch {
                match base.get_mut(&k) {
                    Some(slot) => overlay_json(slot, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

/// Applies `patch` on top of a typed document and decodes the result.
pub fn overlay_document<T>(
    existing: &T,
    patch: Value,
) -> std::result::Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut base = serde_json::to_value(existing)?;
    overlay_json(&mut base, patch);
    serde_json::from_value(base)
}

//! JSON Pointer resolution restricted to absolute in-document references.

use serde_json::Value;

use crate::error::ResolveError;

/// Split an absolute `#/a/b` reference into unescaped path segments.
pub fn segments(reference: &str) -> Result<Vec<String>, ResolveError> {
    let Some(pointer) = reference.strip_prefix('#') else {
        return Err(ResolveError::NotAbsolute(reference.to_string()));
    };
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(pointer) = pointer.strip_prefix('/') else {
        return Err(ResolveError::NotAbsolute(reference.to_string()));
    };
    Ok(pointer.split('/').map(unescape).collect())
}

/// RFC 6901 unescaping. `~1` is replaced before `~0` so `~01` stays `~1`.
pub fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// RFC 6901 escaping, the inverse of [`unescape`].
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Pointer to the component schema called `name`.
pub fn schema_pointer(name: &str) -> String {
    format!("#/components/schemas/{}", escape(name))
}

/// The last unescaped segment of a reference, if any.
pub fn last_segment(reference: &str) -> Result<Option<String>, ResolveError> {
    Ok(segments(reference)?.pop())
}

/// Walk `reference` from `root`. Pure; callers guard against cycles.
pub fn resolve<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, ResolveError> {
    let mut node = root;
    for segment in segments(reference)? {
        node = match node {
            Value::Object(map) => map.get(&segment).ok_or_else(|| ResolveError::NotFound {
                reference: reference.to_string(),
                segment: segment.clone(),
            })?,
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| ResolveError::TypeMismatch {
                    reference: reference.to_string(),
                    segment: segment.clone(),
                    found: "an array",
                })?;
                items.get(index).ok_or_else(|| ResolveError::NotFound {
                    reference: reference.to_string(),
                    segment: segment.clone(),
                })?
            }
            other => {
                return Err(ResolveError::TypeMismatch {
                    reference: reference.to_string(),
                    segment,
                    found: kind_of(other),
                });
            }
        };
    }
    Ok(node)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

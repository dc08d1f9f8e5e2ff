//! Dotted field paths.
//!
//! Nested objects flatten into `parent.child` keys. Arrays, scalars, nulls
//! and empty objects are leaves.

use portal_types::FieldMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DiffError, DiffResult};

/// Flatten a JSON object into a map of dotted paths to leaf values.
pub fn flatten(value: &Value) -> DiffResult<FieldMap> {
    let object = value
        .as_object()
        .ok_or_else(|| DiffError::NotAnObject(kind_name(value)))?;
    let mut out = FieldMap::new();
    flatten_into("", object, &mut out);
    Ok(out)
}

/// Serialize a typed entity and flatten it.
pub fn to_field_map<T: Serialize>(entity: &T) -> DiffResult<FieldMap> {
    flatten(&serde_json::to_value(entity)?)
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut FieldMap) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&path, inner, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild the nested JSON object described by a field map.
pub fn unflatten(fields: &FieldMap) -> DiffResult<Value> {
    let mut root = Map::new();
    for (path, value) in fields {
        let mut segments = path.split('.').peekable();
        let mut cursor = &mut root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if cursor.contains_key(segment) {
                    return Err(DiffError::PathCollision(path.clone()));
                }
                cursor.insert(segment.to_string(), value.clone());
                break;
            }
            let slot = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            cursor = match slot {
                Value::Object(inner) => inner,
                _ => return Err(DiffError::PathCollision(path.clone())),
            };
        }
    }
    Ok(Value::Object(root))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn flatten_nested_object() {
        let value = json!({
            "fullName": "Sarah O'Connor",
            "contactDetails": {
                "phone": "087-123-4567",
                "address": { "city": "Dublin" }
            }
        });
        let fields = flatten(&value).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["contactDetails.phone"], json!("087-123-4567"));
        assert_eq!(fields["contactDetails.address.city"], json!("Dublin"));
    }

    #[test]
    fn arrays_and_empty_objects_are_leaves() {
        let value = json!({ "roles": ["teacher"], "meta": {} });
        let fields = flatten(&value).unwrap();
        assert_eq!(fields["roles"], json!(["teacher"]));
        assert_eq!(fields["meta"], json!({}));
    }

    #[test]
    fn flatten_rejects_non_objects() {
        assert!(matches!(flatten(&json!(42)), Err(DiffError::NotAnObject("number"))));
    }

    #[test]
    fn unflatten_rebuilds_nesting() {
        let mut fields = FieldMap::new();
        fields.insert("contactDetails.phone".into(), json!("1"));
        fields.insert("contactDetails.email".into(), json!("a@b"));
        fields.insert("civilStatus".into(), json!("Married"));
        let value = unflatten(&fields).unwrap();
        assert_eq!(
            value,
            json!({
                "contactDetails": { "phone": "1", "email": "a@b" },
                "civilStatus": "Married"
            })
        );
    }

    #[test]
    fn unflatten_detects_collisions() {
        let mut fields = FieldMap::new();
        fields.insert("a".into(), json!(1));
        fields.insert("a.b".into(), json!(2));
        assert!(matches!(unflatten(&fields), Err(DiffError::PathCollision(_))));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z0-9 -]{0,12}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn unflatten_then_flatten_preserves_leaves(
            fields in prop::collection::btree_map("[a-z]{1,4}(\\.[a-z]{1,4}){0,2}", leaf(), 0..8)
        ) {
            // Generated paths may collide (`a` and `a.b`); only check the
            // maps that describe a valid tree.
            if let Ok(value) = unflatten(&fields) {
                prop_assert_eq!(flatten(&value).unwrap(), fields);
            }
        }
    }
}

//! Argument checking against the JSON-Schema subset tool specs declare:
//! `type`, `const`, `enum`, `required`, `properties`,
//! `additionalProperties: false`, and `items`.

use serde_json::Value;

/// Validate a tool's argument object against its declared schema.
pub fn validate_arguments(arguments: &Value, schema: &Value) -> Result<(), String> {
    validate_value(arguments, schema, "arguments")
}

/// Registration-time sanity check of a declared schema. Rejects shapes the
/// validator would choke on later, so bad specs fail at `register` rather
/// than at the first invocation.
pub fn check_schema(schema: &Value) -> Result<(), String> {
    check_schema_at(schema, "schema")
}

fn check_schema_at(schema: &Value, path: &str) -> Result<(), String> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| format!("{path} must be an object"))?;

    if let Some(type_spec) = schema_obj.get("type") {
        match type_spec {
            Value::String(name) => check_type_name(name, path)?,
            Value::Array(names) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| format!("{path}.type entries must be strings"))?;
                    check_type_name(name, path)?;
                }
            }
            _ => return Err(format!("{path}.type must be a string or array of strings")),
        }
    }

    if let Some(required) = schema_obj.get("required") {
        let entries = required
            .as_array()
            .ok_or_else(|| format!("{path}.required must be an array"))?;
        if entries.iter().any(|e| !e.is_string()) {
            return Err(format!("{path}.required entries must be strings"));
        }
    }

    if let Some(properties) = schema_obj.get("properties") {
        let properties = properties
            .as_object()
            .ok_or_else(|| format!("{path}.properties must be an object"))?;
        for (key, child) in properties {
            check_schema_at(child, &format!("{path}.{key}"))?;
        }
    }

    if let Some(items) = schema_obj.get("items") {
        check_schema_at(items, &format!("{path}.items"))?;
    }

    Ok(())
}

fn check_type_name(name: &str, path: &str) -> Result<(), String> {
    match name {
        "object" | "array" | "string" | "number" | "integer" | "boolean" | "null" => Ok(()),
        other => Err(format!("{path}.type names unknown type '{other}'")),
    }
}

fn validate_value(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| format!("schema at '{path}' must be an object"))?;

    if let Some(type_spec) = schema_obj.get("type") {
        validate_type(value, type_spec, path)?;
    }

    if let Some(constant) = schema_obj.get("const") {
        if value != constant {
            return Err(format!("{path} expected const {constant}"));
        }
    }

    if let Some(variants) = schema_obj.get("enum").and_then(|v| v.as_array()) {
        if !variants.iter().any(|candidate| candidate == value) {
            return Err(format!("{path} is not one of the allowed enum values"));
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(|v| v.as_array()) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{path} must be an object"))?;
        for key in required.iter().filter_map(|v| v.as_str()) {
            if !object.contains_key(key) {
                return Err(format!("{path} missing required field '{key}'"));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(|v| v.as_object()) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{path} must be an object"))?;
        for (key, property_schema) in properties {
            if let Some(child) = object.get(key) {
                validate_value(child, property_schema, &format!("{path}.{key}"))?;
            }
        }

        if schema_obj
            .get("additionalProperties")
            .and_then(|v| v.as_bool())
            == Some(false)
        {
            for key in object.keys() {
                if !properties.contains_key(key) {
                    return Err(format!("{path} contains unknown field '{key}'"));
                }
            }
        }
    }

    if let Some(item_schema) = schema_obj.get("items") {
        let array = value
            .as_array()
            .ok_or_else(|| format!("{path} must be an array"))?;
        for (idx, item) in array.iter().enumerate() {
            validate_value(item, item_schema, &format!("{path}[{idx}]"))?;
        }
    }

    Ok(())
}

fn validate_type(value: &Value, type_spec: &Value, path: &str) -> Result<(), String> {
    let matches = |t: &str, v: &Value| match t {
        "object" => v.is_object(),
        "array" => v.is_array(),
        "string" => v.is_string(),
        "number" => v.is_number(),
        "integer" => v.as_i64().is_some() || v.as_u64().is_some(),
        "boolean" => v.is_boolean(),
        "null" => v.is_null(),
        _ => false,
    };

    match type_spec {
        Value::String(type_name) => {
            if matches(type_name, value) {
                Ok(())
            } else {
                Err(format!("{path} expected type '{type_name}'"))
            }
        }
        Value::Array(types) => {
            if types
                .iter()
                .filter_map(|t| t.as_str())
                .any(|t| matches(t, value))
            {
                Ok(())
            } else {
                Err(format!("{path} did not match any allowed type"))
            }
        }
        _ => Err(format!("{path} schema.type must be string or array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_and_types() {
        let schema = json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "limit": {"type": "integer"}
            },
            "required": ["path"]
        });

        assert!(validate_arguments(&json!({"path": "/tmp/x"}), &schema).is_ok());
        assert!(validate_arguments(&json!({"path": "/tmp/x", "limit": 3}), &schema).is_ok());

        let err = validate_arguments(&json!({}), &schema).unwrap_err();
        assert!(err.contains("missing required field 'path'"));

        let err = validate_arguments(&json!({"path": 7}), &schema).unwrap_err();
        assert!(err.contains("expected type 'string'"));
    }

    #[test]
    fn test_enum_and_const() {
        let schema = json!({
            "type": "object",
            "properties": {
                "mode": {"enum": ["fast", "safe"]},
                "version": {"const": 2}
            }
        });

        assert!(validate_arguments(&json!({"mode": "fast", "version": 2}), &schema).is_ok());
        assert!(validate_arguments(&json!({"mode": "reckless"}), &schema).is_err());
        assert!(validate_arguments(&json!({"version": 3}), &schema).is_err());
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "additionalProperties": false
        });

        assert!(validate_arguments(&json!({"text": "ok"}), &schema).is_ok());
        let err = validate_arguments(&json!({"text": "ok", "extra": 1}), &schema).unwrap_err();
        assert!(err.contains("unknown field 'extra'"));
    }

    #[test]
    fn test_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });

        assert!(validate_arguments(&json!({"tags": ["a", "b"]}), &schema).is_ok());
        let err = validate_arguments(&json!({"tags": ["a", 4]}), &schema).unwrap_err();
        assert!(err.contains("tags[1]"));
    }

    #[test]
    fn test_union_types() {
        let schema = json!({
            "type": "object",
            "properties": {"id": {"type": ["string", "integer"]}}
        });

        assert!(validate_arguments(&json!({"id": "abc"}), &schema).is_ok());
        assert!(validate_arguments(&json!({"id": 42}), &schema).is_ok());
        assert!(validate_arguments(&json!({"id": true}), &schema).is_err());
    }

    #[test]
    fn test_check_schema_rejects_bad_shapes() {
        assert!(check_schema(&json!({"type": "object"})).is_ok());
        assert!(check_schema(&json!("not an object")).is_err());
        assert!(check_schema(&json!({"type": "objekt"})).is_err());
        assert!(check_schema(&json!({"type": "object", "required": "path"})).is_err());
        assert!(
            check_schema(&json!({
                "type": "object",
                "properties": {"x": {"type": "nope"}}
            }))
            .is_err()
        );
    }
}

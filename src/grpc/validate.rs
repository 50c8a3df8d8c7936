//! Structural validation of JSON requests
//!
//! Checks a candidate JSON value against a [`MessageSchema`] for unknown
//! fields and JSON type mismatches. No range, format or semantic checks.

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::schema::{FieldSchema, JsonKind, MessageSchema, NestedSchema, WellKnownType};

/// Outcome of [`validate_request_against_schema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }
}

/// Validate `candidate` against `schema`
pub fn validate_request_against_schema(candidate: &JsonValue, schema: &MessageSchema) -> ValidationResult {
    let mut errors = Vec::new();

    match candidate {
        JsonValue::Object(map) => validate_object(map, schema, "", &mut errors),
        _ => errors.push("Message must be an object".to_string()),
    }

    ValidationResult::from_errors(errors)
}

fn validate_object(map: &JsonMap<String, JsonValue>, schema: &MessageSchema, prefix: &str, errors: &mut Vec<String>) {
    // Free-form well-known objects accept any keys
    if matches!(
        schema.well_known,
        Some(WellKnownType::Struct | WellKnownType::Value | WellKnownType::Any)
    ) {
        return;
    }

    for (key, value) in map {
        let path = format!("{}{}", prefix, key);
        match schema.field(key) {
            Some(field) => validate_field(field, value, &path, errors),
            None => errors.push(format!("Unknown field: {}", path)),
        }
    }
}

fn validate_field(field: &FieldSchema, value: &JsonValue, path: &str, errors: &mut Vec<String>) {
    if value.is_null() {
        return;
    }

    if field.is_repeated() {
        let JsonValue::Array(items) = value else {
            errors.push(format!("Field '{}' must be an array", path));
            return;
        };
        for (index, item) in items.iter().enumerate() {
            if let Some(expected) = check_value(field, item, path, errors) {
                errors.push(format!(
                    "Field '{}' item {} expected {}, got {}",
                    path, index, expected, json_type_name(item)
                ));
            }
        }
    } else if let Some(expected) = check_value(field, value, path, errors) {
        errors.push(format!(
            "Field '{}' expected {}, got {}",
            path, expected, json_type_name(value)
        ));
    }
}

/// Returns the expected kind on a top-level mismatch. Nested message errors
/// are pushed directly.
fn check_value(field: &FieldSchema, value: &JsonValue, path: &str, errors: &mut Vec<String>) -> Option<&'static str> {
    let kind = field.descriptor.field_type.json_kind();

    let ok = match kind {
        JsonKind::Number => value.is_number(),
        JsonKind::Boolean => value.is_boolean(),
        JsonKind::String => value.is_string(),
        JsonKind::EnumString => value.is_string() || value.is_number(),
        JsonKind::Any => true,
        JsonKind::Object => return check_message(field, value, path, errors),
    };

    if ok { None } else { Some(kind.describe()) }
}

fn check_message(field: &FieldSchema, value: &JsonValue, path: &str, errors: &mut Vec<String>) -> Option<&'static str> {
    let nested = match &field.nested {
        Some(NestedSchema::Message(nested)) => nested,
        _ => return if value.is_object() { None } else { Some("object") },
    };

    if let Some(wkt) = nested.well_known {
        let expected = match wkt {
            WellKnownType::Value => return None,
            WellKnownType::ListValue => ("array", value.is_array()),
            _ => match wkt.json_kind() {
                Some(JsonKind::Number) => ("number", value.is_number()),
                Some(JsonKind::Boolean) => ("boolean", value.is_boolean()),
                Some(JsonKind::String) => ("string", value.is_string()),
                _ => ("object", value.is_object()),
            },
        };
        if !expected.1 {
            return Some(expected.0);
        }
        // Empty must stay empty
        if wkt != WellKnownType::Empty {
            return None;
        }
    }

    match value {
        JsonValue::Object(map) => {
            validate_object(map, nested, &format!("{}.", path), errors);
            None
        }
        _ => Some("object"),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

//! Example request generation
//!
//! Produces a deterministic example JSON value for a [`MessageSchema`], used
//! to pre-fill request bodies.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::descriptor::FieldType;
use super::schema::{
    FieldSchema, JsonKind, MessageSchema, NestedSchema, WellKnownType, DEFAULT_MAX_DEPTH,
};

/// Generate the example value for `schema`
///
/// Always an object. Nested message fields recurse while `max_depth` lasts
/// and become `{}` once it is exhausted. A well-known type used as the
/// request itself is laid out by its proto fields, `Any` as `{"@type": ""}`.
pub fn generate_template(schema: &MessageSchema, max_depth: usize) -> JsonValue {
    if schema.well_known == Some(WellKnownType::Any) {
        return well_known_placeholder(WellKnownType::Any, &schema.name);
    }

    let mut obj = JsonMap::new();
    for field in &schema.fields {
        let value = field_placeholder(field, max_depth);
        let value = if field.is_repeated() { json!([value]) } else { value };
        obj.insert(field.name().to_string(), value);
    }

    JsonValue::Object(obj)
}

/// Generate the example request for `schema` as compact JSON text
pub fn generate_request_template(schema: &MessageSchema, max_depth: Option<usize>) -> String {
    generate_template(schema, max_depth.unwrap_or(DEFAULT_MAX_DEPTH)).to_string()
}

fn field_placeholder(field: &FieldSchema, depth: usize) -> JsonValue {
    match field.descriptor.field_type.json_kind() {
        JsonKind::Number if field.descriptor.field_type.is_floating() => json!(0.0),
        JsonKind::Number => json!(0),
        JsonKind::Boolean => json!(false),
        JsonKind::String if field.descriptor.field_type == FieldType::Bytes => json!(""),
        JsonKind::String => json!(format!("<{}>", field.name())),
        JsonKind::EnumString => match &field.nested {
            Some(NestedSchema::Enum(e)) => json!(e.default_value_name()),
            _ => json!("UNKNOWN"),
        },
        JsonKind::Object => match &field.nested {
            Some(NestedSchema::Message(nested)) => match nested.well_known {
                Some(wkt) => well_known_placeholder(wkt, field.name()),
                None if depth == 0 => json!({}),
                None => generate_template(nested, depth - 1),
            },
            _ => json!({}),
        },
        JsonKind::Any => JsonValue::Null,
    }
}

fn well_known_placeholder(wkt: WellKnownType, field_name: &str) -> JsonValue {
    match wkt {
        WellKnownType::Timestamp => {
            json!(DateTime::<Utc>::UNIX_EPOCH.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        WellKnownType::Duration => json!("0s"),
        WellKnownType::Empty | WellKnownType::Struct => json!({}),
        WellKnownType::FieldMask => json!(""),
        WellKnownType::Value => JsonValue::Null,
        WellKnownType::ListValue => json!([]),
        WellKnownType::Any => json!({ "@type": "" }),
        WellKnownType::DoubleValue | WellKnownType::FloatValue => json!(0.0),
        WellKnownType::Int64Value
        | WellKnownType::UInt64Value
        | WellKnownType::Int32Value
        | WellKnownType::UInt32Value => json!(0),
        WellKnownType::BoolValue => json!(false),
        WellKnownType::StringValue => json!(format!("<{}>", field_name)),
        WellKnownType::BytesValue => json!(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::descriptor::{FieldDescriptor, Label};
    use crate::grpc::schema::{EnumSchema, EnumValue};
    use std::sync::Arc;

    fn field(name: &str, field_type: FieldType, label: Label, nested: Option<NestedSchema>) -> FieldSchema {
        FieldSchema {
            descriptor: FieldDescriptor {
                name: name.to_string(),
                json_name: name.to_string(),
                number: 1,
                field_type,
                label,
                type_name: None,
                oneof_index: None,
            },
            nested,
        }
    }

    fn message(name: &str, fields: Vec<FieldSchema>) -> MessageSchema {
        MessageSchema {
            name: name.to_string(),
            full_name: format!("test.{}", name),
            fields,
            well_known: None,
        }
    }

    #[test]
    fn test_hello_request_template() {
        let schema = message("HelloRequest", vec![
            field("name", FieldType::String, Label::Optional, None),
            field("age", FieldType::Int32, Label::Optional, None),
        ]);

        assert_eq!(generate_request_template(&schema, None), r#"{"name":"<name>","age":0}"#);
    }

    #[test]
    fn test_scalar_placeholders() {
        let schema = message("Scalars", vec![
            field("ratio", FieldType::Double, Label::Optional, None),
            field("count", FieldType::Uint64, Label::Optional, None),
            field("enabled", FieldType::Bool, Label::Optional, None),
            field("blob", FieldType::Bytes, Label::Optional, None),
            field("tags", FieldType::String, Label::Repeated, None),
        ]);

        let value = generate_template(&schema, DEFAULT_MAX_DEPTH);
        assert_eq!(value["ratio"], json!(0.0));
        assert!(value["ratio"].is_f64());
        assert_eq!(value["count"], json!(0));
        assert_eq!(value["enabled"], json!(false));
        assert_eq!(value["blob"], json!(""));
        assert_eq!(value["tags"], json!(["<tags>"]));
    }

    #[test]
    fn test_enum_placeholder() {
        let color = Arc::new(EnumSchema {
            name: "Color".to_string(),
            full_name: "test.Color".to_string(),
            values: vec![
                EnumValue { name: "RED".to_string(), number: 0 },
                EnumValue { name: "BLUE".to_string(), number: 1 },
            ],
        });
        let empty = Arc::new(EnumSchema {
            name: "Nothing".to_string(),
            full_name: "test.Nothing".to_string(),
            values: Vec::new(),
        });
        let schema = message("Paint", vec![
            field("color", FieldType::Enum, Label::Optional, Some(NestedSchema::Enum(color))),
            field("nothing", FieldType::Enum, Label::Optional, Some(NestedSchema::Enum(empty))),
        ]);

        let value = generate_template(&schema, DEFAULT_MAX_DEPTH);
        assert_eq!(value, json!({"color": "RED", "nothing": "UNKNOWN"}));
    }

    #[test]
    fn test_well_known_fields() {
        let wkt = |w| Some(NestedSchema::Message(Arc::new(MessageSchema::well_known(w))));
        let schema = message("Event", vec![
            field("at", FieldType::Message, Label::Optional, wkt(WellKnownType::Timestamp)),
            field("ttl", FieldType::Message, Label::Optional, wkt(WellKnownType::Duration)),
            field("nothing", FieldType::Message, Label::Optional, wkt(WellKnownType::Empty)),
            field("nick", FieldType::Message, Label::Optional, wkt(WellKnownType::StringValue)),
        ]);

        let value = generate_template(&schema, DEFAULT_MAX_DEPTH);
        assert_eq!(value["at"], json!("1970-01-01T00:00:00Z"));
        assert_eq!(value["ttl"], json!("0s"));
        assert_eq!(value["nothing"], json!({}));
        assert_eq!(value["nick"], json!("<nick>"));
    }

    #[test]
    fn test_well_known_request_is_an_object() {
        let template = |w| generate_template(&MessageSchema::well_known(w), DEFAULT_MAX_DEPTH);

        assert_eq!(template(WellKnownType::Timestamp), json!({"seconds": 0, "nanos": 0}));
        assert_eq!(template(WellKnownType::Empty), json!({}));
        assert_eq!(template(WellKnownType::FieldMask), json!({"paths": ["<paths>"]}));
        assert_eq!(template(WellKnownType::ListValue), json!({"values": [null]}));
        assert_eq!(template(WellKnownType::Any), json!({"@type": ""}));
        assert_eq!(template(WellKnownType::StringValue), json!({"value": "<value>"}));
        assert_eq!(template(WellKnownType::DoubleValue), json!({"value": 0.0}));
    }

    #[test]
    fn test_depth_exhaustion_emits_empty_object() {
        let inner = Arc::new(message("Inner", vec![
            field("id", FieldType::Int64, Label::Optional, None),
        ]));
        let schema = message("Outer", vec![
            field("inner", FieldType::Message, Label::Optional, Some(NestedSchema::Message(inner))),
            field("opaque", FieldType::Message, Label::Optional, Some(NestedSchema::Opaque)),
        ]);

        assert_eq!(generate_template(&schema, 1), json!({"inner": {"id": 0}, "opaque": {}}));
        assert_eq!(generate_template(&schema, 0), json!({"inner": {}, "opaque": {}}));
    }

    #[test]
    fn test_deterministic() {
        let schema = message("HelloRequest", vec![
            field("name", FieldType::String, Label::Optional, None),
        ]);
        assert_eq!(
            generate_request_template(&schema, Some(2)),
            generate_request_template(&schema, Some(2))
        );
    }
}

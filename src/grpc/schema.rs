//! Schema resolution
//!
//! Promotes raw descriptors from the [`TypeIndex`] into public
//! [`MessageSchema`] / [`EnumSchema`] values, resolving message and enum
//! field references.
//!
//! Recursion through message fields is bounded by a depth budget only.
//! There is no visited set: a self-referential message is expanded until the
//! budget runs out and the remaining references become
//! [`NestedSchema::Opaque`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::SchemaCache;
use super::descriptor::{EnumDescriptor, FieldDescriptor, FieldType, Label};
use super::index::{normalize_type_name, TypeIndex};

/// Default depth budget for schema resolution and template generation
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// JSON shape a protobuf field type maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Number,
    Boolean,
    String,
    Object,
    EnumString,
    /// Unrecognized type code; any JSON value is accepted
    Any,
}

impl JsonKind {
    pub fn describe(&self) -> &'static str {
        match self {
            JsonKind::Number => "number",
            JsonKind::Boolean => "boolean",
            JsonKind::String => "string",
            JsonKind::Object => "object",
            JsonKind::EnumString => "enum",
            JsonKind::Any => "any",
        }
    }
}

impl FieldType {
    pub fn json_kind(&self) -> JsonKind {
        match self {
            FieldType::Double
            | FieldType::Float
            | FieldType::Int64
            | FieldType::Uint64
            | FieldType::Int32
            | FieldType::Fixed64
            | FieldType::Fixed32
            | FieldType::Uint32
            | FieldType::Sfixed32
            | FieldType::Sfixed64
            | FieldType::Sint32
            | FieldType::Sint64 => JsonKind::Number,
            FieldType::Bool => JsonKind::Boolean,
            FieldType::String | FieldType::Bytes => JsonKind::String,
            FieldType::Group | FieldType::Message => JsonKind::Object,
            FieldType::Enum => JsonKind::EnumString,
            FieldType::Unknown(_) => JsonKind::Any,
        }
    }
}

/// `google.protobuf` types with a conventional JSON rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownType {
    Timestamp,
    Duration,
    Empty,
    FieldMask,
    Struct,
    Value,
    ListValue,
    Any,
    DoubleValue,
    FloatValue,
    Int64Value,
    UInt64Value,
    Int32Value,
    UInt32Value,
    BoolValue,
    StringValue,
    BytesValue,
}

impl WellKnownType {
    pub const ALL: [WellKnownType; 17] = [
        WellKnownType::Timestamp,
        WellKnownType::Duration,
        WellKnownType::Empty,
        WellKnownType::FieldMask,
        WellKnownType::Struct,
        WellKnownType::Value,
        WellKnownType::ListValue,
        WellKnownType::Any,
        WellKnownType::DoubleValue,
        WellKnownType::FloatValue,
        WellKnownType::Int64Value,
        WellKnownType::UInt64Value,
        WellKnownType::Int32Value,
        WellKnownType::UInt32Value,
        WellKnownType::BoolValue,
        WellKnownType::StringValue,
        WellKnownType::BytesValue,
    ];

    pub fn from_name(full_name: &str) -> Option<Self> {
        let short = normalize_type_name(full_name).strip_prefix("google.protobuf.")?;
        let wkt = match short {
            "Timestamp" => WellKnownType::Timestamp,
            "Duration" => WellKnownType::Duration,
            "Empty" => WellKnownType::Empty,
            "FieldMask" => WellKnownType::FieldMask,
            "Struct" => WellKnownType::Struct,
            "Value" => WellKnownType::Value,
            "ListValue" => WellKnownType::ListValue,
            "Any" => WellKnownType::Any,
            "DoubleValue" => WellKnownType::DoubleValue,
            "FloatValue" => WellKnownType::FloatValue,
            "Int64Value" => WellKnownType::Int64Value,
            "UInt64Value" => WellKnownType::UInt64Value,
            "Int32Value" => WellKnownType::Int32Value,
            "UInt32Value" => WellKnownType::UInt32Value,
            "BoolValue" => WellKnownType::BoolValue,
            "StringValue" => WellKnownType::StringValue,
            "BytesValue" => WellKnownType::BytesValue,
            _ => return None,
        };
        Some(wkt)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            WellKnownType::Timestamp => "Timestamp",
            WellKnownType::Duration => "Duration",
            WellKnownType::Empty => "Empty",
            WellKnownType::FieldMask => "FieldMask",
            WellKnownType::Struct => "Struct",
            WellKnownType::Value => "Value",
            WellKnownType::ListValue => "ListValue",
            WellKnownType::Any => "Any",
            WellKnownType::DoubleValue => "DoubleValue",
            WellKnownType::FloatValue => "FloatValue",
            WellKnownType::Int64Value => "Int64Value",
            WellKnownType::UInt64Value => "UInt64Value",
            WellKnownType::Int32Value => "Int32Value",
            WellKnownType::UInt32Value => "UInt32Value",
            WellKnownType::BoolValue => "BoolValue",
            WellKnownType::StringValue => "StringValue",
            WellKnownType::BytesValue => "BytesValue",
        }
    }

    /// JSON shape of the type's canonical rendering, `None` for `Value` (anything goes)
    pub fn json_kind(&self) -> Option<JsonKind> {
        match self {
            WellKnownType::Timestamp
            | WellKnownType::Duration
            | WellKnownType::FieldMask
            | WellKnownType::StringValue
            | WellKnownType::BytesValue => Some(JsonKind::String),
            WellKnownType::DoubleValue
            | WellKnownType::FloatValue
            | WellKnownType::Int64Value
            | WellKnownType::UInt64Value
            | WellKnownType::Int32Value
            | WellKnownType::UInt32Value => Some(JsonKind::Number),
            WellKnownType::BoolValue => Some(JsonKind::Boolean),
            WellKnownType::Empty | WellKnownType::Struct | WellKnownType::Any => {
                Some(JsonKind::Object)
            }
            WellKnownType::ListValue | WellKnownType::Value => None,
        }
    }

    /// Fields of the underlying `google.protobuf` message
    ///
    /// `Struct`, `Value` and `Any` are free-form in JSON and carry none.
    fn proto_fields(&self) -> Vec<FieldSchema> {
        let wrapped = |field_type| vec![wkt_field("value", 1, field_type, Label::Optional, None)];

        match self {
            WellKnownType::Timestamp | WellKnownType::Duration => vec![
                wkt_field("seconds", 1, FieldType::Int64, Label::Optional, None),
                wkt_field("nanos", 2, FieldType::Int32, Label::Optional, None),
            ],
            WellKnownType::FieldMask => {
                vec![wkt_field("paths", 1, FieldType::String, Label::Repeated, None)]
            }
            WellKnownType::ListValue => vec![wkt_field(
                "values",
                1,
                FieldType::Message,
                Label::Repeated,
                Some(WellKnownType::Value),
            )],
            WellKnownType::Empty
            | WellKnownType::Struct
            | WellKnownType::Value
            | WellKnownType::Any => Vec::new(),
            WellKnownType::DoubleValue => wrapped(FieldType::Double),
            WellKnownType::FloatValue => wrapped(FieldType::Float),
            WellKnownType::Int64Value => wrapped(FieldType::Int64),
            WellKnownType::UInt64Value => wrapped(FieldType::Uint64),
            WellKnownType::Int32Value => wrapped(FieldType::Int32),
            WellKnownType::UInt32Value => wrapped(FieldType::Uint32),
            WellKnownType::BoolValue => wrapped(FieldType::Bool),
            WellKnownType::StringValue => wrapped(FieldType::String),
            WellKnownType::BytesValue => wrapped(FieldType::Bytes),
        }
    }
}

fn wkt_field(
    name: &str,
    number: i32,
    field_type: FieldType,
    label: Label,
    message: Option<WellKnownType>,
) -> FieldSchema {
    FieldSchema {
        descriptor: FieldDescriptor {
            name: name.to_string(),
            json_name: name.to_string(),
            number,
            field_type,
            label,
            type_name: message.map(|wkt| format!(".google.protobuf.{}", wkt.short_name())),
            oneof_index: None,
        },
        nested: message.map(|wkt| NestedSchema::Message(Arc::new(MessageSchema::well_known(wkt)))),
    }
}

/// A resolved message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSchema {
    pub name: String,
    pub full_name: String,
    pub fields: Vec<FieldSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub well_known: Option<WellKnownType>,
}

impl MessageSchema {
    /// Synthetic schema for a well-known type
    pub fn well_known(wkt: WellKnownType) -> Self {
        Self {
            name: wkt.short_name().to_string(),
            full_name: format!("google.protobuf.{}", wkt.short_name()),
            fields: wkt.proto_fields(),
            well_known: Some(wkt),
        }
    }

    /// Find a field by proto name or JSON name
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.descriptor.name == key)
            .or_else(|| self.fields.iter().find(|f| f.descriptor.json_name == key))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.descriptor.name.as_str()).collect()
    }
}

/// A message field together with its resolved type reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedSchema>,
}

impl FieldSchema {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn is_repeated(&self) -> bool {
        self.descriptor.is_repeated()
    }
}

/// What a message/enum field reference resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NestedSchema {
    Message(Arc<MessageSchema>),
    Enum(Arc<EnumSchema>),
    /// Depth budget exhausted or the referenced type is not indexed
    Opaque,
}

/// A resolved enum type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumSchema {
    pub name: String,
    pub full_name: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

impl EnumSchema {
    fn from_descriptor(full_name: &str, descriptor: &EnumDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            full_name: full_name.to_string(),
            values: descriptor
                .values
                .iter()
                .map(|(name, number)| EnumValue { name: name.clone(), number: *number })
                .collect(),
        }
    }

    /// Name of the first declared value, `"UNKNOWN"` when there are none
    pub fn default_value_name(&self) -> &str {
        self.values.first().map(|v| v.name.as_str()).unwrap_or("UNKNOWN")
    }
}

/// Either kind of resolved schema
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSchema {
    Message(Arc<MessageSchema>),
    Enum(Arc<EnumSchema>),
}

/// Resolves type names against a [`TypeIndex`], memoizing into a [`SchemaCache`]
pub struct SchemaResolver<'a> {
    index: &'a TypeIndex,
    cache: &'a SchemaCache,
    max_depth: usize,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(index: &'a TypeIndex, cache: &'a SchemaCache) -> Self {
        Self { index, cache, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve a fully-qualified name to a message or enum schema
    pub fn resolve(&self, full_name: &str) -> Option<ResolvedSchema> {
        self.resolve_message(full_name)
            .map(ResolvedSchema::Message)
            .or_else(|| self.resolve_enum(full_name).map(ResolvedSchema::Enum))
    }

    /// Resolve a message with the full depth budget and cache the result
    pub fn resolve_message(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        let name = normalize_type_name(full_name);

        if let Some(wkt) = WellKnownType::from_name(name) {
            return Some(Arc::new(MessageSchema::well_known(wkt)));
        }
        if let Some(cached) = self.cache.message(name) {
            return Some(cached);
        }

        self.rebuild_message(name)
    }

    /// Resolve a message from the current index, replacing any cached schema
    pub fn rebuild_message(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        let name = normalize_type_name(full_name);

        if let Some(wkt) = WellKnownType::from_name(name) {
            return Some(Arc::new(MessageSchema::well_known(wkt)));
        }

        let schema = self.build_message(name, self.max_depth)?;
        self.cache.insert_message(Arc::clone(&schema));
        Some(schema)
    }

    pub fn resolve_enum(&self, full_name: &str) -> Option<Arc<EnumSchema>> {
        let name = normalize_type_name(full_name);

        if let Some(cached) = self.cache.enum_schema(name) {
            return Some(cached);
        }

        let descriptor = self.index.enum_type(name)?;
        let schema = Arc::new(EnumSchema::from_descriptor(name, &descriptor));
        self.cache.insert_enum(Arc::clone(&schema));
        Some(schema)
    }

    fn build_message(&self, name: &str, depth: usize) -> Option<Arc<MessageSchema>> {
        if let Some(wkt) = WellKnownType::from_name(name) {
            return Some(Arc::new(MessageSchema::well_known(wkt)));
        }

        let descriptor = self.index.message(name)?;
        let fields = descriptor
            .fields
            .iter()
            .map(|field| FieldSchema {
                descriptor: field.clone(),
                nested: self.nested_for(field, depth),
            })
            .collect();

        Some(Arc::new(MessageSchema {
            name: descriptor.name.clone(),
            full_name: name.to_string(),
            fields,
            well_known: None,
        }))
    }

    fn nested_for(&self, field: &FieldDescriptor, depth: usize) -> Option<NestedSchema> {
        let kind = field.field_type.json_kind();
        if kind != JsonKind::Object && kind != JsonKind::EnumString {
            return None;
        }

        let Some(type_name) = field.type_name.as_deref() else {
            return Some(NestedSchema::Opaque);
        };

        let nested = if kind == JsonKind::EnumString {
            self.resolve_enum(type_name).map(NestedSchema::Enum)
        } else if let Some(wkt) = WellKnownType::from_name(type_name) {
            Some(NestedSchema::Message(Arc::new(MessageSchema::well_known(wkt))))
        } else if depth <= 1 {
            return Some(NestedSchema::Opaque);
        } else {
            self.build_message(normalize_type_name(type_name), depth - 1)
                .map(NestedSchema::Message)
        };

        Some(nested.unwrap_or_else(|| {
            debug!(field = %field.name, type_name = %type_name, "Unresolved type reference");
            NestedSchema::Opaque
        }))
    }
}

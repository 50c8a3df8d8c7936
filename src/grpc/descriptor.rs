//! FileDescriptorProto decoding
//!
//! Walks the raw bytes of a `FileDescriptorProto` with [`WireDecoder`] and
//! extracts the parts needed for discovery: package, messages (with nested
//! types and fields), enums and services. Field numbers that are not
//! recognized at a given nesting level are skipped, never rejected.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::codec::{WireDecoder, WireType, RECURSION_LIMIT};
use crate::errors::{ReflectError, WireError};

/// `FieldDescriptorProto.Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
    Unknown(i32),
}

impl FieldType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FieldType::Double,
            2 => FieldType::Float,
            3 => FieldType::Int64,
            4 => FieldType::Uint64,
            5 => FieldType::Int32,
            6 => FieldType::Fixed64,
            7 => FieldType::Fixed32,
            8 => FieldType::Bool,
            9 => FieldType::String,
            10 => FieldType::Group,
            11 => FieldType::Message,
            12 => FieldType::Bytes,
            13 => FieldType::Uint32,
            14 => FieldType::Enum,
            15 => FieldType::Sfixed32,
            16 => FieldType::Sfixed64,
            17 => FieldType::Sint32,
            18 => FieldType::Sint64,
            other => FieldType::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            FieldType::Double => 1,
            FieldType::Float => 2,
            FieldType::Int64 => 3,
            FieldType::Uint64 => 4,
            FieldType::Int32 => 5,
            FieldType::Fixed64 => 6,
            FieldType::Fixed32 => 7,
            FieldType::Bool => 8,
            FieldType::String => 9,
            FieldType::Group => 10,
            FieldType::Message => 11,
            FieldType::Bytes => 12,
            FieldType::Uint32 => 13,
            FieldType::Enum => 14,
            FieldType::Sfixed32 => 15,
            FieldType::Sfixed64 => 16,
            FieldType::Sint32 => 17,
            FieldType::Sint64 => 18,
            FieldType::Unknown(code) => *code,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, FieldType::Double | FieldType::Float)
    }

    /// Proto source spelling of the type
    pub fn proto_name(&self) -> &'static str {
        match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Group => "group",
            FieldType::Message => "message",
            FieldType::Bytes => "bytes",
            FieldType::Uint32 => "uint32",
            FieldType::Enum => "enum",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Sint32 => "sint32",
            FieldType::Sint64 => "sint64",
            FieldType::Unknown(_) => "unknown",
        }
    }
}

/// `FieldDescriptorProto.Label`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

impl Label {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Label::Required,
            3 => Label::Repeated,
            _ => Label::Optional,
        }
    }
}

/// A single message field as found in the descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub json_name: String,
    pub number: i32,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: Label,
    pub type_name: Option<String>,
    pub oneof_index: Option<i32>,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
}

/// A decoded `DescriptorProto`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub nested_types: Vec<MessageDescriptor>,
    pub enum_types: Vec<EnumDescriptor>,
}

/// A decoded `EnumDescriptorProto`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumDescriptor {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

/// A decoded `MethodDescriptorProto`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

/// A decoded `ServiceDescriptorProto`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

/// A decoded `FileDescriptorProto`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescriptor {
    pub name: String,
    pub package: String,
    pub dependencies: Vec<String>,
    pub message_types: Vec<MessageDescriptor>,
    pub enum_types: Vec<EnumDescriptor>,
    pub services: Vec<ServiceDescriptor>,
    pub syntax: Option<String>,
}

impl FileDescriptor {
    /// Decode a `FileDescriptorProto` from its raw (already base64-decoded) bytes
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self, ReflectError> {
        decode_file(bytes.into()).map_err(|e| {
            ReflectError::MalformedDescriptor(format!("FileDescriptorProto: {}", e))
        })
    }
}

/// Read an embedded message, attaching context to any failure inside it
fn sub_message<T>(
    decoder: &mut WireDecoder,
    what: &str,
    parse: impl FnOnce(Bytes) -> Result<T, DecodeFailure>,
) -> Result<T, DecodeFailure> {
    let bytes = decoder.read_length_delimited().map_err(|e| DecodeFailure::at(what, e))?;
    parse(bytes).map_err(|e| e.within(what))
}

/// Internal failure carrying the nesting path it happened in
#[derive(Debug)]
struct DecodeFailure {
    path: Vec<String>,
    error: WireError,
}

impl DecodeFailure {
    fn at(what: &str, error: WireError) -> Self {
        Self { path: vec![what.to_string()], error }
    }

    fn within(mut self, what: &str) -> Self {
        self.path.insert(0, what.to_string());
        self
    }
}

impl From<WireError> for DecodeFailure {
    fn from(error: WireError) -> Self {
        Self { path: Vec::new(), error }
    }
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{} (in {})", self.error, self.path.join(" > "))
        }
    }
}

fn decode_file(bytes: Bytes) -> Result<FileDescriptor, DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut file = FileDescriptor::default();

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => file.name = decoder.read_string()?,
            (2, WireType::LengthDelimited) => file.package = decoder.read_string()?,
            (3, WireType::LengthDelimited) => file.dependencies.push(decoder.read_string()?),
            (4, WireType::LengthDelimited) => {
                file.message_types.push(sub_message(&mut decoder, "message_type", |b| decode_message(b, 1))?)
            }
            (5, WireType::LengthDelimited) => {
                file.enum_types.push(sub_message(&mut decoder, "enum_type", decode_enum)?)
            }
            (6, WireType::LengthDelimited) => {
                file.services.push(sub_message(&mut decoder, "service", decode_service)?)
            }
            (12, WireType::LengthDelimited) => file.syntax = Some(decoder.read_string()?),
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok(file)
}

/// `depth` counts enclosing messages, so `nested_type` chains stay bounded
fn decode_message(bytes: Bytes, depth: usize) -> Result<MessageDescriptor, DecodeFailure> {
    if depth > RECURSION_LIMIT {
        return Err(WireError::RecursionLimitExceeded(RECURSION_LIMIT).into());
    }

    let mut decoder = WireDecoder::new(bytes);
    let mut message = MessageDescriptor::default();

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => message.name = decoder.read_string()?,
            (2, WireType::LengthDelimited) => {
                message.fields.push(sub_message(&mut decoder, "field", decode_field)?)
            }
            (3, WireType::LengthDelimited) => {
                message
                    .nested_types
                    .push(sub_message(&mut decoder, "nested_type", |b| decode_message(b, depth + 1))?)
            }
            (4, WireType::LengthDelimited) => {
                message.enum_types.push(sub_message(&mut decoder, "enum_type", decode_enum)?)
            }
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok(message)
}

fn decode_field(bytes: Bytes) -> Result<FieldDescriptor, DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut name = String::new();
    let mut json_name = None;
    let mut number = 0;
    let mut label = Label::Optional;
    let mut field_type = FieldType::Unknown(0);
    let mut type_name = None;
    let mut oneof_index = None;

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => name = decoder.read_string()?,
            (3, WireType::Varint) => number = decoder.read_int32()?,
            (4, WireType::Varint) => label = Label::from_code(decoder.read_int32()?),
            (5, WireType::Varint) => field_type = FieldType::from_code(decoder.read_int32()?),
            (6, WireType::LengthDelimited) => type_name = Some(decoder.read_string()?),
            (9, WireType::Varint) => oneof_index = Some(decoder.read_int32()?),
            (10, WireType::LengthDelimited) => json_name = Some(decoder.read_string()?),
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    let json_name = json_name.unwrap_or_else(|| to_json_name(&name));

    Ok(FieldDescriptor {
        name,
        json_name,
        number,
        field_type,
        label,
        type_name,
        oneof_index,
    })
}

fn decode_enum(bytes: Bytes) -> Result<EnumDescriptor, DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut descriptor = EnumDescriptor::default();

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => descriptor.name = decoder.read_string()?,
            (2, WireType::LengthDelimited) => {
                descriptor.values.push(sub_message(&mut decoder, "value", decode_enum_value)?)
            }
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok(descriptor)
}

fn decode_enum_value(bytes: Bytes) -> Result<(String, i32), DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut name = String::new();
    let mut number = 0;

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => name = decoder.read_string()?,
            (2, WireType::Varint) => number = decoder.read_int32()?,
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok((name, number))
}

fn decode_service(bytes: Bytes) -> Result<ServiceDescriptor, DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut service = ServiceDescriptor::default();

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => service.name = decoder.read_string()?,
            (2, WireType::LengthDelimited) => {
                service.methods.push(sub_message(&mut decoder, "method", decode_method)?)
            }
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok(service)
}

fn decode_method(bytes: Bytes) -> Result<MethodDescriptor, DecodeFailure> {
    let mut decoder = WireDecoder::new(bytes);
    let mut method = MethodDescriptor::default();

    while decoder.has_remaining() {
        let (field, wire_type) = decoder.read_tag()?;
        match (field, wire_type) {
            (1, WireType::LengthDelimited) => method.name = decoder.read_string()?,
            (2, WireType::LengthDelimited) => method.input_type = decoder.read_string()?,
            (3, WireType::LengthDelimited) => method.output_type = decoder.read_string()?,
            // 4 is MethodOptions when length-delimited; some encoders put the
            // client streaming flag there as a varint.
            (4, WireType::Varint) | (5, WireType::Varint) => {
                method.client_streaming = decoder.read_bool()?
            }
            (6, WireType::Varint) => method.server_streaming = decoder.read_bool()?,
            (field, wire_type) => decoder.skip_field(field, wire_type)?,
        }
    }

    Ok(method)
}

/// lowerCamelCase conversion used by protoc for `json_name`
pub fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}

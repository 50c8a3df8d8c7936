//! Common test utilities for quicpulse-reflect integration tests
//!
//! This module provides shared test infrastructure including:
//! - Descriptor fixtures built with prost-types
//! - Connect reflection response bodies
//! - wiremock helpers for the reflection endpoint

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GREET_SERVICE: &str = "greet.v1.GreetService";

/// Install a test subscriber once; `RUST_LOG` controls the output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Descriptor fixtures
// =============================================================================

pub fn scalar_field(name: &str, number: i32, field_type: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(field_type as i32),
        ..Default::default()
    }
}

pub fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar_field(name, number, Type::Message)
    }
}

pub fn enum_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar_field(name, number, Type::Enum)
    }
}

pub fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

pub fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

pub fn rpc(name: &str, input: &str, output: &str, client_streaming: bool, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

/// `greet/v1/greet.proto`: GreetService with a unary and a bidi method
pub fn greet_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("greet/v1/greet.proto".to_string()),
        package: Some("greet.v1".to_string()),
        dependency: vec!["google/protobuf/timestamp.proto".to_string()],
        message_type: vec![
            message("HelloRequest", vec![
                scalar_field("name", 1, Type::String),
                scalar_field("age", 2, Type::Int32),
            ]),
            message("HelloReply", vec![
                scalar_field("message", 1, Type::String),
                message_field("sent_at", 2, ".google.protobuf.Timestamp"),
                enum_field("mood", 3, ".greet.v1.Mood"),
            ]),
        ],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Mood".to_string()),
            value: vec![
                EnumValueDescriptorProto { name: Some("MOOD_UNSPECIFIED".to_string()), number: Some(0), ..Default::default() },
                EnumValueDescriptorProto { name: Some("MOOD_HAPPY".to_string()), number: Some(1), ..Default::default() },
            ],
            ..Default::default()
        }],
        service: vec![ServiceDescriptorProto {
            name: Some("GreetService".to_string()),
            method: vec![
                rpc("SayHello", ".greet.v1.HelloRequest", ".greet.v1.HelloReply", false, false),
                rpc("Chat", ".greet.v1.HelloRequest", ".greet.v1.HelloReply", true, true),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// `tree/v1/tree.proto`: a self-referential message
pub fn tree_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("tree/v1/tree.proto".to_string()),
        package: Some("tree.v1".to_string()),
        message_type: vec![message("Node", vec![
            scalar_field("value", 1, Type::String),
            repeated(message_field("children", 2, ".tree.v1.Node")),
        ])],
        service: vec![ServiceDescriptorProto {
            name: Some("TreeService".to_string()),
            method: vec![rpc("Walk", ".tree.v1.Node", ".tree.v1.Node", false, true)],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

pub fn encode(file: &FileDescriptorProto) -> Vec<u8> {
    file.encode_to_vec()
}

// =============================================================================
// Connect reflection bodies
// =============================================================================

pub fn list_services_body(services: &[&str]) -> Value {
    let service: Vec<Value> = services.iter().map(|name| json!({ "name": name })).collect();
    json!({ "listServicesResponse": { "service": service } })
}

pub fn file_descriptor_body(files: &[FileDescriptorProto]) -> Value {
    let encoded: Vec<String> = files.iter().map(|f| STANDARD.encode(encode(f))).collect();
    json!({ "fileDescriptorResponse": { "fileDescriptorProto": encoded } })
}

pub fn raw_descriptor_body(bytes: &[u8]) -> Value {
    json!({ "fileDescriptorResponse": { "fileDescriptorProto": [STANDARD.encode(bytes)] } })
}

pub fn error_body(code: i32, message: &str) -> Value {
    json!({ "errorResponse": { "errorCode": code, "errorMessage": message } })
}

// =============================================================================
// wiremock helpers
// =============================================================================

/// `/grpc.reflection.{version}.ServerReflection/ServerReflectionInfo`
pub fn reflection_path(version: &str) -> String {
    format!("/grpc.reflection.{}.ServerReflection/ServerReflectionInfo", version)
}

/// Answer `request` under `version` with a 200 JSON `response`
pub async fn mount_reflection(server: &MockServer, version: &str, request: Value, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(reflection_path(version)))
        .and(body_json(request))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Serve the greet fixture completely under `version`
pub async fn mount_greet_server(server: &MockServer, version: &str) {
    mount_reflection(
        server,
        version,
        json!({ "listServices": "" }),
        ResponseTemplate::new(200).set_body_json(list_services_body(&[
            GREET_SERVICE,
            "grpc.reflection.v1.ServerReflection",
            "grpc.reflection.v1alpha.ServerReflection",
        ])),
    )
    .await;

    mount_reflection(
        server,
        version,
        json!({ "fileContainingSymbol": GREET_SERVICE }),
        ResponseTemplate::new(200).set_body_json(file_descriptor_body(&[greet_file()])),
    )
    .await;
}

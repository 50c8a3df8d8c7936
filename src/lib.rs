//! QuicPulse reflection library
//!
//! Discovers the services of a gRPC server through the reflection service
//! (carried over Connect-protocol JSON) and resolves their descriptors into
//! schemas for building and checking request payloads.
//!
//! # Module Organization
//!
//! - [`grpc`] - Wire decoding, descriptors, schema resolution and the reflection client
//! - [`config`] - Client configuration (ReflectionConfig)
//! - [`errors`] - Error types (ReflectError, WireError, Result)
//!
//! # Example
//!
//! ```no_run
//! use quicpulse_reflect::{generate_request_template, ReflectionClient, ReflectionConfig};
//!
//! # async fn run() -> quicpulse_reflect::Result<()> {
//! let client = ReflectionClient::new(ReflectionConfig::default())?;
//! let result = client.discover_services("http://localhost:8080", None).await;
//!
//! for service in result.services() {
//!     for method in &service.methods {
//!         if let Some(schema) = &method.input_schema {
//!             println!("{} {}", method.path(), generate_request_template(schema, None));
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod grpc;

pub use config::ReflectionConfig;
pub use errors::{ReflectError, Result, WireError};
pub use grpc::{
    generate_request_template, validate_request_against_schema, EnumSchema, MessageSchema, MethodInfo,
    ReflectionClient, ReflectionResult, ReflectionVersion, ServiceInfo, ValidationResult,
};

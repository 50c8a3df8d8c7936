//! gRPC reflection module
//!
//! Discovers services through the server reflection service and turns the
//! returned descriptors into schemas that drive request templates and
//! validation.

pub mod cache;
pub mod codec;
pub mod descriptor;
pub mod index;
pub mod reflection;
pub mod schema;
pub mod template;
pub mod transport;
pub mod validate;

pub use cache::SchemaCache;
pub use descriptor::{FieldDescriptor, FieldType, FileDescriptor, Label};
pub use index::TypeIndex;
pub use reflection::{MethodInfo, ReflectionClient, ReflectionResult, ServiceInfo};
pub use schema::{
    EnumSchema, EnumValue, FieldSchema, MessageSchema, NestedSchema, SchemaResolver, WellKnownType,
    DEFAULT_MAX_DEPTH,
};
pub use template::{generate_request_template, generate_template};
pub use transport::{ReflectionVersion, REFLECTION_SERVICE_V1, REFLECTION_SERVICE_V1ALPHA};
pub use validate::{validate_request_against_schema, ValidationResult};

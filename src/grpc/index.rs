//! Fully-qualified type index
//!
//! Maps names such as `greet.v1.HelloRequest` to the raw descriptors decoded
//! from reflection responses. Names are stored without the leading dot that
//! descriptor type references carry; lookups accept either form.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::descriptor::{
    EnumDescriptor, FileDescriptor, MessageDescriptor, ServiceDescriptor,
};

/// Strip the leading `.` of a descriptor type reference
pub fn normalize_type_name(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

/// Concurrent index of every message, enum and service seen so far
#[derive(Debug, Default)]
pub struct TypeIndex {
    messages: DashMap<String, Arc<MessageDescriptor>>,
    enums: DashMap<String, Arc<EnumDescriptor>>,
    services: DashMap<String, Arc<ServiceDescriptor>>,
    files: DashMap<String, Arc<FileDescriptor>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every definition found in a file. Existing names are overwritten.
    ///
    /// Returns `true` when a message or enum already indexed under the same
    /// name was replaced by a different definition, so schemas built from
    /// the old one are stale.
    pub fn register_file(&self, file: FileDescriptor) -> bool {
        let prefix = file.package.clone();
        let mut replaced = false;

        for message in &file.message_types {
            replaced |= self.register_message(&prefix, message);
        }
        for enum_type in &file.enum_types {
            replaced |= self.register_enum(&prefix, enum_type);
        }
        for service in &file.services {
            let full_name = qualify(&prefix, &service.name);
            self.services.insert(full_name, Arc::new(service.clone()));
        }

        debug!(
            file = %file.name,
            package = %file.package,
            messages = file.message_types.len(),
            services = file.services.len(),
            "Registered file descriptor"
        );
        self.files.insert(file.name.clone(), Arc::new(file));
        replaced
    }

    fn register_message(&self, scope: &str, message: &MessageDescriptor) -> bool {
        let full_name = qualify(scope, &message.name);
        let mut replaced = false;

        for nested in &message.nested_types {
            replaced |= self.register_message(&full_name, nested);
        }
        for enum_type in &message.enum_types {
            replaced |= self.register_enum(&full_name, enum_type);
        }

        match self.messages.insert(full_name.clone(), Arc::new(message.clone())) {
            Some(previous) if previous.fields != message.fields => {
                debug!(name = %full_name, "Conflicting message definition replaced");
                true
            }
            _ => replaced,
        }
    }

    fn register_enum(&self, scope: &str, enum_type: &EnumDescriptor) -> bool {
        let full_name = qualify(scope, &enum_type.name);
        match self.enums.insert(full_name.clone(), Arc::new(enum_type.clone())) {
            Some(previous) if previous.values != enum_type.values => {
                debug!(name = %full_name, "Conflicting enum definition replaced");
                true
            }
            _ => false,
        }
    }

    pub fn message(&self, name: &str) -> Option<Arc<MessageDescriptor>> {
        self.messages.get(normalize_type_name(name)).map(|m| m.value().clone())
    }

    pub fn enum_type(&self, name: &str) -> Option<Arc<EnumDescriptor>> {
        self.enums.get(normalize_type_name(name)).map(|e| e.value().clone())
    }

    pub fn service(&self, name: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services.get(normalize_type_name(name)).map(|s| s.value().clone())
    }

    pub fn has_file(&self, file_name: &str) -> bool {
        self.files.contains_key(file_name)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&self) {
        self.messages.clear();
        self.enums.clear();
        self.services.clear();
        self.files.clear();
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

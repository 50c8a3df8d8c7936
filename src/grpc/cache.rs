//! Resolved schema cache
//!
//! Memoizes [`MessageSchema`] / [`EnumSchema`] values by fully-qualified
//! name. Entries live until [`SchemaCache::clear`]; there is no eviction.

use std::sync::Arc;

use dashmap::DashMap;

use super::index::normalize_type_name;
use super::schema::{EnumSchema, MessageSchema};

/// Concurrent map of resolved schemas (last write wins)
#[derive(Debug, Default)]
pub struct SchemaCache {
    messages: DashMap<String, Arc<MessageSchema>>,
    enums: DashMap<String, Arc<EnumSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        self.messages
            .get(normalize_type_name(full_name))
            .map(|entry| entry.value().clone())
    }

    pub fn enum_schema(&self, full_name: &str) -> Option<Arc<EnumSchema>> {
        self.enums
            .get(normalize_type_name(full_name))
            .map(|entry| entry.value().clone())
    }

    pub fn insert_message(&self, schema: Arc<MessageSchema>) {
        self.messages.insert(schema.full_name.clone(), schema);
    }

    pub fn insert_enum(&self, schema: Arc<EnumSchema>) {
        self.enums.insert(schema.full_name.clone(), schema);
    }

    pub fn len(&self) -> usize {
        self.messages.len() + self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.clear();
        self.enums.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::schema::EnumValue;

    fn message(full_name: &str) -> Arc<MessageSchema> {
        Arc::new(MessageSchema {
            name: full_name.rsplit('.').next().unwrap_or(full_name).to_string(),
            full_name: full_name.to_string(),
            fields: Vec::new(),
            well_known: None,
        })
    }

    #[test]
    fn test_lookup_accepts_leading_dot() {
        let cache = SchemaCache::new();
        cache.insert_message(message("greet.v1.HelloRequest"));

        assert!(cache.message("greet.v1.HelloRequest").is_some());
        assert!(cache.message(".greet.v1.HelloRequest").is_some());
        assert!(cache.message("greet.v1.Other").is_none());
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = SchemaCache::new();
        cache.insert_message(message("a.B"));
        cache.insert_enum(Arc::new(EnumSchema {
            name: "Color".to_string(),
            full_name: "a.Color".to_string(),
            values: vec![EnumValue { name: "RED".to_string(), number: 0 }],
        }));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.enum_schema("a.Color").is_none());
    }

    #[test]
    fn test_overwrite_is_idempotent() {
        let cache = SchemaCache::new();
        cache.insert_message(message("a.B"));
        cache.insert_message(message("a.B"));
        assert_eq!(cache.len(), 1);
    }
}

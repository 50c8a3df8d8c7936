//! gRPC reflection support
//!
//! This module provides the reflection client that discovers the services
//! and methods of a server, decodes their descriptors and resolves request
//! schemas.
//!
//! Discovery runs entirely against one reflection version. If anything
//! fails under `v1`, the whole discovery is retried once under `v1alpha`
//! before the failure is reported.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::SchemaCache;
use super::descriptor::{FileDescriptor, MethodDescriptor};
use super::index::{normalize_type_name, TypeIndex};
use super::schema::{EnumSchema, MessageSchema, SchemaResolver};
use super::transport::{is_reflection_service, ConnectTransport, ReflectionVersion};
use crate::config::ReflectionConfig;
use crate::errors::ReflectError;

/// Service discovered through reflection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub full_name: String,
    pub methods: Vec<MethodInfo>,
}

impl ServiceInfo {
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Format for display
    pub fn format_display(&self) -> String {
        let mut output = format!("service {} {{\n", self.full_name);

        for method in &self.methods {
            output.push_str(&format!(
                "  rpc {}({}{}) returns ({}{});\n",
                method.name,
                if method.client_streaming { "stream " } else { "" },
                method.input_type,
                if method.server_streaming { "stream " } else { "" },
                method.output_type
            ));
        }

        output.push_str("}\n");
        output
    }
}

/// Method of a discovered service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub name: String,
    pub full_name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    #[serde(rename = "inputMessageSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Arc<MessageSchema>>,
}

impl MethodInfo {
    fn from_descriptor(service_full_name: &str, method: &MethodDescriptor) -> Self {
        Self {
            name: method.name.clone(),
            full_name: format!("{}.{}", service_full_name, method.name),
            input_type: normalize_type_name(&method.input_type).to_string(),
            output_type: normalize_type_name(&method.output_type).to_string(),
            client_streaming: method.client_streaming,
            server_streaming: method.server_streaming,
            input_schema: None,
        }
    }

    /// Get the method path used for calls (`/pkg.Service/Method`)
    pub fn path(&self) -> String {
        match self.full_name.rsplit_once('.') {
            Some((service, method)) => format!("/{}/{}", service, method),
            None => format!("/{}", self.full_name),
        }
    }

    /// Check if this is a unary call (no streaming)
    pub fn is_unary(&self) -> bool {
        !self.client_streaming && !self.server_streaming
    }

    /// Check if this is bidirectional streaming
    pub fn is_bidi_streaming(&self) -> bool {
        self.client_streaming && self.server_streaming
    }
}

/// Outcome of one [`ReflectionClient::discover_services`] call
///
/// Either successful with the complete service list, or failed with an
/// error and no services.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionResult {
    success: bool,
    services: Vec<ServiceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    server_url: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reflection_version: Option<ReflectionVersion>,
}

impl ReflectionResult {
    pub fn succeeded(server_url: &str, services: Vec<ServiceInfo>, version: ReflectionVersion) -> Self {
        Self {
            success: true,
            services,
            error: None,
            server_url: server_url.to_string(),
            timestamp: Utc::now(),
            reflection_version: Some(version),
        }
    }

    pub fn failed(server_url: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            services: Vec::new(),
            error: Some(error.into()),
            server_url: server_url.to_string(),
            timestamp: Utc::now(),
            reflection_version: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    pub fn into_services(self) -> Vec<ServiceInfo> {
        self.services
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Version the discovery succeeded with
    pub fn reflection_version(&self) -> Option<ReflectionVersion> {
        self.reflection_version
    }

    pub fn service(&self, full_name: &str) -> Option<&ServiceInfo> {
        self.services.iter().find(|s| s.full_name == full_name)
    }
}

/// Reflection client for service discovery
///
/// Owns the type index and schema cache, which persist across discoveries
/// until [`ReflectionClient::clear_reflection_cache`]. Clones share them.
/// Input schemas are rebuilt on every discovery, and the cache is emptied
/// whenever a server redefines a type already indexed.
#[derive(Debug, Clone)]
pub struct ReflectionClient {
    transport: ConnectTransport,
    config: ReflectionConfig,
    index: Arc<TypeIndex>,
    cache: Arc<SchemaCache>,
}

impl ReflectionClient {
    /// Create a new reflection client
    pub fn new(config: ReflectionConfig) -> Result<Self, ReflectError> {
        let transport = ConnectTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_http_client(client: reqwest::Client, config: ReflectionConfig) -> Self {
        Self::with_transport(ConnectTransport::from_client(client), config)
    }

    fn with_transport(transport: ConnectTransport, config: ReflectionConfig) -> Self {
        Self {
            transport,
            config,
            index: Arc::new(TypeIndex::new()),
            cache: Arc::new(SchemaCache::new()),
        }
    }

    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    /// Discover every service of the server at `server_url`
    ///
    /// Never fails: errors are reported through [`ReflectionResult::error`].
    pub async fn discover_services(&self, server_url: &str, timeout: Option<Duration>) -> ReflectionResult {
        let timeout = timeout.unwrap_or(self.config.timeout);
        info!(server = %server_url, timeout_ms = timeout.as_millis() as u64, "Discovering services");

        let mut failures = Vec::new();
        for version in ReflectionVersion::ALL {
            match self.discover_with_version(server_url, version, timeout).await {
                Ok(services) => {
                    info!(server = %server_url, version = %version, services = services.len(), "Discovery complete");
                    return ReflectionResult::succeeded(server_url, services, version);
                }
                Err(err) => {
                    warn!(server = %server_url, version = %version, error = %err, "Reflection discovery failed");
                    if version == ReflectionVersion::V1 {
                        info!(server = %server_url, "Retrying discovery with v1alpha");
                    }
                    failures.push(err);
                }
            }
        }

        ReflectionResult::failed(server_url, failure_reason(failures))
    }

    async fn discover_with_version(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        timeout: Duration,
    ) -> Result<Vec<ServiceInfo>, ReflectError> {
        let service_names: Vec<String> = self
            .transport
            .list_services(server_url, version, timeout)
            .await?
            .into_iter()
            .filter(|name| !is_reflection_service(name))
            .collect();
        debug!(services = ?service_names, "Listed services");

        for name in &service_names {
            let files = self
                .transport
                .file_descriptor_for(server_url, version, name, timeout)
                .await?;
            let missing = self.register_files(files)?;
            self.fetch_dependencies(server_url, version, missing, timeout).await?;
        }

        let resolver = self.resolver();
        service_names
            .iter()
            .map(|name| self.service_info(name, &resolver))
            .collect()
    }

    /// Decode and index files, returning imports not yet indexed
    ///
    /// Cached schemas are dropped when a file redefines a known type.
    fn register_files(&self, files: Vec<Bytes>) -> Result<Vec<String>, ReflectError> {
        let mut dependencies = Vec::new();
        let mut replaced = false;

        for bytes in files {
            let file = FileDescriptor::decode(bytes)?;
            dependencies.extend(file.dependencies.iter().cloned());
            replaced |= self.index.register_file(file);
        }

        if replaced && !self.cache.is_empty() {
            debug!(schemas = self.cache.len(), "Type definitions changed; clearing schema cache");
            self.cache.clear();
        }

        dependencies.retain(|dep| !dep.starts_with("google/protobuf/") && !self.index.has_file(dep));
        Ok(dependencies)
    }

    /// Fetch imports the server did not send along
    ///
    /// Fetch failures are logged and leave the affected types unresolved. A
    /// file that arrives but does not decode fails the discovery.
    async fn fetch_dependencies(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        missing: Vec<String>,
        timeout: Duration,
    ) -> Result<(), ReflectError> {
        let mut requested: HashSet<String> = missing.iter().cloned().collect();
        let mut queue: VecDeque<String> = missing.into();

        while let Some(filename) = queue.pop_front() {
            if self.index.has_file(&filename) {
                continue;
            }

            let files = match self
                .transport
                .file_by_filename(server_url, version, &filename, timeout)
                .await
            {
                Ok(files) => files,
                Err(err) => {
                    warn!(file = %filename, error = %err, "Could not fetch dependency; its types stay unresolved");
                    continue;
                }
            };

            for dep in self.register_files(files)? {
                if requested.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }

        Ok(())
    }

    fn service_info(&self, name: &str, resolver: &SchemaResolver<'_>) -> Result<ServiceInfo, ReflectError> {
        let descriptor = self.index.service(name).ok_or_else(|| {
            ReflectError::UnexpectedResponse(format!("no descriptor defines service '{}'", name))
        })?;

        let full_name = normalize_type_name(name).to_string();
        let methods = descriptor
            .methods
            .iter()
            .map(|method| {
                let mut info = MethodInfo::from_descriptor(&full_name, method);
                info.input_schema = resolver.rebuild_message(&info.input_type);
                info
            })
            .collect();

        Ok(ServiceInfo {
            name: descriptor.name.clone(),
            full_name,
            methods,
        })
    }

    fn resolver(&self) -> SchemaResolver<'_> {
        SchemaResolver::new(&self.index, &self.cache).with_max_depth(self.config.max_depth)
    }

    /// Resolve any indexed message by name, e.g. a method's output type
    pub fn resolve_message_schema(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        self.resolver().resolve_message(full_name)
    }

    pub fn resolve_output_schema(&self, method: &MethodInfo) -> Option<Arc<MessageSchema>> {
        self.resolve_message_schema(&method.output_type)
    }

    pub fn get_cached_message_schema(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        self.cache.message(full_name)
    }

    pub fn get_cached_enum_schema(&self, full_name: &str) -> Option<Arc<EnumSchema>> {
        self.cache.enum_schema(full_name)
    }

    /// Drop every indexed descriptor and cached schema
    pub fn clear_reflection_cache(&self) {
        self.index.clear();
        self.cache.clear();
        debug!("Reflection cache cleared");
    }
}

/// Prefer a server-reported reflection error over transport noise from the other version
fn failure_reason(failures: Vec<ReflectError>) -> String {
    let application = failures
        .iter()
        .position(|e| matches!(e, ReflectError::Application { .. }));

    let chosen = match application {
        Some(pos) => failures.into_iter().nth(pos),
        None => failures.into_iter().last(),
    };

    chosen
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Reflection discovery failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, client: bool, server: bool) -> MethodInfo {
        MethodInfo {
            name: name.to_string(),
            full_name: format!("chat.v1.ChatService.{}", name),
            input_type: "chat.v1.Message".to_string(),
            output_type: "chat.v1.Message".to_string(),
            client_streaming: client,
            server_streaming: server,
            input_schema: None,
        }
    }

    #[test]
    fn test_method_path() {
        assert_eq!(method("Send", false, false).path(), "/chat.v1.ChatService/Send");
    }

    #[test]
    fn test_streaming_kinds() {
        assert!(method("Send", false, false).is_unary());
        assert!(method("Chat", true, true).is_bidi_streaming());
        assert!(!method("Watch", false, true).is_unary());
    }

    #[test]
    fn test_service_format() {
        let service = ServiceInfo {
            name: "ChatService".to_string(),
            full_name: "chat.v1.ChatService".to_string(),
            methods: vec![method("Send", false, false), method("Chat", true, true)],
        };

        let output = service.format_display();
        assert!(output.contains("service chat.v1.ChatService"));
        assert!(output.contains("rpc Send(chat.v1.Message) returns (chat.v1.Message);"));
        assert!(output.contains("rpc Chat(stream chat.v1.Message) returns (stream chat.v1.Message);"));
    }

    #[test]
    fn test_failed_result_has_no_services() {
        let result = ReflectionResult::failed("http://localhost:1", "boom");
        assert!(!result.success());
        assert!(result.services().is_empty());
        assert_eq!(result.error(), Some("boom"));
        assert!(result.reflection_version().is_none());
    }

    #[test]
    fn test_succeeded_result() {
        let result = ReflectionResult::succeeded("http://localhost:1", Vec::new(), ReflectionVersion::V1Alpha);
        assert!(result.success());
        assert!(result.error().is_none());
        assert_eq!(result.reflection_version(), Some(ReflectionVersion::V1Alpha));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["serverUrl"], "http://localhost:1");
        assert_eq!(json["reflectionVersion"], "v1alpha");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_reason_prefers_application_error() {
        let reason = failure_reason(vec![
            ReflectError::Application { code: 12, message: "reflection disabled".to_string() },
            ReflectError::HttpStatus { status: 404, body: "not found".to_string() },
        ]);
        assert_eq!(reason, "reflection disabled");

        let reason = failure_reason(vec![
            ReflectError::Timeout(100),
            ReflectError::HttpStatus { status: 503, body: "unavailable".to_string() },
        ]);
        assert_eq!(reason, "HTTP 503: unavailable");
    }
}

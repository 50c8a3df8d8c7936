//! Reflection transport over the Connect protocol
//!
//! Reflection RPCs are carried as plain HTTP POSTs with the Connect JSON
//! encoding:
//!
//! ```text
//! POST {server}/grpc.reflection.v1.ServerReflection/ServerReflectionInfo
//! {"listServices": ""}
//! ```
//!
//! Failures are classified as transport errors (network, HTTP status,
//! timeout) or reflection application errors (`errorResponse`).

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::ReflectError;

/// Standard gRPC reflection service names
pub const REFLECTION_SERVICE_V1: &str = "grpc.reflection.v1.ServerReflection";
pub const REFLECTION_SERVICE_V1ALPHA: &str = "grpc.reflection.v1alpha.ServerReflection";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Reflection protocol version, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionVersion {
    V1,
    V1Alpha,
}

impl ReflectionVersion {
    pub const ALL: [ReflectionVersion; 2] = [ReflectionVersion::V1, ReflectionVersion::V1Alpha];

    pub fn service_name(&self) -> &'static str {
        match self {
            ReflectionVersion::V1 => REFLECTION_SERVICE_V1,
            ReflectionVersion::V1Alpha => REFLECTION_SERVICE_V1ALPHA,
        }
    }
}

impl std::fmt::Display for ReflectionVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReflectionVersion::V1 => write!(f, "v1"),
            ReflectionVersion::V1Alpha => write!(f, "v1alpha"),
        }
    }
}

/// True for either reflection service name
pub fn is_reflection_service(name: &str) -> bool {
    name == REFLECTION_SERVICE_V1 || name == REFLECTION_SERVICE_V1ALPHA
}

/// `ServerReflectionRequest` in Connect JSON form
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ReflectionRequest<'a> {
    ListServices(&'a str),
    FileContainingSymbol(&'a str),
    FileByFilename(&'a str),
}

impl ReflectionRequest<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ReflectionRequest::ListServices(_) => "listServices",
            ReflectionRequest::FileContainingSymbol(_) => "fileContainingSymbol",
            ReflectionRequest::FileByFilename(_) => "fileByFilename",
        }
    }
}

/// `ServerReflectionResponse` in Connect JSON form
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReflectionResponse {
    list_services_response: Option<ListServiceResponse>,
    file_descriptor_response: Option<FileDescriptorResponse>,
    error_response: Option<ErrorResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ListServiceResponse {
    #[serde(default)]
    service: Vec<ServiceResponse>,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDescriptorResponse {
    #[serde(default)]
    file_descriptor_proto: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_code: i32,
    #[serde(default)]
    error_message: String,
}

/// Connect error body sent with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ConnectError {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client issuing reflection RPCs
#[derive(Debug, Clone)]
pub struct ConnectTransport {
    client: Client,
}

impl ConnectTransport {
    /// Build a transport with its own HTTP client
    pub fn new(user_agent: &str) -> Result<Self, ReflectError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing HTTP client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// List the fully-qualified names of every service the server exposes
    pub async fn list_services(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        timeout: Duration,
    ) -> Result<Vec<String>, ReflectError> {
        let response = self
            .call(server_url, version, ReflectionRequest::ListServices(""), timeout)
            .await?;

        let list = response.list_services_response.ok_or_else(|| {
            ReflectError::UnexpectedResponse("missing listServicesResponse".to_string())
        })?;

        Ok(list.service.into_iter().map(|s| s.name).collect())
    }

    /// Fetch the raw `FileDescriptorProto`s for the file defining `symbol`
    pub async fn file_descriptor_for(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        symbol: &str,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, ReflectError> {
        let response = self
            .call(server_url, version, ReflectionRequest::FileContainingSymbol(symbol), timeout)
            .await?;
        decode_file_descriptors(response)
    }

    /// Fetch the raw `FileDescriptorProto`s for a file by its path
    pub async fn file_by_filename(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        filename: &str,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, ReflectError> {
        let response = self
            .call(server_url, version, ReflectionRequest::FileByFilename(filename), timeout)
            .await?;
        decode_file_descriptors(response)
    }

    async fn call(
        &self,
        server_url: &str,
        version: ReflectionVersion,
        request: ReflectionRequest<'_>,
        timeout: Duration,
    ) -> Result<ReflectionResponse, ReflectError> {
        let endpoint = endpoint_url(server_url, version)?;
        debug!(%endpoint, version = %version, kind = request.kind(), "Sending reflection request");

        let timeout_ms = timeout.as_millis() as u64;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ReflectError::Timeout(timeout_ms)
            } else {
                ReflectError::Request(e)
            }
        };

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        let body = response.text().await.map_err(map_err)?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Reflection request rejected");
            let body = serde_json::from_str::<ConnectError>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(ReflectError::HttpStatus { status: status.as_u16(), body });
        }

        let response: ReflectionResponse = serde_json::from_str(&body)
            .map_err(|e| ReflectError::UnexpectedResponse(format!("invalid JSON body: {}", e)))?;

        if let Some(err) = response.error_response {
            return Err(ReflectError::Application {
                code: err.error_code,
                message: err.error_message,
            });
        }

        Ok(response)
    }
}

/// `{server}/{reflection service}/ServerReflectionInfo`
pub fn endpoint_url(server_url: &str, version: ReflectionVersion) -> Result<String, ReflectError> {
    Url::parse(server_url).map_err(|source| ReflectError::InvalidUrl {
        url: server_url.to_string(),
        source,
    })?;

    Ok(format!(
        "{}/{}/ServerReflectionInfo",
        server_url.trim_end_matches('/'),
        version.service_name()
    ))
}

fn decode_file_descriptors(response: ReflectionResponse) -> Result<Vec<Bytes>, ReflectError> {
    let files = response.file_descriptor_response.ok_or_else(|| {
        ReflectError::UnexpectedResponse("missing fileDescriptorResponse".to_string())
    })?;

    files
        .file_descriptor_proto
        .iter()
        .map(|encoded| decode_base64(encoded).map(Bytes::from))
        .collect()
}

/// Protobuf JSON accepts both the standard and URL-safe alphabets, padded or not
fn decode_base64(encoded: &str) -> Result<Vec<u8>, ReflectError> {
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
        .ok_or_else(|| {
            ReflectError::MalformedDescriptor("fileDescriptorProto is not valid base64".to_string())
        })
}

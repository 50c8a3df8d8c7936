//! Error types for quicpulse-reflect

use thiserror::Error;

/// Failures while reading protobuf wire-format bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Malformed varint")]
    MalformedVarint,

    #[error("Truncated message: needed {needed} bytes, {remaining} remaining")]
    TruncatedMessage { needed: usize, remaining: usize },

    #[error("Invalid wire type {0}")]
    InvalidWireType(u32),

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Unexpected end-group tag")]
    UnexpectedEndGroup,

    #[error("Nesting deeper than {0} levels")]
    RecursionLimitExceeded(usize),
}

/// Main error type for reflection discovery
#[derive(Error, Debug)]
pub enum ReflectError {
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Reflection-level failure reported through `errorResponse`.
    /// Displays the server's message verbatim.
    #[error("{message}")]
    Application { code: i32, message: String },

    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Unexpected reflection response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl ReflectError {
    /// Network failure, non-2xx status or timeout
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ReflectError::Timeout(_) | ReflectError::HttpStatus { .. } | ReflectError::Request(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReflectError::Timeout(_))
    }
}

impl From<WireError> for ReflectError {
    fn from(err: WireError) -> Self {
        ReflectError::MalformedDescriptor(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReflectError>;

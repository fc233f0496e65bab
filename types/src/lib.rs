use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable identifier carried in the `error` field of every error response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedContentType,
    MissingBoundary,
    NoFilePart,
    PayloadTooLarge,
    MalformedMultipart,
    MethodNotAllowed,
    UpstreamUnreachable,
    UpstreamTimeout,
    UpstreamHttpError,
    UpstreamInvalidJson,
    StagingFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedContentType => "unsupported_content_type",
            ErrorKind::MissingBoundary => "missing_boundary",
            ErrorKind::NoFilePart => "no_file_part",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::MalformedMultipart => "malformed_multipart",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::UpstreamUnreachable => "upstream_unreachable",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamHttpError => "upstream_http_error",
            ErrorKind::UpstreamInvalidJson => "upstream_invalid_json",
            ErrorKind::StagingFailed => "staging_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every non-2xx response produced by the relay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
    /// Upstream HTTP status, when the failure came from the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Bounded excerpt of the upstream response text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            status: None,
            details: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

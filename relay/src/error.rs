use factcheck_relay_types::{ErrorBody, ErrorKind};
use http::{Method, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("Expected a multipart/form-data request, got {content_type:?}")]
    UnsupportedContentType { content_type: Option<String> },

    #[error("Multipart request has no boundary parameter")]
    MissingBoundary,

    #[error("No file uploaded")]
    NoFilePart,

    /// The one decoder error answered with 413 instead of 400.
    #[error("{message}")]
    PayloadTooLarge { message: String },

    #[error("Invalid multipart body: {0}")]
    MalformedMultipart(String),

    #[error("Could not stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Webhook unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Webhook did not answer within {0:?}")]
    UpstreamTimeout(std::time::Duration),

    #[error("Webhook failed with status {status}")]
    UpstreamHttpError { status: StatusCode, details: String },

    #[error("Invalid JSON response from webhook: {reason}")]
    UpstreamInvalidJson { reason: String, details: String },
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            RelayError::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            RelayError::MissingBoundary => ErrorKind::MissingBoundary,
            RelayError::NoFilePart => ErrorKind::NoFilePart,
            RelayError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            RelayError::MalformedMultipart(_) => ErrorKind::MalformedMultipart,
            RelayError::Staging(_) => ErrorKind::StagingFailed,
            RelayError::UpstreamUnreachable(_) => ErrorKind::UpstreamUnreachable,
            RelayError::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            RelayError::UpstreamHttpError { .. } => ErrorKind::UpstreamHttpError,
            RelayError::UpstreamInvalidJson { .. } => ErrorKind::UpstreamInvalidJson,
        }
    }

    /// Status returned to the caller. `passthrough` relays non-2xx webhook statuses as-is.
    pub fn status_code(&self, passthrough: bool) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::UnsupportedContentType { .. }
            | RelayError::MissingBoundary
            | RelayError::NoFilePart
            | RelayError::MalformedMultipart(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            RelayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamHttpError { status, .. } if passthrough => *status,
            RelayError::UpstreamHttpError { .. } | RelayError::UpstreamInvalidJson { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.kind(), self.to_string());
        match self {
            RelayError::UpstreamHttpError { status, details } => {
                body.status = Some(status.as_u16());
                body.details = Some(details.clone());
            }
            RelayError::UpstreamInvalidJson { details, .. } => {
                body.details = Some(details.clone());
            }
            _ => {}
        }
        body
    }

    /// Decoder and validation failures, as opposed to webhook or staging failures.
    pub fn is_client_error(&self) -> bool {
        self.status_code(false).is_client_error()
    }
}

impl From<multer::Error> for RelayError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::NoMultipart => RelayError::UnsupportedContentType { content_type: None },
            multer::Error::NoBoundary => RelayError::MissingBoundary,
            multer::Error::StreamSizeExceeded { limit } => RelayError::PayloadTooLarge {
                message: format!("Request body exceeds {limit} bytes"),
            },
            multer::Error::FieldSizeExceeded { limit, field_name } => RelayError::PayloadTooLarge {
                message: format!(
                    "Field {} exceeds {limit} bytes",
                    field_name.as_deref().unwrap_or("<unnamed>")
                ),
            },
            other => RelayError::MalformedMultipart(other.to_string()),
        }
    }
}

/// Cuts `text` to at most `limit` characters without splitting a code point.
pub fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

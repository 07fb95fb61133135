// Normalized API error, built once at the HTTP client boundary
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Broad classification of a failed backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Transport
    Network,
    Timeout,
    Decode,

    // 400 / 422
    BadRequest,
    Validation,

    // 401
    Unauthorized,

    // 403
    Forbidden,

    // 404
    NotFound,

    // 409
    Conflict,

    // 429
    RateLimited,

    // 500, 502
    Server,

    // 503, 504
    ServiceUnavailable,

    // Rejected locally before any request was sent
    InvalidInput,
}

/// Client-side error with a single message readers can show as-is
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub field_errors: HashMap<String, Vec<String>>,
    pub raw: Option<Value>,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::Validation,
            429 => ErrorKind::RateLimited,
            503 | 504 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::Server,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Could not reach the server",
            ErrorKind::Timeout => "The server took too long to respond",
            ErrorKind::Decode => "Unexpected response from the server",
            ErrorKind::BadRequest => "Invalid request",
            ErrorKind::Validation => "Please check the highlighted fields",
            ErrorKind::Unauthorized => "Authentication required",
            ErrorKind::Forbidden => "You do not have permission to perform this action",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Conflict => "The resource was modified by another request",
            ErrorKind::RateLimited => "Too many requests, please wait a moment",
            ErrorKind::Server => "Internal server error",
            ErrorKind::ServiceUnavailable => "Service temporarily unavailable",
            ErrorKind::InvalidInput => "Invalid input",
        }
    }
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            field_errors: HashMap::new(),
            raw: None,
        }
    }

    /// Build from a non-2xx response. `body` is whatever JSON the backend sent, if any.
    pub fn from_response(status: u16, body: Option<Value>) -> Self {
        let kind = match ErrorKind::from_status(status) {
            // Field-level errors on a 400 are form validation failures
            ErrorKind::BadRequest if body.as_ref().map_or(false, has_field_errors) => {
                ErrorKind::Validation
            }
            kind => kind,
        };

        let field_errors = body.as_ref().map(extract_field_errors).unwrap_or_default();
        let message = body
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| kind.default_message().to_string());

        Self {
            kind,
            message,
            status: Some(status),
            field_errors,
            raw: body,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn validation(message: impl Into<String>, field_errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            field_errors,
            ..Self::new(ErrorKind::Validation, message)
        }
    }

    /// Stable code for JSON output and scripting
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Decode => "INVALID_RESPONSE",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::RateLimited => "TOO_MANY_REQUESTS",
            ErrorKind::Server => "INTERNAL_SERVER_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::InvalidInput => "INVALID_INPUT",
        }
    }

    /// Failures worth retrying without user involvement
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::ServiceUnavailable
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// First message recorded for a form field
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::timeout(ErrorKind::Timeout.default_message())
        } else if err.is_decode() {
            tracing::debug!("Response decode error: {}", err);
            ApiError::decode(ErrorKind::Decode.default_message())
        } else {
            tracing::debug!("Transport error: {}", err);
            ApiError::network(ErrorKind::Network.default_message())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON decode error: {}", err);
        ApiError::decode(ErrorKind::Decode.default_message())
    }
}

// Keys the backend uses for messages rather than form fields
const MESSAGE_KEYS: [&str; 5] = ["detail", "message", "error", "code", "non_field_errors"];

fn extract_message(body: &Value) -> Option<String> {
    if let Some(text) = body.as_str() {
        return non_empty(text);
    }

    if let Some(detail) = body.get("detail").and_then(Value::as_str) {
        return non_empty(detail);
    }
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return non_empty(message);
    }
    match body.get("error") {
        Some(Value::String(error)) => return non_empty(error),
        Some(Value::Object(error)) => {
            if let Some(message) = error.get("message").and_then(Value::as_str) {
                return non_empty(message);
            }
        }
        _ => {}
    }

    if let Some((field, messages)) = extract_field_errors(body).into_iter().min_by(|a, b| a.0.cmp(&b.0)) {
        if let Some(first) = messages.first() {
            return Some(format!("{}: {}", field, first));
        }
    }

    body.get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_str)
        .and_then(non_empty)
}

fn has_field_errors(body: &Value) -> bool {
    !extract_field_errors(body).is_empty()
}

fn extract_field_errors(body: &Value) -> HashMap<String, Vec<String>> {
    let mut fields = HashMap::new();

    let Some(object) = body.as_object() else {
        return fields;
    };

    for (key, value) in object {
        if MESSAGE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let messages: Vec<String> = match value {
            Value::String(message) => vec![message.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => continue,
        };
        if !messages.is_empty() {
            fields.insert(key.clone(), messages);
        }
    }

    fields
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//! Wire-stable error vocabulary shared by the runtime conversion path and
//! the build-time documentation path.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical identifier for a class of failure, independent of HTTP status
/// or locale. Case-sensitive; equality is value equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(Cow<'static, str>);

impl ErrorCode {
    // General errors
    pub const UNKNOWN_ERROR: ErrorCode = ErrorCode::from_static("UNKNOWN_ERROR");
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode::from_static("INTERNAL_ERROR");
    pub const TIMEOUT: ErrorCode = ErrorCode::from_static("TIMEOUT");

    // Validation errors (400)
    pub const VALIDATION_ERROR: ErrorCode = ErrorCode::from_static("VALIDATION_ERROR");
    pub const INVALID_INPUT: ErrorCode = ErrorCode::from_static("INVALID_INPUT");
    pub const MISSING_REQUIRED_FIELD: ErrorCode = ErrorCode::from_static("MISSING_REQUIRED_FIELD");
    pub const INVALID_FORMAT: ErrorCode = ErrorCode::from_static("INVALID_FORMAT");

    // Auth errors (401/403)
    pub const AUTH_REQUIRED: ErrorCode = ErrorCode::from_static("AUTH_REQUIRED");
    pub const AUTH_INVALID_TOKEN: ErrorCode = ErrorCode::from_static("AUTH_INVALID_TOKEN");
    pub const AUTH_TOKEN_EXPIRED: ErrorCode = ErrorCode::from_static("AUTH_TOKEN_EXPIRED");
    pub const AUTH_PERMISSION_DENIED: ErrorCode = ErrorCode::from_static("AUTH_PERMISSION_DENIED");
    pub const SESSION_EXPIRED: ErrorCode = ErrorCode::from_static("SESSION_EXPIRED");

    // Not found errors (404)
    pub const NOT_FOUND: ErrorCode = ErrorCode::from_static("NOT_FOUND");

    // Database errors
    pub const DATABASE_CONFLICT: ErrorCode = ErrorCode::from_static("DATABASE_CONFLICT");
    pub const DATABASE_CONSTRAINT_VIOLATION: ErrorCode =
        ErrorCode::from_static("DATABASE_CONSTRAINT_VIOLATION");
    pub const DATABASE_INVALID_REFERENCE: ErrorCode =
        ErrorCode::from_static("DATABASE_INVALID_REFERENCE");
    pub const DATABASE_MISSING_REQUIRED: ErrorCode =
        ErrorCode::from_static("DATABASE_MISSING_REQUIRED");
    pub const DATABASE_CONNECTION_ERROR: ErrorCode =
        ErrorCode::from_static("DATABASE_CONNECTION_ERROR");
    pub const DATABASE_QUERY_ERROR: ErrorCode = ErrorCode::from_static("DATABASE_QUERY_ERROR");

    // Business logic errors (422)
    pub const BUSINESS_RULE_VIOLATION: ErrorCode =
        ErrorCode::from_static("BUSINESS_RULE_VIOLATION");
    pub const INSUFFICIENT_BALANCE: ErrorCode = ErrorCode::from_static("INSUFFICIENT_BALANCE");
    pub const OPERATION_NOT_ALLOWED: ErrorCode = ErrorCode::from_static("OPERATION_NOT_ALLOWED");

    pub const fn from_static(code: &'static str) -> Self {
        ErrorCode(Cow::Borrowed(code))
    }

    /// Create a custom error code from an arbitrary string
    pub fn new(code: impl Into<String>) -> Self {
        ErrorCode(Cow::Owned(code.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::new(code)
    }
}

/// Default HTTP status for the canonical error codes. Unknown codes map
/// to 500.
pub fn default_http_status(code: &ErrorCode) -> u16 {
    match code.as_str() {
        "VALIDATION_ERROR" | "INVALID_INPUT" | "MISSING_REQUIRED_FIELD" | "INVALID_FORMAT" => 400,
        "AUTH_REQUIRED" | "AUTH_INVALID_TOKEN" | "AUTH_TOKEN_EXPIRED" | "SESSION_EXPIRED" => 401,
        "AUTH_PERMISSION_DENIED" => 403,
        "NOT_FOUND" => 404,
        "DATABASE_CONFLICT" | "DATABASE_CONSTRAINT_VIOLATION" => 409,
        "DATABASE_INVALID_REFERENCE"
        | "DATABASE_MISSING_REQUIRED"
        | "BUSINESS_RULE_VIOLATION"
        | "INSUFFICIENT_BALANCE"
        | "OPERATION_NOT_ALLOWED" => 422,
        _ => 500,
    }
}

/// Scalar value allowed in error context mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::String(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::String(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Integer(v)
    }
}

impl From<u16> for ContextValue {
    fn from(v: u16) -> Self {
        ContextValue::Integer(v as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Float(v)
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        ContextValue::Bool(v)
    }
}

/// Structured representation of a single failure. The message is an opaque
/// template with named placeholders (e.g. "{field}"); localized substitution
/// happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub http_status: u16,
    pub message: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ContextValue>,

    /// Offending input field, when one can be named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ErrorDetail {
    /// Create a detail with the code's default HTTP status
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let http_status = default_http_status(&code);
        Self {
            code,
            http_status,
            message: message.into(),
            context: BTreeMap::new(),
            field: None,
            timestamp: Utc::now(),
        }
    }

    /// Override the HTTP status. Values outside [100, 599] are not valid
    /// on the wire and fall back to 500.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = if (100..=599).contains(&status) { status } else { 500 };
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Aggregated error response delivered over the wire. Details are ordered
/// by conversion priority, most specific first. The debug mapping is only
/// populated when debug mode is active and is never serialized empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub details: Vec<ErrorDetail>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<BTreeMap<String, ContextValue>>,
}

impl ErrorResponse {
    pub fn new(detail: ErrorDetail) -> Self {
        Self {
            details: vec![detail],
            trace_id: None,
            debug: None,
        }
    }

    /// A response carries at least one detail; an empty input is replaced
    /// with the generic internal-error detail rather than producing a
    /// malformed body.
    pub fn with_details(mut details: Vec<ErrorDetail>) -> Self {
        if details.is_empty() {
            details.push(ErrorDetail::new(
                ErrorCode::INTERNAL_ERROR,
                "An internal error occurred",
            ));
        }
        Self {
            details,
            trace_id: None,
            debug: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_debug(mut self, debug: BTreeMap<String, ContextValue>) -> Self {
        if !debug.is_empty() {
            self.debug = Some(debug);
        }
        self
    }

    /// HTTP status of the most specific detail
    pub fn http_status(&self) -> u16 {
        self.details.first().map(|d| d.http_status).unwrap_or(500)
    }

    /// Strip the debug mapping before handing the response to an
    /// untrusted channel
    pub fn without_debug(mut self) -> Self {
        self.debug = None;
        self
    }
}

/// Canonical application error carried through server code. Converts to a
/// single-detail [`ErrorResponse`] without loss.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub http_status: u16,
    pub message: String,
    pub context: BTreeMap<String, ContextValue>,
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let http_status = default_http_status(&code);
        Self {
            code,
            http_status,
            message: message.into(),
            context: BTreeMap::new(),
            field: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = if (100..=599).contains(&status) { status } else { 500 };
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self) -> ErrorDetail {
        let mut detail = ErrorDetail::new(self.code.clone(), self.message.clone())
            .with_status(self.http_status);
        detail.context = self.context.clone();
        detail.field = self.field.clone();
        detail
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

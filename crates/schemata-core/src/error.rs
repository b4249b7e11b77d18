//! Core error types for schemata.
//!
//! Every operation in the workspace returns [`SchemataResult`]. The error enum
//! [`SchemataError`] carries a stable [`ErrorKind`] that the surrounding
//! transport layer translates into status codes, and validation failures carry
//! an ordered list of [`FieldError`]s so a client can highlight the offending
//! inputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The short name of the offending field (or definition property).
    pub field: String,
    /// A short machine-readable code (e.g. "required", "invalid", "max_length").
    pub code: String,
    /// Human-readable failure reason.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Represents a validation error with optional field-level errors.
///
/// Field errors are kept in insertion order. Callers that validate records
/// push them in object field order so clients can render them
/// deterministically.
///
/// # Examples
///
/// ```
/// use schemata_core::error::{FieldError, ValidationError};
///
/// let err = ValidationError::with_field_errors(vec![FieldError::new(
///     "email",
///     "required",
///     "This field is required.",
/// )]);
/// assert!(err.has_field("email"));
/// assert_eq!(err.to_string(), "email: This field is required.");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The primary error message. Empty when only field errors are present.
    pub message: String,
    /// Per-field validation errors, in the order they were recorded.
    pub field_errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates a validation error with a single message and no field detail.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    /// Creates a validation error containing per-field errors.
    pub fn with_field_errors(field_errors: Vec<FieldError>) -> Self {
        Self {
            message: String::new(),
            field_errors,
        }
    }

    /// Creates a validation error for one field.
    pub fn field(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_field_errors(vec![FieldError::new(field, code, message)])
    }

    /// Returns `Err` carrying `message` and `field_errors` when any field
    /// error was recorded.
    pub fn check(message: impl Into<String>, field_errors: Vec<FieldError>) -> Result<(), Self> {
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(Self {
                message: message.into(),
                field_errors,
            })
        }
    }

    /// Appends a field error.
    pub fn push(&mut self, error: FieldError) {
        self.field_errors.push(error);
    }

    /// Returns `true` if there is neither a message nor any field error.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.field_errors.is_empty()
    }

    /// Returns `true` if an error was recorded for the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.field_errors.iter().any(|e| e.field == field)
    }

    /// Returns the errors recorded for the given field.
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.field_errors.iter().filter(move |e| e.field == field)
    }

    /// Converts into `Ok(())` when empty, or an error otherwise.
    pub fn into_result(self) -> SchemataResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SchemataError::ValidationError(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
            if !self.field_errors.is_empty() {
                write!(f, " (")?;
            }
        }
        for (i, error) in self.field_errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        if !self.message.is_empty() && !self.field_errors.is_empty() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The stable error vocabulary exposed to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced field, object, or instance does not exist.
    NotFound,
    /// Payload or definition failed validation.
    ValidationError,
    /// Unique key collision on a short name.
    DuplicateError,
    /// Blocked by a live reference.
    ConstraintError,
    /// Storage or provisioning failure not attributable to the caller.
    InternalError,
}

impl ErrorKind {
    /// Returns the stable code string, e.g. `"NOT_FOUND"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DuplicateError => "DUPLICATE_ERROR",
            Self::ConstraintError => "CONSTRAINT_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code conventionally used for this kind.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ValidationError => 400,
            Self::DuplicateError | Self::ConstraintError => 409,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary error type for schemata.
#[derive(Error, Debug)]
pub enum SchemataError {
    // ── Caller errors ────────────────────────────────────────────────

    /// A field, object, or instance does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// One or more inputs failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    /// A short name is already registered.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The operation is blocked by a live reference.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    // ── Storage ──────────────────────────────────────────────────────

    /// A data-store statement failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A data-store call exceeded its time budget and was aborted.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The caller abandoned the operation before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// An invariant was broken inside the core.
    #[error("Internal error: {0}")]
    InternalError(String),

    // ── Configuration / IO ───────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Stored metadata could not be (de)serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SchemataError {
    /// Returns the stable kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ValidationError(_) => ErrorKind::ValidationError,
            Self::Duplicate(_) => ErrorKind::DuplicateError,
            Self::Constraint(_) => ErrorKind::ConstraintError,
            Self::DatabaseError(_)
            | Self::Timeout(_)
            | Self::Cancelled
            | Self::InternalError(_)
            | Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => ErrorKind::InternalError,
        }
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// - `NotFound` -> 404
    /// - `ValidationError` -> 400
    /// - `Duplicate`, `Constraint` -> 409
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns the validation detail, if this is a validation error.
    pub const fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::ValidationError(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ValidationError> for SchemataError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for SchemataError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, SchemataError>`.
pub type SchemataResult<T> = Result<T, SchemataError>;

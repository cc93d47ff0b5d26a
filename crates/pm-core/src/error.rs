//! Core error types for PM-RS
//!
//! Every failure in the system is raised at the point of detection as a
//! `PmError` and handled once at the outermost request boundary. None of
//! these failure modes are transient, so nothing here is ever retried.

use std::collections::HashMap;
use thiserror::Error;

/// Core error type for all PM-RS operations
#[derive(Error, Debug)]
pub enum PmError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Deliberately generic: "no such user" and "wrong password" must be
    /// indistinguishable to prevent account enumeration.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered: {email}")]
    DuplicateEmail { email: String },

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("{entity} not found with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PmError {
    pub fn not_found(
        entity: &'static str,
        field: &'static str,
        value: impl std::fmt::Display,
    ) -> Self {
        PmError::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        PmError::AccessDenied {
            message: message.into(),
        }
    }

    /// HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            PmError::Validation(_) => 400,
            PmError::InvalidCredentials => 401,
            PmError::InvalidToken => 401,
            PmError::AccessDenied { .. } => 403,
            PmError::NotFound { .. } => 404,
            PmError::DuplicateEmail { .. } => 409,
            PmError::Config(_) | PmError::Database(_) | PmError::Internal(_) => 500,
        }
    }

    /// Machine-readable error code exposed in API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PmError::Validation(_) => "VALIDATION_ERROR",
            PmError::InvalidCredentials => "INVALID_CREDENTIALS",
            PmError::DuplicateEmail { .. } => "EMAIL_ALREADY_EXISTS",
            PmError::InvalidToken => "INVALID_TOKEN",
            PmError::AccessDenied { .. } => "PROJECT_ACCESS_DENIED",
            PmError::NotFound { entity, .. } => match *entity {
                "user" => "USER_NOT_FOUND",
                "project" => "PROJECT_NOT_FOUND",
                "task" => "TASK_NOT_FOUND",
                _ => "NOT_FOUND",
            },
            PmError::Config(_) => "CONFIGURATION_ERROR",
            PmError::Database(_) | PmError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error message is safe to show to clients as-is.
    /// Internal detail is only exposed behind an explicit debug toggle.
    pub fn is_client_safe(&self) -> bool {
        !matches!(
            self,
            PmError::Config(_) | PmError::Database(_) | PmError::Internal(_)
        )
    }
}

/// Result alias for operations returning `PmError`
pub type PmResult<T> = Result<T, PmError>;

/// Validation errors collection
#[derive(Error, Debug, Default, Clone)]
#[error("Validation errors: {errors:?}")]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: HashMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Convert to `Err(PmError::Validation)` when any error was recorded
    pub fn into_result(self) -> Result<(), PmError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PmError::Validation(self))
        }
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }
}

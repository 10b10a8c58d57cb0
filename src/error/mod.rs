//! Error types and handling for `allure_store`.
//!
//! The store itself has almost no failure modes: lookups are total and
//! return `None` or empty collections. Errors come from three places:
//!
//! - the conversion layer rejecting malformed raw records,
//! - environment matchers failing while a result is routed,
//! - configuration, history and known-issue inputs that fail to parse.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Environment matchers return `anyhow::Error`, wrapped with the
//!   environment name that produced it
//! - Provides recovery hints for user-facing errors

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `allure_store` operations.
#[derive(Error, Debug)]
pub enum StoreError {
    // === Raw Input Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple validation errors occurred.
    #[error("Validation errors: {errors:?}")]
    ValidationErrors { errors: Vec<ValidationError> },

    /// Invalid status value.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    /// Invalid fixture type value.
    #[error("Invalid fixture type: {fixture_type}")]
    InvalidFixtureType { fixture_type: String },

    // === Environment Errors ===
    /// An environment matcher failed while routing a test result.
    #[error("Environment matcher '{environment}' failed: {source}")]
    EnvironmentMatcher {
        environment: String,
        #[source]
        source: anyhow::Error,
    },

    // === Input File Errors ===
    /// Failed to parse a line in a JSONL input (history).
    #[error("JSONL parse error at line {line}: {reason}")]
    JsonlParse { line: usize, reason: String },

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("Cannot read configuration at '{path}': {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid regular expression in a matcher or category.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// The reason for the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl StoreError {
    /// Can the producer of the input fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::ValidationErrors { .. }
                | Self::InvalidStatus { .. }
                | Self::InvalidFixtureType { .. }
                | Self::JsonlParse { .. }
                | Self::Config(_)
                | Self::ConfigUnreadable { .. }
                | Self::Regex(_)
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidStatus { .. } => {
                Some("Valid statuses: passed, failed, broken, skipped, unknown")
            }
            Self::InvalidFixtureType { .. } => Some("Valid fixture types: before, after"),
            Self::JsonlParse { .. } => Some("Each history line must be one JSON object"),
            Self::Regex(_) => Some("Check the label patterns in the environments config"),
            Self::EnvironmentMatcher { .. } => {
                Some("Fix the environment matcher; results are not routed silently")
            }
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create from multiple validation errors.
    #[must_use]
    pub fn from_validation_errors(errors: Vec<ValidationError>) -> Self {
        if errors.len() == 1 {
            let err = &errors[0];
            Self::Validation {
                field: err.field.clone(),
                reason: err.message.clone(),
            }
        } else {
            Self::ValidationErrors { errors }
        }
    }

    /// Wrap an arbitrary error with a context message.
    #[must_use]
    pub fn with_context(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

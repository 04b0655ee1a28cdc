// ── Core error types ──
//
// One variant per failure kind the engine can surface. Transport errors
// from `vyform-api` are carried verbatim; everything else names the
// device path (or field) it concerns.

use serde_json::Value;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Schema and walker errors ─────────────────────────────────────
    #[error("Schema unhandled at '{path}': {detail}")]
    SchemaUnhandled { path: String, detail: String },

    #[error("Unexpected device value at '{path}': expected {expected}, got {got}")]
    ShapeMismatch {
        path: String,
        expected: String,
        got: String,
    },

    #[error("Invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },

    // ── Declared-value errors ────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid resource identity '{id}': {reason}")]
    InvalidIdentity { id: String, reason: String },

    // ── Orchestration errors ─────────────────────────────────────────
    #[error("Required configuration at '{path}' is still absent after {attempts} attempts")]
    PreconditionMissing { path: String, attempts: u32 },

    #[error("Configuration at '{path}' still depends on this resource after {attempts} attempts")]
    BlockerPresent { path: String, attempts: u32 },

    #[error("Configuration already exists at '{path}'; import it with id '{id}'")]
    AlreadyExists { path: String, id: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    // ── Device transport (surfaced verbatim) ─────────────────────────
    #[error(transparent)]
    Transport(#[from] vyform_api::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for the kinds that are retried until the deadline.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PreconditionMissing { .. } | Self::BlockerPresent { .. }
        )
    }

    pub(crate) fn shape(path: impl ToString, expected: &str, got: &Value) -> Self {
        Self::ShapeMismatch {
            path: path.to_string(),
            expected: expected.into(),
            got: describe(got).into(),
        }
    }

    pub(crate) fn validation(field: impl ToString, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Short name of a JSON value's shape, for diagnostics.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(map) if map.is_empty() => "empty object",
        Value::Object(_) => "object",
    }
}

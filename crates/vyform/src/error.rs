//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vyform_config::ConfigError;
use vyform_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(vyform::connection_failed),
        help(
            "Check that the device is reachable and its HTTPS API is enabled\n\
             (set service https api keys id <name> key <secret>)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS error: {message}")]
    #[diagnostic(
        code(vyform::tls_error),
        help(
            "Routers usually present a self-signed certificate.\n\
             Use --insecure (-k) to accept it, or configure ca_cert in your profile."
        )
    )]
    TlsError { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(vyform::auth_failed),
        help("Verify the API key against 'service https api keys' on the device.")
    )]
    AuthFailed { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(vyform::no_credentials),
        help(
            "Pass --api-key, set VYFORM_API_KEY, or add api_key / api_key_env\n\
             to the profile."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource} '{identifier}' not found on the device")]
    #[diagnostic(
        code(vyform::not_found),
        help("Run: vyform show \"{path}\" to inspect the device configuration")
    )]
    NotFound {
        resource: String,
        identifier: String,
        path: String,
    },

    #[error("Configuration already exists at '{path}'")]
    #[diagnostic(
        code(vyform::conflict),
        help("Adopt it instead: vyform import <resource> '{id}'")
    )]
    AlreadyExists { path: String, id: String },

    #[error("Required configuration at '{path}' never appeared ({attempts} attempts)")]
    #[diagnostic(
        code(vyform::precondition),
        help("Declare the instance that creates '{path}' earlier in the manifest.")
    )]
    PreconditionMissing { path: String, attempts: u32 },

    #[error("Configuration at '{path}' still references this resource ({attempts} attempts)")]
    #[diagnostic(
        code(vyform::blocked),
        help("Remove the configuration under '{path}' first.")
    )]
    BlockerPresent { path: String, attempts: u32 },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Device rejected the request: {message}")]
    #[diagnostic(code(vyform::device))]
    DeviceRejected { message: String },

    #[error("Device API error: {message}")]
    #[diagnostic(code(vyform::api_error))]
    ApiError { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(vyform::unexpected_device_value),
        help("The resource definition does not describe what the device holds.")
    )]
    UnexpectedDevice { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vyform::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid manifest {path}: {reason}")]
    #[diagnostic(
        code(vyform::manifest),
        help("A manifest holds [resources.<name>] definitions and [[instances]] entries.")
    )]
    Manifest { path: String, reason: String },

    #[error("Unknown resource '{name}'")]
    #[diagnostic(code(vyform::unknown_resource), help("Defined resources: {available}"))]
    UnknownResource { name: String, available: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vyform::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device endpoint configured")]
    #[diagnostic(
        code(vyform::no_config),
        help(
            "Pass --endpoint, set VYFORM_ENDPOINT, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(vyform::config))]
    Config { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("{operation} timed out")]
    #[diagnostic(
        code(vyform::timeout),
        help("Raise the resource's timeouts or --timeout, or check device responsiveness.")
    )]
    Timeout { operation: String },

    #[error("{operation} was cancelled")]
    #[diagnostic(code(vyform::cancelled))]
    Cancelled { operation: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(vyform::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(vyform::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML rendering failed: {0}")]
    #[diagnostic(code(vyform::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::PreconditionMissing { .. } => exit_code::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::BlockerPresent { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::Manifest { .. }
            | Self::UnknownResource { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport(api) => api.into(),

            CoreError::Validation { field, reason } => CliError::Validation { field, reason },

            CoreError::InvalidIdentity { id, reason } => CliError::Validation {
                field: format!("id '{id}'"),
                reason,
            },

            CoreError::AlreadyExists { path, id } => CliError::AlreadyExists { path, id },

            CoreError::PreconditionMissing { path, attempts } => {
                CliError::PreconditionMissing { path, attempts }
            }

            CoreError::BlockerPresent { path, attempts } => {
                CliError::BlockerPresent { path, attempts }
            }

            CoreError::Timeout { operation } => CliError::Timeout { operation },

            CoreError::Cancelled { operation } => CliError::Cancelled { operation },

            CoreError::Config { message } => CliError::Config { message },

            other @ (CoreError::SchemaUnhandled { .. }
            | CoreError::ShapeMismatch { .. }
            | CoreError::InvalidSchema { .. }) => CliError::UnexpectedDevice {
                message: other.to_string(),
            },
        }
    }
}

impl From<vyform_api::Error> for CliError {
    fn from(err: vyform_api::Error) -> Self {
        match err {
            vyform_api::Error::Authentication { message } => CliError::AuthFailed { message },

            vyform_api::Error::Timeout { timeout_secs } => CliError::Timeout {
                operation: format!("request (after {timeout_secs}s)"),
            },

            vyform_api::Error::Tls(message) => CliError::TlsError { message },

            vyform_api::Error::Device { message } => CliError::DeviceRejected { message },

            vyform_api::Error::Transport(e) if e.is_connect() => CliError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "(unknown)".into(), ToString::to_string),
                source: Box::new(e),
            },

            other => CliError::ApiError {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── Runtime configuration ──
//
// These types describe *how* to reach a device and how the engine paces
// its operations. They never touch disk: `vyform-config` (or any other
// host) builds them and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use vyform_api::{DeviceClient, TlsMode, TransportConfig};

use crate::engine::Operation;
use crate::error::CoreError;

/// Default deadline for every CRUD operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Pause between precondition / blocker polls.
pub const BACKOFF: Duration = Duration::from_secs(2);

/// Time reserved at the end of an operation for its final HTTP call.
pub const BUFFER: Duration = Duration::from_secs(5);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Default for routers.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Connection settings for a single device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device URL (e.g., `https://192.168.1.1`).
    pub url: Url,
    /// API key configured on the device.
    pub api_key: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl DeviceConfig {
    pub fn new(url: Url, api_key: SecretString) -> Self {
        Self {
            url,
            api_key,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Build the shared HTTP client for this device.
    pub fn connect(&self) -> Result<DeviceClient, CoreError> {
        let transport = TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        };
        Ok(DeviceClient::new(
            self.url.clone(),
            self.api_key.clone(),
            &transport,
        )?)
    }
}

/// Per-operation deadlines of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_OPERATION_TIMEOUT,
            read: DEFAULT_OPERATION_TIMEOUT,
            update: DEFAULT_OPERATION_TIMEOUT,
            delete: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Fixed-backoff polling used for preconditions and delete blockers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub buffer: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: BACKOFF,
            buffer: BUFFER,
        }
    }
}

/// Whether to persist the running configuration after each apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavePolicy {
    pub enabled: bool,
    /// Target file; the device default when `None`.
    pub file: Option<String>,
}

/// Engine-wide settings shared by every resource operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    pub save: SavePolicy,
}

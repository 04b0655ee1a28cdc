// Device HTTP client
//
// Wraps `reqwest::Client` with the device's form-encoded request shape
// (`data` + `key` fields) and `{success, data, error}` envelope
// unwrapping. Configuration reads go through `/retrieve`, writes through
// `/configure`, persistence through `/config-file`.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::command::{ConfigCommand, ConfigOp, flatten_body, split_path};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Device error messages that mean "nothing is configured at this path".
const EMPTY_PATH_MARKERS: &[&str] = &["specified path is empty", "does not exist"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for one device's configuration API.
///
/// Cheap to clone and safe to share between concurrent resource
/// operations; every call is a single stateless POST.
#[derive(Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// The `base_url` is the device root, e.g. `https://192.168.1.1`.
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Fetch the configuration subtree at `path`.
    ///
    /// Returns `None` when nothing is configured there, a JSON string for
    /// a scalar leaf, or the nested object the device renders.
    pub async fn show(&self, path: &str) -> Result<Option<Value>, Error> {
        debug!(path, "show");
        let data = json!({ "op": "showConfig", "path": split_path(path) });

        match self.post("retrieve", &data).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(Error::Device { message })
                if EMPTY_PATH_MARKERS.iter().any(|m| message.contains(m)) =>
            {
                debug!(path, "nothing configured");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Set every leaf of `body` below `path`.
    pub async fn set(&self, path: &str, body: &Value) -> Result<(), Error> {
        debug!(path, %body, "set");
        let commands = Self::commands(ConfigOp::Set, path, Some(body))?;
        self.configure(&commands).await
    }

    /// Delete `path` itself, or only the leaves of `body` below it.
    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<(), Error> {
        match body {
            Some(b) => debug!(path, body = %b, "delete"),
            None => debug!(path, "delete"),
        }
        let commands = Self::commands(ConfigOp::Delete, path, body)?;
        self.configure(&commands).await
    }

    /// Persist the running configuration, optionally to a specific file.
    pub async fn save(&self, file: Option<&str>) -> Result<(), Error> {
        debug!(file, "save");
        let data = match file {
            Some(f) => json!({ "op": "save", "file": f }),
            None => json!({ "op": "save" }),
        };
        self.post("config-file", &data).await.map(|_| ())
    }

    /// Submit a batch of commands as one commit.
    pub async fn configure(&self, commands: &[ConfigCommand]) -> Result<(), Error> {
        if commands.is_empty() {
            return Ok(());
        }
        self.post("configure", &commands).await.map(|_| ())
    }

    fn commands(
        op: ConfigOp,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<ConfigCommand>, Error> {
        let base = split_path(path);
        let paths = match body {
            Some(b) => flatten_body(&base, b)?,
            None => vec![base],
        };
        Ok(paths
            .into_iter()
            .map(|p| ConfigCommand::new(op, p))
            .collect())
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint
        );
        Ok(Url::parse(&full)?)
    }

    /// POST `data` as the form-encoded `data` field and unwrap the envelope.
    async fn post(&self, endpoint: &str, data: &impl Serialize) -> Result<Value, Error> {
        let url = self.endpoint_url(endpoint)?;
        debug!("POST {}", url);

        let data = serde_json::to_string(data)
            .map_err(|e| Error::InvalidRequest(format!("failed to encode request: {e}")))?;

        let resp = self
            .http
            .post(url)
            .form(&[
                ("data", data.as_str()),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_envelope(resp).await
    }

    /// Parse the `{ success, data, error }` envelope, returning `data` on
    /// success or an `Error::Device` carrying the device's message.
    async fn parse_envelope(resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("device returned HTTP {}", status.as_u16()),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        let envelope: ApiResponse = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(_) if !status.is_success() => {
                return Err(Error::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                return Err(Error::Deserialization {
                    message: e.to_string(),
                    body,
                });
            }
        };

        if envelope.success {
            Ok(envelope.data)
        } else {
            Err(Error::Device {
                message: envelope
                    .error
                    .map(|m| m.trim().to_owned())
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            })
        }
    }
}

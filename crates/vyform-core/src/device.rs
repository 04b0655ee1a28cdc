// ── Device capability ──
//
// The four calls the engine makes against a device. `DeviceClient`
// implements them over HTTP; tests substitute an in-memory device.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use vyform_api::{DeviceClient, Error};

/// Configuration access to one device. Implementations must tolerate
/// concurrent calls.
pub trait DeviceApi: Send + Sync {
    /// Subtree at `path`; `None` when nothing is configured there.
    fn show(&self, path: &str) -> impl Future<Output = Result<Option<Value>, Error>> + Send;

    /// Create every option in `body` under `path`.
    fn set(&self, path: &str, body: &Value) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete `path`, or only the options in `body` when given.
    fn delete(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Persist the running configuration.
    fn save(&self, file: Option<&str>) -> impl Future<Output = Result<(), Error>> + Send;
}

impl DeviceApi for DeviceClient {
    fn show(&self, path: &str) -> impl Future<Output = Result<Option<Value>, Error>> + Send {
        DeviceClient::show(self, path)
    }

    fn set(&self, path: &str, body: &Value) -> impl Future<Output = Result<(), Error>> + Send {
        DeviceClient::set(self, path, body)
    }

    fn delete(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        DeviceClient::delete(self, path, body)
    }

    fn save(&self, file: Option<&str>) -> impl Future<Output = Result<(), Error>> + Send {
        DeviceClient::save(self, file)
    }
}

impl<T: DeviceApi> DeviceApi for Arc<T> {
    fn show(&self, path: &str) -> impl Future<Output = Result<Option<Value>, Error>> + Send {
        T::show(self, path)
    }

    fn set(&self, path: &str, body: &Value) -> impl Future<Output = Result<(), Error>> + Send {
        T::set(self, path, body)
    }

    fn delete(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        T::delete(self, path, body)
    }

    fn save(&self, file: Option<&str>) -> impl Future<Output = Result<(), Error>> + Send {
        T::save(self, file)
    }
}

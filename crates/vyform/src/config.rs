//! Connection resolution: config file profile plus CLI flag overrides.
//!
//! The single boundary where `vyform-config` types and global flags turn
//! into the core's `DeviceConfig` and `EngineSettings`.

use std::time::Duration;

use secrecy::SecretString;

use vyform_config::{Config, Defaults, Profile};
use vyform_core::{DeviceConfig, EngineSettings};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything needed to build an engine for one device.
#[derive(Debug)]
pub struct Connection {
    pub device: DeviceConfig,
    pub settings: EngineSettings,
}

/// Resolve the active connection from the config file and global flags.
pub fn resolve(global: &GlobalOpts) -> Result<Connection, CliError> {
    let cfg = vyform_config::load_config_or_default();
    resolve_with(&cfg, global)
}

pub(crate) fn resolve_with(cfg: &Config, global: &GlobalOpts) -> Result<Connection, CliError> {
    let profile_name = cfg.profile_name(global.profile.as_deref());

    // A profile exists: use it with CLI flag overrides
    if let Some(profile) = cfg.profiles.get(profile_name) {
        let merged = with_overrides(profile, global);
        let url = vyform_config::validate_profile(&merged)?;
        let api_key = match &global.api_key {
            Some(key) => SecretString::from(key.clone()),
            None => vyform_config::resolve_api_key(&merged, profile_name)?,
        };
        return Ok(connection(url, api_key, &merged, &cfg.defaults));
    }

    // An explicitly requested profile must exist
    if global.profile.is_some() {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile -- build from flags / env vars alone
    let endpoint = global
        .endpoint
        .clone()
        .ok_or_else(|| CliError::NoConfig {
            path: vyform_config::config_path().display().to_string(),
        })?;
    let merged = with_overrides(
        &Profile {
            endpoint,
            ..Profile::default()
        },
        global,
    );
    let url = vyform_config::validate_profile(&merged)?;
    let api_key = global
        .api_key
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.into(),
        })?;
    Ok(connection(url, api_key, &merged, &cfg.defaults))
}

/// A copy of `profile` with endpoint, TLS and timeout flags applied.
fn with_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    Profile {
        endpoint: global
            .endpoint
            .clone()
            .unwrap_or_else(|| profile.endpoint.clone()),
        api_key: profile.api_key.clone(),
        api_key_env: profile.api_key_env.clone(),
        ca_cert: profile.ca_cert.clone(),
        insecure: if global.insecure {
            Some(true)
        } else {
            profile.insecure
        },
        timeout: global.timeout.or(profile.timeout),
        save: profile.save,
        save_file: profile.save_file.clone(),
    }
}

fn connection(
    url: url::Url,
    api_key: SecretString,
    profile: &Profile,
    defaults: &Defaults,
) -> Connection {
    let mut device = DeviceConfig::new(url, api_key);
    device.tls = vyform_config::tls_for(profile, defaults);
    device.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    Connection {
        device,
        settings: vyform_config::engine_settings(profile, defaults),
    }
}

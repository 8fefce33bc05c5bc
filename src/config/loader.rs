//! Configuration loading from the process environment.

use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::{PortalConfig, ServerConfig, UpstreamConfig, UpstreamCredentials};
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_PORT: &str = "PORT";
pub const ENV_TOKEN: &str = "PANGOLIN_TOKEN";
pub const ENV_HOST: &str = "PANGOLIN_HOST";
pub const ENV_ORG: &str = "PANGOLIN_ORG";
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "SHUTDOWN_GRACE_SECS";
pub const ENV_READ_HEADER_TIMEOUT_SECS: &str = "READ_HEADER_TIMEOUT_SECS";
pub const ENV_UPSTREAM_TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "failed to find env {}", var),
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "invalid value '{}' for env {}: {}", value, var, reason)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from the real process environment.
pub fn load_from_env() -> Result<PortalConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load and validate configuration through an arbitrary lookup function.
///
/// Tests pass a map-backed lookup instead of mutating the process env.
pub fn load_with<F>(lookup: F) -> Result<PortalConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = parse_var(ENV_PORT, required(&lookup, ENV_PORT)?)?;
    let token = required(&lookup, ENV_TOKEN)?;
    let host = required(&lookup, ENV_HOST)?;
    let org = required(&lookup, ENV_ORG)?;

    let defaults = ServerConfig::default();
    let server = ServerConfig {
        port,
        shutdown_grace_period: optional_secs(&lookup, ENV_SHUTDOWN_GRACE_SECS)?
            .unwrap_or(defaults.shutdown_grace_period),
        read_header_timeout: optional_secs(&lookup, ENV_READ_HEADER_TIMEOUT_SECS)?
            .unwrap_or(defaults.read_header_timeout),
    };

    let mut upstream = UpstreamConfig::new(UpstreamCredentials { token, host, org });
    if let Some(timeout) = optional_secs(&lookup, ENV_UPSTREAM_TIMEOUT_SECS)? {
        upstream.request_timeout = timeout;
    }

    let config = PortalConfig { server, upstream };
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).ok_or(ConfigError::Missing(var))
}

fn optional_secs<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => parse_var::<u64>(var, raw).map(|secs| Some(Duration::from_secs(secs))),
        None => Ok(None),
    }
}

fn parse_var<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}

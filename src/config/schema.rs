//! Configuration schema definitions.
//!
//! Every value here is read once at startup and never mutated afterwards.
//! Subsystems receive their own slice of the config by value.

use std::time::Duration;

/// Root configuration for the portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Listener and shutdown settings.
    pub server: ServerConfig,

    /// Upstream access-control API settings.
    pub upstream: UpstreamConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (all interfaces).
    pub port: u16,

    /// How long in-flight requests may take to finish once shutdown begins.
    pub shutdown_grace_period: Duration,

    /// Maximum time a client may take to send the request head.
    pub read_header_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            shutdown_grace_period: Duration::from_secs(10),
            read_header_timeout: Duration::from_secs(10),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Authentication and addressing for the upstream.
    pub credentials: UpstreamCredentials,

    /// Client-level timeout applied to every upstream call.
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(credentials: UpstreamCredentials) -> Self {
        Self {
            credentials,
            request_timeout: default_upstream_timeout(),
        }
    }
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Credentials for the upstream API.
#[derive(Clone)]
pub struct UpstreamCredentials {
    /// Bearer token. Never logged.
    pub token: String,

    /// Base URL of the upstream, e.g. `https://api.example.com`.
    pub host: String,

    /// Organization identifier resources are listed under.
    pub org: String,
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .field("org", &self.org)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let creds = UpstreamCredentials {
            token: "s3cret".into(),
            host: "https://api.example.com".into(),
            org: "acme".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("acme"));
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.shutdown_grace_period, Duration::from_secs(10));
        assert_eq!(config.read_header_timeout, Duration::from_secs(10));
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (the loader handles presence and parsing)
//! - Validate value ranges (timeouts > 0, port valid)
//! - Check the upstream host is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PortalConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::PortalConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Port 0 would bind an ephemeral port nobody can find.
    ZeroPort,
    /// A duration setting that must be positive was zero.
    ZeroDuration(&'static str),
    /// A required string setting was blank.
    Empty(&'static str),
    /// The upstream host is not a usable base URL.
    InvalidHost(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ZeroPort => write!(f, "port must be non-zero"),
            ValidationError::ZeroDuration(name) => write!(f, "{} must be greater than zero", name),
            ValidationError::Empty(name) => write!(f, "{} must not be empty", name),
            ValidationError::InvalidHost(reason) => write!(f, "invalid upstream host: {}", reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a loaded configuration.
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.server.shutdown_grace_period.is_zero() {
        errors.push(ValidationError::ZeroDuration("shutdown grace period"));
    }
    if config.server.read_header_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("read header timeout"));
    }
    if config.upstream.request_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("upstream timeout"));
    }

    let creds = &config.upstream.credentials;
    if creds.token.trim().is_empty() {
        errors.push(ValidationError::Empty("upstream token"));
    }
    if creds.org.trim().is_empty() {
        errors.push(ValidationError::Empty("upstream org"));
    }
    match url::Url::parse(&creds.host) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidHost(format!(
            "unsupported scheme '{}'",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidHost(e.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

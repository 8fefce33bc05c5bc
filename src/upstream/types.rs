//! Wire types and error definitions for the upstream API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::patch::Patch;

// Re-export the credentials from the config module to avoid duplication
pub use crate::config::schema::{UpstreamConfig, UpstreamCredentials};

/// Envelope wrapping every upstream payload.
///
/// When `error` is set, `data` is undefined and must not be used.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: u16,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning an error envelope into [`UpstreamError::Rejected`].
    ///
    /// A success envelope may omit `data`; that is `Ok(None)`.
    pub fn into_data(self) -> UpstreamResult<Option<T>> {
        if self.error {
            let message = if self.message.trim().is_empty() {
                "upstream reported an error without a message".to_string()
            } else {
                self.message
            };
            return Err(UpstreamError::Rejected(message));
        }
        Ok(self.data)
    }
}

/// Decode an envelope body and extract a typed payload.
///
/// The payload is only interpreted after the error flag has been checked,
/// so a rejection with a malformed `data` still reports the rejection. A
/// success without `data` yields the payload's zero value.
pub fn decode_envelope<T: DeserializeOwned + Default>(body: &[u8]) -> UpstreamResult<T> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_slice(body)?;
    match envelope.into_data()? {
        Some(data) => Ok(serde_json::from_value(data)?),
        None => Ok(T::default()),
    }
}

/// A resource exposed by the upstream. Read-only for this service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub full_domain: Option<String>,
}

/// Payload of the resource listing call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceList {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// An access rule attached to a resource.
///
/// Every field is a [`Patch`]: absent fields are omitted from the request
/// body, which the upstream reads as "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub rule_id: Patch<u64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub resource_id: Patch<u64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub enabled: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub priority: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub action: Patch<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Patch::is_absent")]
    pub match_kind: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub value: Patch<String>,
}

impl AccessRule {
    /// Priority given to self-registered address rules.
    pub const SELF_SERVICE_PRIORITY: i64 = 10;

    /// An enabled rule accepting traffic from a single IP address.
    pub fn accept_ip(ip: impl Into<String>) -> Self {
        Self {
            action: Patch::Value("ACCEPT".to_string()),
            match_kind: Patch::Value("IP".to_string()),
            value: Patch::Value(ip.into()),
            priority: Patch::Value(Self::SELF_SERVICE_PRIORITY),
            enabled: Patch::Value(true),
            ..Self::default()
        }
    }
}

/// Errors returned by the upstream client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never completed (connect, timeout, body read).
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a status the call cannot use.
    #[error("error status code: {0}")]
    Status(StatusCode),

    /// The body was not a valid envelope.
    #[error("malformed upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The call reached the upstream, which refused the operation.
    #[error("error: {0}")]
    Rejected(String),
}

impl UpstreamError {
    /// True when the upstream understood the call and refused it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, UpstreamError::Rejected(_))
    }

    /// True when the upstream could not be reached or answered unusably.
    pub fn is_transport(&self) -> bool {
        !self.is_rejection()
    }

    /// Short classification used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Status(_) => "status",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::Rejected(_) => "rejected",
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

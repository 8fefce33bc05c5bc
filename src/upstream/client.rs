//! Upstream access-control API client.
//!
//! # Responsibilities
//! - Inject bearer authentication and content type on every call
//! - Unwrap the success/error envelope
//! - Classify failures as transport or rejection
//!
//! No call is retried; the shared client timeout bounds every call.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};

use crate::upstream::types::{
    decode_envelope, AccessRule, Resource, ResourceList, UpstreamConfig, UpstreamCredentials,
    UpstreamError, UpstreamResult,
};

/// Client for the upstream API.
///
/// Holds only immutable state; clones share the connection pool and are
/// safe to use concurrently from any number of requests.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    credentials: UpstreamCredentials,
    base_url: String,
}

impl UpstreamClient {
    /// Create a new client.
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(config: UpstreamConfig) -> UpstreamResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let base_url = format!("{}/v1", config.credentials.host.trim_end_matches('/'));

        tracing::debug!(
            base_url = %base_url,
            org = %config.credentials.org,
            timeout = ?config.request_timeout,
            "Upstream client initialized"
        );

        Ok(Self {
            http,
            credentials: config.credentials,
            base_url,
        })
    }

    /// List the resources of the configured organization.
    pub async fn list_resources(&self) -> UpstreamResult<Vec<Resource>> {
        let url = format!("{}/org/{}/resources", self.base_url, self.credentials.org);

        let response = self.request(Method::GET, &url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(url = %url, status = %status, "Upstream listing failed");
            return Err(UpstreamError::Status(status));
        }

        let body = response.bytes().await?;
        let list: ResourceList = decode_envelope(&body)?;
        Ok(list.resources)
    }

    /// Create an access rule on a resource and return the stored rule.
    pub async fn create_rule(
        &self,
        rule: &AccessRule,
        resource_id: u64,
    ) -> UpstreamResult<AccessRule> {
        let url = format!("{}/resource/{}/rule", self.base_url, resource_id);
        let body = serde_json::to_vec(rule)?;

        let response = self.request(Method::PUT, &url).body(body).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // The envelope is authoritative whatever the status; a body that is
        // not an envelope on a failing status is reported as that status.
        match decode_envelope::<AccessRule>(&body) {
            Err(UpstreamError::Decode(e)) if !status.is_success() => {
                tracing::warn!(
                    url = %url,
                    status = %status,
                    error = %e,
                    "Upstream rule write failed"
                );
                Err(UpstreamError::Status(status))
            }
            other => other,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).headers(self.auth_headers())
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&format!("Bearer {}", self.credentials.token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Upstream token is not a valid header value; sending without it")
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("org", &self.credentials.org)
            .finish()
    }
}

//! Route handlers.
//!
//! Thin glue over [`UpstreamClient`]: every failure surfaces as an
//! [`AppError`], and the caller's address always comes from the proxy's
//! `X-Real-IP` header.

use std::num::ParseIntError;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse};
use axum::Json;
use minijinja::context;
use serde::Serialize;

use crate::http::access_log::real_ip;
use crate::http::error::AppError;
use crate::http::server::{AppState, HOME_TEMPLATE};
use crate::upstream::AccessRule;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    #[serde(rename = "Version")]
    pub version: &'static str,
    #[serde(rename = "Uptime")]
    pub uptime: String,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        version: env!("CARGO_PKG_VERSION"),
        uptime: format!("{:?}", state.started.elapsed()),
    })
}

/// `PUT /register/{id}`: allow the caller's address on one resource.
pub async fn register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<&'static str, AppError> {
    let resource_id: u64 = id
        .parse()
        .map_err(|e: ParseIntError| AppError::internal(e.to_string()))?;
    let ip = real_ip(&headers).ok_or_else(|| AppError::internal("missing X-Real-IP header"))?;

    let rule = AccessRule::accept_ip(ip);
    state.client.create_rule(&rule, resource_id).await?;

    tracing::info!(resource_id, ip = %ip, "Registered address");
    Ok("Success\n")
}

/// `GET /`: list resources with a register button each.
pub async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let resources = state.client.list_resources().await?;
    let template = state.templates.get_template(HOME_TEMPLATE)?;
    let page = template.render(context! {
        real_ip => real_ip(&headers).unwrap_or_default(),
        resources => resources,
    })?;
    Ok(Html(page))
}

/// Anything unrouted.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "No route");
    (StatusCode::NOT_FOUND, "404 page not found\n")
}

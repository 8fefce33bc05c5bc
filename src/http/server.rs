//! HTTP router and middleware pipeline.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Share the upstream client and templates through [`AppState`]
//! - Stack the middleware in its fixed order
//!
//! ```text
//! recovery → access log → router → handler → (upstream client)
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, put};
use axum::Router;
use minijinja::Environment;
use tower::Layer;

use crate::http::access_log::{AccessLogLayer, AccessLogService};
use crate::http::handlers;
use crate::http::recovery::{RecoveryLayer, RecoveryService};
use crate::upstream::UpstreamClient;

/// Name of the landing page template. The `.html` suffix turns on
/// autoescaping.
pub const HOME_TEMPLATE: &str = "home.html";

/// The full request pipeline as served on each connection.
pub type Pipeline = RecoveryService<AccessLogService<Router>>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: UpstreamClient,
    pub started: Instant,
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    pub fn new(client: UpstreamClient) -> Result<Self, minijinja::Error> {
        Ok(Self {
            client,
            started: Instant::now(),
            templates: Arc::new(templates()?),
        })
    }
}

fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(HOME_TEMPLATE, include_str!("../../templates/home.html"))?;
    Ok(env)
}

/// Build the route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/register/{id}", put(handlers::register))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Wrap a router in the middleware stack. Recovery is outermost so it also
/// covers the access logger.
pub fn build_pipeline(router: Router) -> Pipeline {
    RecoveryLayer.layer(AccessLogLayer.layer(router))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{UpstreamConfig, UpstreamCredentials};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        let client = UpstreamClient::new(UpstreamConfig::new(UpstreamCredentials {
            token: "t".to_string(),
            host: "http://127.0.0.1:9".to_string(),
            org: "home".to_string(),
        }))
        .unwrap();
        AppState::new(client).unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, String) {
        let response = build_pipeline(build_router(state())).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_version_and_uptime() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["Version"], env!("CARGO_PKG_VERSION"));
        assert!(json["Uptime"].as_str().unwrap().ends_with('s'));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (status, _) = send(Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_id_is_500_with_parse_error() {
        let request = Request::put("/register/abc")
            .header("x-real-ip", "192.0.2.7")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "invalid digit found in string\n");
    }

    #[tokio::test]
    async fn register_requires_caller_address() {
        let (status, body) = send(Request::put("/register/1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "missing X-Real-IP header\n");

        let blank = Request::put("/register/1")
            .header("x-real-ip", "  ")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(blank).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn home_template_escapes_names() {
        let env = templates().unwrap();
        let page = env
            .get_template(HOME_TEMPLATE)
            .unwrap()
            .render(minijinja::context! {
                real_ip => "192.0.2.9",
                resources => vec![serde_json::json!({
                    "resourceId": 7,
                    "name": "<b>svc</b>",
                    "enabled": true,
                    "fullDomain": null,
                })],
            })
            .unwrap();
        assert!(page.contains("hx-put=\"/register/7\""));
        assert!(!page.contains("<b>svc"));
        assert!(page.contains("&lt;b&gt;svc&lt;&#x2f;b&gt;"));
        assert!(page.contains("192.0.2.9"));
        assert!(!page.contains(">none<"));
    }
}

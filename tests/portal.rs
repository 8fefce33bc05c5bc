//! End-to-end requests through the served pipeline.

use std::time::Duration;

use selfservice_portal::config::ServerConfig;
use selfservice_portal::{build_pipeline, build_router, AppState};

mod common;

async fn portal_for(upstream: &common::MockUpstream) -> common::RunningPortal {
    let state = AppState::new(upstream.client()).unwrap();
    common::start_portal(ServerConfig::default(), build_pipeline(build_router(state))).await
}

#[tokio::test]
async fn register_creates_accept_rule_for_caller() {
    let upstream = common::start_programmable_upstream(|request| async move {
        (200, common::ok_envelope(request.json()))
    })
    .await;
    let portal = portal_for(&upstream).await;

    let res = common::test_client()
        .put(portal.url("/register/12"))
        .header("X-Real-IP", "198.51.100.23")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Success\n");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/resource/12/rule");
    let rule = requests[0].json();
    assert_eq!(rule["value"], "198.51.100.23");
    assert_eq!(rule["action"], "ACCEPT");
    assert_eq!(rule["match"], "IP");

    portal.stop().await.unwrap();
}

#[tokio::test]
async fn register_surfaces_rejection_text() {
    let upstream =
        common::start_fixed_upstream(200, r#"{"error":true,"message":"duplicate rule"}"#).await;
    let portal = portal_for(&upstream).await;

    let res = common::test_client()
        .put(portal.url("/register/12"))
        .header("X-Real-IP", "198.51.100.23")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "error: duplicate rule\n");

    portal.stop().await.unwrap();
}

#[tokio::test]
async fn register_without_caller_address_never_reaches_upstream() {
    let upstream = common::start_fixed_upstream(200, "{}").await;
    let portal = portal_for(&upstream).await;

    let res = common::test_client().put(portal.url("/register/12")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "missing X-Real-IP header\n");
    assert!(upstream.requests().is_empty());

    portal.stop().await.unwrap();
}

#[tokio::test]
async fn home_lists_resources() {
    let upstream = common::start_fixed_upstream(
        200,
        r#"{"data":{"resources":[{"resourceId":3,"name":"grafana","enabled":true,"fullDomain":"grafana.example.com"}]},"success":true,"error":false,"message":"","status":200}"#,
    )
    .await;
    let portal = portal_for(&upstream).await;

    let res = common::test_client()
        .get(portal.url("/"))
        .header("X-Real-IP", "198.51.100.23")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    let page = res.text().await.unwrap();
    assert!(page.contains("grafana.example.com"));
    assert!(page.contains("hx-put=\"/register/3\""));
    assert!(page.contains("198.51.100.23"));

    portal.stop().await.unwrap();
}

#[tokio::test]
async fn home_reports_unreachable_listing() {
    let upstream = common::start_fixed_upstream(503, "down").await;
    let portal = portal_for(&upstream).await;

    let res = common::test_client().get(portal.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "error status code: 503 Service Unavailable\n");

    portal.stop().await.unwrap();
}

#[tokio::test]
async fn health_and_not_found() {
    let upstream = common::start_fixed_upstream(200, "{}").await;
    let portal = portal_for(&upstream).await;
    let client = common::test_client();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let health: serde_json::Value = client
        .get(portal.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["Version"], env!("CARGO_PKG_VERSION"));
    assert!(health["Uptime"].is_string());

    let res = client.get(portal.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    // Health never touches the upstream.
    assert!(upstream.requests().is_empty());

    portal.stop().await.unwrap();
}

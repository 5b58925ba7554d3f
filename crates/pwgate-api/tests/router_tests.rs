//! Router tests: help page, proxy pass-through and content types

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use pwgate_api::{create_router, AppState};
use pwgate_core::{ProxyResponse, RequestHandler};

/// Echoes the request path on success, or returns a canned response.
struct EchoHandler {
    response: Option<ProxyResponse>,
}

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, path: &str) -> ProxyResponse {
        match &self.response {
            Some(response) => response.clone(),
            None => ProxyResponse::ok(path.to_string()),
        }
    }
}

async fn start_proxy(response: Option<ProxyResponse>) -> SocketAddr {
    let state = AppState::new(Arc::new(EchoHandler { response }));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

#[tokio::test]
async fn root_serves_the_help_page() {
    let addr = start_proxy(None).await;

    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = resp.text().await.unwrap();
    assert!(body.contains("/api/meters/aggregates"));
    assert!(body.contains("/api/system_status/soe"));
}

#[tokio::test]
async fn other_paths_are_proxied_verbatim() {
    let addr = start_proxy(None).await;

    let resp = reqwest::get(format!("http://{addr}/api/system_status/soe"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), "/api/system_status/soe");
}

#[tokio::test]
async fn handler_failures_come_back_as_plain_text() {
    let addr = start_proxy(Some(ProxyResponse::error(403, "no access"))).await;

    let resp = reqwest::get(format!("http://{addr}/api/meters/aggregates"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(resp.text().await.unwrap(), "no access");
}

#[tokio::test]
async fn no_usable_answer_is_an_empty_417() {
    let addr = start_proxy(Some(ProxyResponse::empty(417))).await;

    let resp = reqwest::get(format!("http://{addr}/api/meters/aggregates"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 417);
    assert!(resp.text().await.unwrap().is_empty());
}

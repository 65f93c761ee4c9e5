//! End-to-end tests: a live gateway in front of live adapter stubs.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::Request;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mcp_gateway::api::adapters::SESSION_ID_HEADER;
use mcp_gateway::config::{AdapterConfig, AppConfig};
use mcp_gateway::server::create_app;

/// Adapter stub that echoes what it saw, so tests can assert on the proxied
/// request. `node` tags which instance answered.
async fn spawn_backend(node: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |req: Request<Body>| async move {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let headers: HashMap<String, String> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        Json(json!({
            "node": node,
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "headers": headers,
            "body": String::from_utf8_lossy(&bytes),
        }))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_gateway(adapters: HashMap<String, AdapterConfig>) -> SocketAddr {
    let config = AppConfig {
        adapters,
        ..AppConfig::default()
    };
    let app = create_app(config).await.expect("Failed to create app");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn fleet(name: &str, nodes: &[SocketAddr]) -> HashMap<String, AdapterConfig> {
    let mut adapters = HashMap::new();
    adapters.insert(
        name.to_string(),
        AdapterConfig {
            nodes: nodes.iter().map(|a| format!("http://{a}")).collect(),
        },
    );
    adapters
}

#[tokio::test]
async fn test_new_session_is_minted_and_proxied() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .header("Authorization", "Bearer super-secret")
        .header("X-Client", "itest")
        .body("hello")
        .send()
        .await
        .expect("Failed to reach gateway");

    assert!(resp.status().is_success());
    let session_id = resp
        .headers()
        .get(SESSION_ID_HEADER)
        .expect("minted session id header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!session_id.is_empty());

    let seen: Value = resp.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["path"], "/adapters/billing/mcp");
    assert_eq!(seen["body"], "hello");

    // Credentials stop at the gateway; provenance is appended.
    assert!(seen["headers"].get("authorization").is_none());
    assert_eq!(seen["headers"]["x-client"], "itest");
    let forwarded = seen["headers"]["forwarded"].as_str().unwrap();
    assert!(forwarded.contains("for=127.0.0.1"), "got: {forwarded}");
    assert!(forwarded.contains(";proto=http;host="), "got: {forwarded}");
}

#[tokio::test]
async fn test_follow_ups_stick_to_the_pinned_instance() {
    let node_a = spawn_backend("node-a").await;
    let node_b = spawn_backend("node-b").await;
    let gateway = spawn_gateway(fleet("billing", &[node_a, node_b])).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .body("init")
        .send()
        .await
        .unwrap();
    let session_id = resp.headers()[SESSION_ID_HEADER].to_str().unwrap().to_string();
    let pinned = resp.json::<Value>().await.unwrap()["node"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..5 {
        let seen: Value = client
            .get(format!(
                "http://{gateway}/adapters/billing/mcp?session_id={session_id}"
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(seen["node"].as_str().unwrap(), pinned);
    }
}

#[tokio::test]
async fn test_chunked_request_body_streams_through() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;

    // A streamed body reaches the gateway with no Content-Length, only
    // chunked framing; the bytes must still arrive at the backend intact.
    let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("hel"), Ok("lo "), Ok("world")];
    let resp = reqwest::Client::new()
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    let seen: Value = resp.json().await.unwrap();
    assert_eq!(seen["body"], "hello world");
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;

    let resp = reqwest::Client::new()
        .get(format!(
            "http://{gateway}/adapters/billing/mcp?session_id=not-a-session"
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_session");
    assert_eq!(body["message"], "Session id is not valid, or has expired.");
}

#[tokio::test]
async fn test_empty_session_id_is_rejected() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/adapters/billing/mcp?session_id="))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(body["message"], "Session id not found in the request.");
}

#[tokio::test]
async fn test_no_capacity_when_fleet_is_empty() {
    let gateway = spawn_gateway(fleet("billing", &[])).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "no_capacity");
}

#[tokio::test]
async fn test_dead_pinned_target_is_a_visible_failure() {
    // Nothing listens on port 9: the fleet is configured but unreachable.
    let gateway = spawn_gateway(fleet("billing", &["127.0.0.1:9".parse().unwrap()])).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "upstream_failure");
}

#[tokio::test]
async fn test_delete_ends_the_session() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .send()
        .await
        .unwrap();
    let session_id = resp.headers()[SESSION_ID_HEADER].to_str().unwrap().to_string();

    // The backend accepts the DELETE, so the gateway drops the binding too.
    let resp = client
        .delete(format!(
            "http://{gateway}/adapters/billing/mcp?session_id={session_id}"
        ))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!(
            "http://{gateway}/adapters/billing/mcp?session_id={session_id}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_out_of_band_unbind() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gateway}/adapters/billing/mcp"))
        .send()
        .await
        .unwrap();
    let session_id = resp.headers()[SESSION_ID_HEADER].to_str().unwrap().to_string();

    let resp = client
        .delete(format!(
            "http://{gateway}/adapters/billing/sessions/{session_id}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let resp = client
        .get(format!(
            "http://{gateway}/adapters/billing/mcp?session_id={session_id}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_readiness() {
    let backend = spawn_backend("node-a").await;
    let gateway = spawn_gateway(fleet("billing", &[backend])).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("http://{gateway}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let body: Value = client
        .get(format!("http://{gateway}/ready"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["shared_cache"], "in-memory");
    assert_eq!(body["adapters"], 1);
}

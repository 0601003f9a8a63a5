//! End-to-end tests of the HTTP surface, driven in-process.

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use routetable::api::rest::{AppState, create_api_router};
use routetable::routes::store::RouteStore;
use routetable::service::RouteService;

const DEFAULT_ROUTE: &str =
    r#"{"dest":"0.0.0.0","mask":"0.0.0.0","nh":"10.1.1.1","metric":1,"interface":"eth0"}"#;
const LAN_ROUTE: &str = r#"{"dest":"192.168.100.0","mask":"255.255.255.0","nh":"168.192.100.1","metric":1,"interface":"eth0"}"#;

fn app() -> Router {
    let service = RouteService::new(Arc::new(RouteStore::new()));
    create_api_router(Arc::new(AppState::new(service)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).body(body).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn add(app: &Router, lines: &[&str]) -> Value {
    let body = lines.join("\n");
    let (status, json) = send(app, Method::POST, "/api/routes", Body::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    json
}

#[tokio::test]
async fn test_default_and_lan_route() {
    let app = app();
    let result = add(&app, &[DEFAULT_ROUTE, LAN_ROUTE]).await;
    assert_eq!(result["accepted_count"], 2);
    assert_eq!(result["rejected"].as_array().unwrap().len(), 0);

    let (status, route) = send(&app, Method::GET, "/api/lookup?address=192.168.100.5", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["nh"], "168.192.100.1");

    let (status, route) = send(&app, Method::GET, "/api/lookup?address=8.8.8.8", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["nh"], "10.1.1.1");

    let (status, route) = send(
        &app,
        Method::GET,
        "/api/route?network=192.168.100.0&mask=255.255.255.0",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["dest"], "192.168.100.0");
    assert_eq!(route["interface"], "eth0");
}

#[tokio::test]
async fn test_partial_rejection() {
    let app = app();
    let bad_mask =
        r#"{"dest":"172.16.0.0","mask":"255.0.255.0","nh":"10.0.0.1","metric":1,"interface":"eth1"}"#;
    let result = add(&app, &[DEFAULT_ROUTE, bad_mask, "{oops", "", LAN_ROUTE]).await;

    assert_eq!(result["accepted_count"], 2);
    let rejected = result["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0]["index"], 1);
    assert_eq!(rejected[0]["route"]["mask"], "255.0.255.0");
    assert_eq!(rejected[1]["index"], 2);
    assert!(rejected[1].get("route").is_none());
}

#[tokio::test]
async fn test_not_found_is_explicit() {
    let app = app();
    add(&app, &[DEFAULT_ROUTE]).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/routes/exact?network=192.168.100.0&mask=255.255.255.0",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    let empty = self::app();
    let (status, _) = send(&empty, Method::GET, "/api/lookup?address=8.8.8.8", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_query() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/route?network=192.168.100.0&mask=255.0.255.0",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRoute");

    let (status, _) = send(&app, Method::GET, "/api/lookup?address=banana", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_falls_back() {
    let app = app();
    add(&app, &[DEFAULT_ROUTE, LAN_ROUTE]).await;

    let uri = "/api/routes?network=192.168.100.0&mask=255.255.255.0";
    let (status, body) = send(&app, Method::DELETE, uri, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (_, body) = send(&app, Method::DELETE, uri, Body::empty()).await;
    assert_eq!(body["removed"], false);

    let (_, route) = send(&app, Method::GET, "/api/lookup?address=192.168.100.5", Body::empty()).await;
    assert_eq!(route["nh"], "10.1.1.1");
}

#[tokio::test]
async fn test_routing_table_and_health() {
    let app = app();
    let replacement = r#"{"dest":"192.168.100.77","mask":"255.255.255.0","nh":"10.9.9.9","metric":5,"interface":"eth2"}"#;
    add(&app, &[DEFAULT_ROUTE, LAN_ROUTE, replacement]).await;

    let (status, table) = send(&app, Method::GET, "/api/routing-table", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let routes = table["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0]["dest"], "192.168.100.0");
    assert_eq!(routes[0]["nh"], "10.9.9.9");
    assert_eq!(routes[1]["dest"], "0.0.0.0");

    let (status, health) = send(&app, Method::GET, "/api/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["route_count"], 2);
    assert_eq!(health["prefix_lengths"][0]["prefix_len"], 24);
}

#[tokio::test]
async fn test_interrupted_upload_keeps_accepted_routes() {
    let app = app();
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from(format!("{}\n{}\n", DEFAULT_ROUTE, LAN_ROUTE))),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset")),
    ];
    let body = Body::from_stream(futures::stream::iter(chunks));

    let (status, result) = send(&app, Method::POST, "/api/routes", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["accepted_count"], 2);
    assert!(result["interrupted"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/lookup?address=192.168.100.5", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_overlong_line_reports_earlier_routes() {
    let app = app();
    let mut body = format!("{}\n{}\n", DEFAULT_ROUTE, LAN_ROUTE).into_bytes();
    body.extend(std::iter::repeat_n(b' ', routetable::api::ndjson::MAX_LINE_BYTES + 1));

    let (status, result) = send(&app, Method::POST, "/api/routes", Body::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["accepted_count"], 2);
    assert_eq!(result["rejected"].as_array().unwrap().len(), 0);
    assert!(result["interrupted"].as_str().unwrap().contains("line exceeds"));

    let (status, _) = send(&app, Method::GET, "/api/lookup?address=192.168.100.5", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
}

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{self, StatusCode},
    response::IntoResponse,
    Json, Router,
};
use serde_json::json;
use tower::util::ServiceExt;

use crate::{
    analytics,
    conf::ConfAnalytics,
    jwt::test_keys,
    mail::Mailer,
};

use super::AppState;

const MAX_BODY_SIZE: usize = 1024 * 1024; // 1MB limit

fn stub_state(analytics_conf: ConfAnalytics) -> AppState {
    AppState {
        analytics: analytics::Client::new(analytics_conf),
        mailer: Mailer::stub(&["noreply@example.com"]),
    }
}

/// A fake Google backend: token endpoint plus the two GA4 report
/// methods. The report paths contain a colon (`…:runReport`), so a
/// single catch-all route dispatches on the path string.
async fn spawn_upstream_stub(grant_tokens: bool) -> SocketAddr {
    let handler = move |req: Request<Body>| async move {
        let path = req.uri().path().to_string();
        if path.ends_with("/token") {
            if grant_tokens {
                return Json(json!({
                    "access_token": "ya29.stub",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                }))
                .into_response();
            }
            return Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid JWT Signature.",
            }))
            .into_response();
        }
        if path.contains(":runRealtimeReport") {
            return Json(json!({
                "rows": [
                    { "metricValues": [{ "value": "5" }] },
                    { "metricValues": [{ "value": "2" }] },
                ],
            }))
            .into_response();
        }
        if path.contains(":runReport") {
            return Json(json!({
                "rows": [
                    {
                        "metricValues": [
                            { "value": "104233" },
                            { "value": "8121" },
                        ],
                    },
                ],
            }))
            .into_response();
        }
        StatusCode::NOT_FOUND.into_response()
    };
    let stub = Router::new().fallback(handler);
    let listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    addr
}

fn analytics_conf(upstream: SocketAddr) -> ConfAnalytics {
    ConfAnalytics {
        client_email: "analytics-viewer@example.iam.gserviceaccount.com"
            .to_string(),
        private_key_pem: test_keys::PRIVATE_KEY_PEM.to_string(),
        property_id: "494778207".to_string(),
        token_uri: format!("http://{upstream}/token"),
        api_base: format!("http://{upstream}"),
    }
}

#[tokio::test]
async fn analytics_snapshot() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    let request = Request::builder()
        .method(http::Method::GET)
        .uri("/api/analytics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["activeUsers"], json!(7));
    assert_eq!(body["data"]["totalViews"], json!("104233"));
    assert_eq!(body["data"]["totalUsers"], json!("8121"));
}

#[tokio::test]
async fn analytics_token_refusal_is_500() {
    let upstream = spawn_upstream_stub(false).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    let request = Request::builder()
        .method(http::Method::GET)
        .uri("/api/analytics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("access token"));
    assert!(body["hint"].as_str().is_some());
}

#[tokio::test]
async fn send_email_returns_six_digit_otp() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    let payload = json!({
        "email": "viewer@example.com",
        "username": "miku",
    });
    let request = Request::builder()
        .method(http::Method::POST)
        .uri("/api/send-email")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    let otp = body["otp"].as_str().unwrap();
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn send_email_missing_fields_is_400() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    for payload in [
        json!({ "username": "miku" }),
        json!({ "email": "viewer@example.com" }),
        json!({ "email": "", "username": "" }),
    ] {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/api/send-email")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&payload).unwrap()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body =
            to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], json!(false));
    }
}

#[tokio::test]
async fn send_email_malformed_body_gets_error_envelope() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    for body in ["{not json", ""] {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/api/send-email")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let body =
            to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn preflight_gets_cors_headers_and_no_body() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    for (uri, method) in
        [("/api/analytics", "GET"), ("/api/send-email", "POST")]
    {
        let request = Request::builder()
            .method(http::Method::OPTIONS)
            .uri(uri)
            .header(http::header::ORIGIN, "https://lyxenime.example")
            .header("Access-Control-Request-Method", method)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
        let allow_methods = response
            .headers()
            .get("access-control-allow-methods")
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(allow_methods.contains(method));
        let body =
            to_bytes(response.into_body(), MAX_BODY_SIZE).await.unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn health_is_public() {
    let upstream = spawn_upstream_stub(true).await;
    let app = super::router(stub_state(analytics_conf(upstream)));

    let request = Request::builder()
        .method(http::Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

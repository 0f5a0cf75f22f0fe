//! End-to-end tests against the full router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use framed::display::{run_updates, update_channel};
use framed::server::{frame_lines, router, LOG_ACK};
use framed::{AppState, DisplayState, OriginPolicy, OutputFormat, RefreshPolicy, ServerConfig};

const LAN_PEER: ([u8; 4], u16) = ([192, 168, 1, 50], 40000);
const WAN_PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 40000);

fn app_with(state: Arc<AppState>, peer: impl Into<SocketAddr>) -> Router {
    router(state).layer(MockConnectInfo(peer.into()))
}

fn new_state(initial: &str, config: ServerConfig) -> Arc<AppState> {
    Arc::new(AppState::new(DisplayState::new(initial), config).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder()
        .uri(uri)
        .header(header::HOST, "192.168.1.2:7100")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn display_json(app: Router) -> serde_json::Value {
    let (status, headers, body) = get(app, "/api/display").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    serde_json::from_slice(&body).unwrap()
}

fn expected_png(state: &AppState) -> Vec<u8> {
    let snapshot = state.display.snapshot();
    state
        .renderer
        .render(&frame_lines(&snapshot, None))
        .encode(OutputFormat::Png)
        .unwrap()
}

#[tokio::test]
async fn test_image_endpoint() {
    let state = new_state("Hello", ServerConfig::default());
    let (status, headers, body) = get(app_with(state.clone(), LAN_PEER), "/image").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string().as_str());

    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!(decoded.width(), 800);
    assert_eq!(decoded.height(), 480);
    assert_eq!(body, expected_png(&state));
}

#[tokio::test]
async fn test_bmp_format() {
    let state = new_state("Hello", ServerConfig::default().with_format(OutputFormat::Bmp));
    let (status, headers, body) = get(app_with(state.clone(), LAN_PEER), "/image").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/bmp");
    assert!(body.starts_with(b"BM"));

    let json = display_json(app_with(state, LAN_PEER)).await;
    assert!(json["filename"].as_str().unwrap().ends_with(".bmp"));
}

#[tokio::test]
async fn test_end_to_end_update() {
    let state = new_state("Hello", ServerConfig::default());
    let (publisher, updates) = update_channel();
    let consumer = tokio::spawn(run_updates(updates, state.display.clone()));

    // Initial poll
    let before = display_json(app_with(state.clone(), LAN_PEER)).await;
    let (_, _, image_before) = get(app_with(state.clone(), LAN_PEER), "/image").await;
    assert_eq!(state.display.snapshot().lines, vec!["Hello"]);
    assert_eq!(image_before, expected_png(&state));

    // Publish through the update channel
    publisher.publish("Line one\nLine two").await.unwrap();
    drop(publisher);
    consumer.await.unwrap();

    let snapshot = state.display.snapshot();
    assert_eq!(snapshot.lines, vec!["Line one", "Line two"]);
    assert_eq!(frame_lines(&snapshot, None).len(), 3);

    let (_, _, image_after) = get(app_with(state.clone(), LAN_PEER), "/image").await;
    assert_eq!(image_after, expected_png(&state));
    assert_ne!(image_before, image_after);

    let after = display_json(app_with(state, LAN_PEER)).await;
    assert_ne!(before["filename"], after["filename"]);
}

#[tokio::test]
async fn test_filename_stable_without_updates() {
    let state = new_state("Hello", ServerConfig::default());
    let first = display_json(app_with(state.clone(), LAN_PEER)).await;
    let second = display_json(app_with(state.clone(), LAN_PEER)).await;
    assert_eq!(first["filename"], second["filename"]);

    state.display.update("Hello again");
    let third = display_json(app_with(state, LAN_PEER)).await;
    assert_ne!(second["filename"], third["filename"]);
}

#[tokio::test]
async fn test_display_payload_shape() {
    let state = new_state(
        "Hello",
        ServerConfig::default().with_refresh(RefreshPolicy::Fixed(120)),
    );
    let json = display_json(app_with(state, LAN_PEER)).await;

    assert_eq!(json["status"], 0);
    assert_eq!(json["image_url"], "http://192.168.1.2:7100/image");
    assert_eq!(json["refresh_rate"], 120);
    assert_eq!(json["reset_firmware"], false);
    assert_eq!(json["update_firmware"], false);
    assert_eq!(json["firmware_url"], "");
    assert_eq!(json["special_function"], "sleep");
    let filename = json["filename"].as_str().unwrap();
    assert!(filename.starts_with("screen-"));
    assert!(filename.ends_with(".png"));
}

#[tokio::test]
async fn test_battery_header_reaches_state() {
    let state = new_state("Hello", ServerConfig::default().with_battery_status(true));

    let request = Request::builder()
        .uri("/api/display")
        .header("Battery-Voltage", "4.5")
        .body(Body::empty())
        .unwrap();
    let response = app_with(state.clone(), LAN_PEER)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.battery.voltage(), Some(4.5));
    assert_eq!(state.battery_level(), Some(framed::BatteryLevel::Full));

    // A malformed reading keeps the last good one
    let request = Request::builder()
        .uri("/api/display")
        .header("Battery-Voltage", "plenty")
        .body(Body::empty())
        .unwrap();
    app_with(state.clone(), LAN_PEER)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(state.battery.voltage(), Some(4.5));

    // The header row now carries the battery marker
    let snapshot = state.display.snapshot();
    let lines = frame_lines(&snapshot, state.battery_level());
    assert!(lines[0].ends_with(", battery FULL"));
}

#[tokio::test]
async fn test_log_endpoint() {
    let state = new_state("Hello", ServerConfig::default().with_battery_status(true));
    let before = expected_png(&state);

    for body in [
        Body::empty(),
        Body::from("not json at all"),
        Body::from(r#"{"logMessage":"woke up","deviceStatusStamp":{"battery_voltage":3.9}}"#),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri("/api/log")
            .body(body)
            .unwrap();
        let response = app_with(state.clone(), LAN_PEER)
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], LOG_ACK.as_bytes());
    }

    // Telemetry is only logged; it never reaches the display
    assert_eq!(state.battery.voltage(), None);
    assert_eq!(state.battery_level(), None);
    assert_eq!(state.display.snapshot().lines, vec!["Hello"]);
    let (_, _, image) = get(app_with(state, LAN_PEER), "/image").await;
    assert_eq!(image, before);
}

#[tokio::test]
async fn test_foreign_origin_denied_everywhere() {
    let state = new_state("Hello", ServerConfig::default());

    for uri in ["/image", "/api/display", "/api/log", "/", "/nope"] {
        let (status, headers, body) = get(app_with(state.clone(), WAN_PEER), uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body, b"Not allowed!");
    }

    // Handlers never ran, so no battery reading was taken
    let request = Request::builder()
        .uri("/api/display")
        .header("Battery-Voltage", "4.0")
        .body(Body::empty())
        .unwrap();
    let response = app_with(state.clone(), WAN_PEER)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.battery.voltage(), None);
}

#[tokio::test]
async fn test_configurable_origins() {
    let config = ServerConfig::default().with_origins(OriginPolicy::new(["203.0.113."]));
    let state = new_state("Hello", config);

    let (status, _, _) = get(app_with(state.clone(), WAN_PEER), "/api/display").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get(app_with(state, LAN_PEER), "/api/display").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_path_allowed_origin() {
    let state = new_state("Hello", ServerConfig::default());
    let (status, _, _) = get(app_with(state, LAN_PEER), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//! HTTP surface for the device.
//!
//! | Endpoint | Method | Purpose |
//! |----------|--------|---------|
//! | `/image` | GET | The current frame as PNG or BMP |
//! | `/api/display` | GET | Image URL, filename and refresh hint |
//! | `/api/log` | POST | Device telemetry, logged and acknowledged |
//!
//! Every request first passes the [origin filter](crate::access).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use chrono::Datelike;
use tower_http::trace::TraceLayer;

use crate::access::filter_origin;
use crate::battery::{BatteryLevel, BatteryMonitor};
use crate::byos::{DeviceInfo, DisplayResponse, LogEntry};
use crate::config::ServerConfig;
use crate::display::{DisplayState, DisplayText};
use crate::error::Error;
use crate::render::Renderer;
use crate::MAX_IMAGE_SIZE;

/// Body of the acknowledgement for `POST /api/log`.
pub const LOG_ACK: &str = "Quiet, please";

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppState {
    /// Current display text
    pub display: DisplayState,
    /// Font and layout, loaded once
    pub renderer: Renderer,
    /// Last battery reading from the device
    pub battery: BatteryMonitor,
    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Build the state, loading the embedded font.
    ///
    /// Fails only if the font cannot be parsed, in which case the server
    /// cannot serve anything.
    pub fn new(display: DisplayState, config: ServerConfig) -> Result<Self, Error> {
        let renderer = Renderer::embedded(config.render)?;
        Ok(Self {
            display,
            renderer,
            battery: BatteryMonitor::new(),
            config,
        })
    }

    /// Battery status for the header row, if enabled and known.
    pub fn battery_level(&self) -> Option<BatteryLevel> {
        if self.config.battery_status {
            self.battery.level(&self.config.battery_scale)
        } else {
            None
        }
    }

    /// Render and encode the current display text.
    pub fn render_current(&self) -> Result<Vec<u8>, Error> {
        let snapshot = self.display.snapshot();
        let lines = frame_lines(&snapshot, self.battery_level());
        self.renderer.render(&lines).encode(self.config.format)
    }

    /// Filename that changes exactly when the display text changes.
    pub fn filename(&self, text: &DisplayText) -> String {
        format!("screen-{}.{}", text.version(), self.config.format.extension())
    }

    fn image_url(&self, headers: &HeaderMap) -> String {
        match &self.config.base_url {
            Some(base) => format!("{}/image", base),
            None => {
                let host = headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| self.config.listen.to_string());
                format!("http://{}/image", host)
            }
        }
    }

    fn record_battery(&self, device: &DeviceInfo) {
        if let Some(voltage) = device.battery_voltage {
            self.battery.record(voltage);
        }
    }
}

/// Header row: time and day of the last update, ISO week, and optionally
/// battery status.
///
/// Derived from the text's own timestamp, so an unchanged text always
/// renders the same frame.
pub fn header_line(text: &DisplayText, battery: Option<BatteryLevel>) -> String {
    let updated = text.last_updated;
    let mut line = format!(
        "{}, week {}",
        updated.format("%H:%M %A"),
        updated.iso_week().week()
    );
    if let Some(level) = battery {
        line.push_str(&format!(", battery {}", level));
    }
    line
}

/// Header row followed by the text lines.
pub fn frame_lines(text: &DisplayText, battery: Option<BatteryLevel>) -> Vec<String> {
    std::iter::once(header_line(text, battery))
        .chain(text.lines.iter().cloned())
        .collect()
}

/// Build the router with the origin filter in front.
pub fn router(state: Arc<AppState>) -> Router {
    let origins = Arc::new(state.config.origins.clone());

    Router::new()
        .route("/image", get(image))
        .route("/api/display", get(display))
        .route("/api/log", post(log))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(origins, filter_origin))
}

/// Listen on the configured address until ctrl-c.
pub async fn serve(state: Arc<AppState>) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(state.config.listen)
        .await
        .map_err(|e| Error::Io(format!("Failed to bind {}: {}", state.config.listen, e)))?;
    let local = listener.local_addr()?;
    tracing::info!(
        address = %format!("http://{}", local),
        format = %state.config.format,
        refresh = %state.config.refresh,
        "Listening"
    );

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// GET /image - the current frame
async fn image(State(state): State<Arc<AppState>>, device: DeviceInfo) -> Response {
    state.record_battery(&device);

    let worker = Arc::clone(&state);
    let encoded = match tokio::task::spawn_blocking(move || worker.render_current()).await {
        Ok(result) => result,
        Err(e) => Err(Error::Encode(format!("Render task failed: {}", e))),
    };

    let data = match encoded {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Failed to produce image data");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if data.len() > MAX_IMAGE_SIZE {
        tracing::warn!(
            bytes = data.len(),
            max = MAX_IMAGE_SIZE,
            "Image exceeds firmware size limit"
        );
    }
    tracing::info!(bytes = data.len(), "Image data sent");

    let content_type = HeaderValue::from_static(state.config.format.content_type());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(data.len())),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        data,
    )
        .into_response()
}

/// GET /api/display - where to get the image and when to ask again
async fn display(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    device: DeviceInfo,
) -> Response {
    state.record_battery(&device);
    tracing::debug!(
        device = %device.mac_address,
        firmware = ?device.firmware_version,
        rssi = ?device.rssi,
        battery = ?device.battery_voltage,
        device_refresh = ?device.refresh_rate,
        "Display poll"
    );

    let snapshot = state.display.snapshot();
    let response = DisplayResponse::new(state.image_url(&headers), state.filename(&snapshot))
        .with_refresh_rate(state.config.refresh.refresh_rate())
        .with_special_function(state.config.special_function);

    match serde_json::to_vec(&response).map_err(Error::from) {
        Ok(body) => {
            tracing::debug!(filename = %response.filename, refresh_rate = response.refresh_rate, "Serving display data");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to give a viable display response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Server blew up",
            )
                .into_response()
        }
    }
}

/// POST /api/log - device telemetry, logged and otherwise ignored
async fn log(body: Bytes) -> Response {
    if body.is_empty() {
        tracing::debug!("Empty device log");
    } else {
        match serde_json::from_slice::<LogEntry>(&body) {
            Ok(entry) => {
                let stamp = entry.device_status_stamp.as_ref();
                tracing::info!(
                    message = ?entry.log_message,
                    battery = ?stamp.and_then(|s| s.battery_voltage),
                    rssi = ?stamp.and_then(|s| s.wifi_rssi_level),
                    firmware = ?stamp.and_then(|s| s.current_fw_version.as_deref()),
                    device_refresh = ?stamp.and_then(|s| s.refresh_rate),
                    "Device log"
                );
            }
            Err(_) => {
                tracing::debug!(body = %String::from_utf8_lossy(&body), "Device log");
            }
        }
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        LOG_ACK,
    )
        .into_response()
}

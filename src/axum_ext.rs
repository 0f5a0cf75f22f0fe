//! Axum extractor for device headers.
//!
//! # Example
//!
//! ```rust,ignore
//! use framed::DeviceInfo;
//!
//! async fn handler(device: DeviceInfo) {
//!     tracing::info!("Poll from {}", device.mac_address);
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};

use crate::DeviceInfo;

/// Extract device info from request headers.
///
/// Every header is optional. A header that is present but unparseable is
/// logged and treated as absent; it never rejects the request.
impl<S> FromRequestParts<S> for DeviceInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let mac_address = header_str(headers, "ID")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let battery_voltage = header_str(headers, "Battery-Voltage").and_then(|s| {
            match s.trim().parse::<f32>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    tracing::warn!(value = s, "Ignoring malformed Battery-Voltage header");
                    None
                }
            }
        });

        let firmware_version = header_str(headers, "FW-Version").map(|s| s.to_string());
        let rssi = header_str(headers, "RSSI").and_then(|s| s.trim().parse().ok());
        let refresh_rate = header_str(headers, "Refresh-Rate").and_then(|s| s.trim().parse().ok());

        Ok(DeviceInfo {
            mac_address,
            battery_voltage,
            firmware_version,
            rssi,
            refresh_rate,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

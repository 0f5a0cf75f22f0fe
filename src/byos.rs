//! BYOS (Bring Your Own Server) protocol types.
//!
//! These types match what the TRMNL firmware sends and expects.
//! See: <https://github.com/usetrmnl/trmnl-firmware>

use serde::{Deserialize, Serialize};

/// Device information extracted from HTTP headers.
///
/// The firmware sends device info in request headers:
/// - `ID`: MAC address
/// - `Battery-Voltage`: Battery voltage as float (e.g., "4.2")
/// - `FW-Version`: Firmware version string
/// - `RSSI`: WiFi signal strength in dBm
/// - `Refresh-Rate`: Current refresh rate in seconds
///
/// Handlers take it as an extractor; see `axum_ext`.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Device MAC address (from `ID` header)
    pub mac_address: String,

    /// Battery voltage in volts (from `Battery-Voltage` header)
    pub battery_voltage: Option<f32>,

    /// Firmware version (from `FW-Version` header)
    pub firmware_version: Option<String>,

    /// WiFi signal strength in dBm (from `RSSI` header)
    pub rssi: Option<i32>,

    /// Current refresh rate in seconds (from `Refresh-Rate` header)
    pub refresh_rate: Option<u32>,
}

/// Firmware action requested alongside a display response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialFunction {
    /// Do nothing special
    None,
    /// Flash the display to identify the device
    Identify,
    /// Sleep until the next refresh (default)
    #[default]
    Sleep,
    /// Enter WiFi setup
    AddWifi,
    /// Restart the playlist
    RestartPlaylist,
    /// Show the previous screen
    Rewind,
    /// Send the current screen to the owner
    SendToMe,
}

impl std::str::FromStr for SpecialFunction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(SpecialFunction::None),
            "identify" => Ok(SpecialFunction::Identify),
            "sleep" => Ok(SpecialFunction::Sleep),
            "add_wifi" => Ok(SpecialFunction::AddWifi),
            "restart_playlist" => Ok(SpecialFunction::RestartPlaylist),
            "rewind" => Ok(SpecialFunction::Rewind),
            "send_to_me" => Ok(SpecialFunction::SendToMe),
            other => Err(crate::Error::Config(format!(
                "Unknown special function '{}'",
                other
            ))),
        }
    }
}

/// Response for GET /api/display.
///
/// The firmware uses these fields to:
/// - Fetch the image from `image_url`
/// - Detect new images by comparing `filename`
/// - Decide when to poll again from `refresh_rate`
///
/// # Example
///
/// ```
/// use framed::DisplayResponse;
///
/// let response = DisplayResponse::new("http://192.168.1.2:7100/image", "screen-1-0.png");
/// let json = serde_json::to_string(&response).unwrap();
/// assert!(json.contains("\"status\":0"));
/// assert!(json.contains("\"special_function\":\"sleep\""));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayResponse {
    /// Status code (0 = success)
    pub status: u32,

    /// Full URL to the display image
    pub image_url: String,

    /// Filename for change detection.
    ///
    /// The firmware compares this to the previous filename and skips the
    /// download when they match.
    pub filename: String,

    /// Seconds until the next poll
    pub refresh_rate: u32,

    /// Whether to reset the device
    pub reset_firmware: bool,

    /// Whether to trigger firmware update
    pub update_firmware: bool,

    /// URL to firmware binary (empty unless `update_firmware` is set)
    pub firmware_url: String,

    /// Extra action for the firmware
    pub special_function: SpecialFunction,
}

impl DisplayResponse {
    /// Create a new display response with a 60 second refresh.
    pub fn new(image_url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            status: 0,
            image_url: image_url.into(),
            filename: filename.into(),
            refresh_rate: 60,
            reset_firmware: false,
            update_firmware: false,
            firmware_url: String::new(),
            special_function: SpecialFunction::default(),
        }
    }

    /// Set custom refresh rate (in seconds).
    #[must_use]
    pub fn with_refresh_rate(mut self, seconds: u32) -> Self {
        self.refresh_rate = seconds;
        self
    }

    /// Set the special function.
    #[must_use]
    pub fn with_special_function(mut self, special_function: SpecialFunction) -> Self {
        self.special_function = special_function;
        self
    }
}

/// Log entry from device (POST /api/log).
///
/// The firmware may send device status and debug logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log message text
    #[serde(default)]
    pub log_message: Option<String>,

    /// Device status snapshot
    #[serde(default)]
    pub device_status_stamp: Option<DeviceStatusStamp>,
}

/// Device status snapshot in log entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceStatusStamp {
    /// Battery voltage
    #[serde(default)]
    pub battery_voltage: Option<f32>,

    /// WiFi signal strength
    #[serde(default)]
    pub wifi_rssi_level: Option<i32>,

    /// Current refresh rate
    #[serde(default)]
    pub refresh_rate: Option<u32>,

    /// Firmware version
    #[serde(default)]
    pub current_fw_version: Option<String>,
}

//! Server configuration.

use std::net::SocketAddr;

use crate::access::OriginPolicy;
use crate::battery::BatteryScale;
use crate::byos::SpecialFunction;
use crate::refresh::RefreshPolicy;
use crate::render::{OutputFormat, RenderConfig};

/// Port the original deployment listens on.
pub const DEFAULT_PORT: u16 = 7100;

/// Everything the server needs besides the display text itself.
///
/// # Example
///
/// ```
/// use framed::{OriginPolicy, OutputFormat, RefreshPolicy, ServerConfig};
///
/// let config = ServerConfig::default()
///     .with_origins(OriginPolicy::new(["10.0.0."]))
///     .with_format(OutputFormat::Bmp)
///     .with_refresh(RefreshPolicy::Fixed(300))
///     .with_battery_status(true);
///
/// assert_eq!(config.format, OutputFormat::Bmp);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (default: 0.0.0.0:7100)
    pub listen: SocketAddr,

    /// Which peers may talk to the server (default: 192.168.*)
    pub origins: OriginPolicy,

    /// Image encoding (default: PNG)
    pub format: OutputFormat,

    /// Refresh hint strategy (default: minute-aligned, at least 10s)
    pub refresh: RefreshPolicy,

    /// Special function sent with every display response (default: sleep)
    pub special_function: SpecialFunction,

    /// Public base URL for the image link, e.g. `http://frame.lan:7100`.
    /// When unset the request's `Host` header is used.
    pub base_url: Option<String>,

    /// Append battery status to the header row (default: false).
    ///
    /// The device refetches the image only when the text changes, so the
    /// marker it shows is as old as the last text update.
    pub battery_status: bool,

    /// Voltage to percentage mapping for the battery status
    pub battery_scale: BatteryScale,

    /// Canvas, font and palette
    pub render: RenderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            origins: OriginPolicy::default(),
            format: OutputFormat::default(),
            refresh: RefreshPolicy::default(),
            special_function: SpecialFunction::default(),
            base_url: None,
            battery_status: false,
            battery_scale: BatteryScale::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set listen address.
    #[must_use]
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Set the origin allow-list.
    #[must_use]
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Set image format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set refresh policy.
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    /// Set special function.
    #[must_use]
    pub fn with_special_function(mut self, special_function: SpecialFunction) -> Self {
        self.special_function = special_function;
        self
    }

    /// Set public base URL. A trailing slash is dropped.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Show or hide battery status in the header row.
    #[must_use]
    pub fn with_battery_status(mut self, enabled: bool) -> Self {
        self.battery_status = enabled;
        self
    }

    /// Set the battery voltage mapping.
    #[must_use]
    pub fn with_battery_scale(mut self, scale: BatteryScale) -> Self {
        self.battery_scale = scale;
        self
    }

    /// Set the render configuration.
    #[must_use]
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

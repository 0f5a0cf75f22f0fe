//! # framed
//!
//! A text display server for [TRMNL](https://usetrmnl.com) e-ink devices
//! running in BYOS (Bring Your Own Server) mode.
//!
//! You type some text; the device polls this server, gets a freshly
//! rendered 800x480 black-and-white image of it, and goes back to sleep.
//!
//! - [`display`]: the current text and the editor-to-server hand-off
//! - [`render`]: text lines to a two-colour bitmap with an embedded font
//! - [`server`]: `/image`, `/api/display` and `/api/log`
//! - [`access`]: same-network origin check in front of everything
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use framed::{display, server, AppState, DisplayState, ServerConfig};
//!
//! # async fn run() -> Result<(), framed::Error> {
//! let state = DisplayState::new("Hello");
//! let (publisher, updates) = display::update_channel();
//! tokio::spawn(display::run_updates(updates, state.clone()));
//!
//! let app = Arc::new(AppState::new(state, ServerConfig::default())?);
//! tokio::spawn(async move {
//!     publisher.publish("Line one\nLine two").await.ok();
//! });
//! server::serve(app).await
//! # }
//! ```
//!
//! ## Display Dimensions
//!
//! TRMNL displays are 800x480 pixels. The header row plus thirteen rows of
//! text fit, each at most 42 characters wide.
//!
//! ## Feature Flags
//!
//! - `schedule` (default) - Time-based refresh rate scheduling (YAML config)

pub mod access;
mod axum_ext;
pub mod battery;
mod byos;
pub mod config;
pub mod display;
pub mod editor;
mod error;
pub mod refresh;
pub mod render;
pub mod server;

#[cfg(feature = "schedule")]
pub mod schedule;

pub use access::OriginPolicy;
pub use battery::{BatteryLevel, BatteryMonitor, BatteryScale};
pub use byos::{DeviceInfo, DeviceStatusStamp, DisplayResponse, LogEntry, SpecialFunction};
pub use config::ServerConfig;
pub use display::{DisplayState, DisplayText, UpdatePublisher};
pub use error::Error;
pub use refresh::RefreshPolicy;
pub use render::{Frame, OutputFormat, RenderConfig, Renderer};
pub use server::AppState;

#[cfg(feature = "schedule")]
pub use schedule::RefreshSchedule;

/// TRMNL display width in pixels
pub const DISPLAY_WIDTH: u32 = 800;

/// TRMNL display height in pixels
pub const DISPLAY_HEIGHT: u32 = 480;

/// Rows of text per frame, header included
pub const MAX_LINES: usize = 14;

/// Characters per row; longer lines are cut
pub const CHARS_PER_LINE: usize = 42;

/// Maximum image size in bytes (firmware rejects larger)
pub const MAX_IMAGE_SIZE: usize = 90 * 1024; // 90KB

/// LiPo battery minimum voltage (0%)
pub const BATTERY_MIN_MV: u32 = 3000;

/// LiPo battery maximum voltage (100%)
pub const BATTERY_MAX_MV: u32 = 4200;

//! `framed` - serve a text file to a TRMNL display.
//!
//! Run with: cargo run -- notes.txt --allow 192.168. --allow 127.0.0.1
//!
//! Then type text on stdin and finish it with a line holding a single `.`
//! to put it on the display. Test with:
//!   curl -H 'ID: test-device' http://localhost:7100/api/display

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use framed::access::OriginPolicy;
use framed::display::{self, DisplayState};
use framed::editor;
use framed::render::Palette;
use framed::{AppState, OutputFormat, RefreshPolicy, ServerConfig, SpecialFunction};

#[derive(Debug, Parser)]
#[command(name = "framed", version, about = "Text display server for TRMNL e-ink devices")]
struct Cli {
    /// File holding the initial display text (created if missing)
    #[arg(default_value = "trmnl.txt")]
    file: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:7100")]
    listen: SocketAddr,

    /// Allowed peer address prefix (repeatable)
    #[arg(long = "allow", value_name = "PREFIX", default_values_t = vec!["192.168.".to_string()])]
    allow: Vec<String>,

    /// Image format: png or bmp
    #[arg(long, default_value = "png")]
    format: OutputFormat,

    /// Refresh hint: fixed:<secs>, minute or minute:<floor>
    #[arg(long, default_value = "minute")]
    refresh: RefreshPolicy,

    /// YAML refresh schedule (overrides --refresh)
    #[cfg(feature = "schedule")]
    #[arg(long, value_name = "YAML")]
    schedule: Option<PathBuf>,

    /// Special function sent to the device
    #[arg(long, default_value = "sleep")]
    special_function: SpecialFunction,

    /// Public base URL for the image link (default: from the Host header)
    #[arg(long)]
    base_url: Option<String>,

    /// Show battery status in the header row
    #[arg(long)]
    battery: bool,

    /// White text on black instead of black on white
    #[arg(long)]
    invert: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::default()
            .with_listen(self.listen)
            .with_origins(OriginPolicy::new(self.allow.iter().cloned()))
            .with_format(self.format)
            .with_refresh(self.refresh.clone())
            .with_special_function(self.special_function)
            .with_battery_status(self.battery);

        #[cfg(feature = "schedule")]
        if let Some(path) = &self.schedule {
            let schedule = framed::RefreshSchedule::load(path)?;
            tracing::info!(
                rules = schedule.schedule.len(),
                default = schedule.default_refresh_rate,
                "Loaded refresh schedule"
            );
            config = config.with_refresh(RefreshPolicy::Scheduled(schedule));
        }

        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        if self.invert {
            let render = config.render.with_palette(Palette::WHITE_ON_BLACK);
            config = config.with_render(render);
        }
        Ok(config)
    }
}

/// Read the initial text, creating an empty file if there is none.
fn load_initial_text(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(path)
                .with_context(|| format!("Could not create {}", path.display()))?;
            tracing::info!(file = %path.display(), "Created empty text file");
            Ok(String::new())
        }
        Err(e) => Err(e).with_context(|| format!("Something weird about {}", path.display())),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug,hyper=info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.server_config()?;
    let initial = load_initial_text(&cli.file)?;

    let state = DisplayState::new(&initial);
    let app = Arc::new(AppState::new(state.clone(), config).context("Cannot load display font")?);

    let (publisher, updates) = display::update_channel();
    tokio::spawn(display::run_updates(updates, state));

    std::thread::spawn(move || {
        tracing::info!("Type text, end with a line holding a single '.' to publish");
        match editor::run_line_editor(std::io::stdin().lock(), publisher) {
            Ok(published) => tracing::info!(published, "Editor input closed"),
            Err(e) => tracing::warn!(error = %e, "Editor stopped"),
        }
    });

    framed::server::serve(app).await?;
    Ok(())
}

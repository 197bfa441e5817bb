use anyhow::Result;
use clap::Parser;
use launch_control::domain::settings::SettingsService;
use launch_control::infrastructure::logging;
use launch_control::presentation::{LaunchApp, LinkMode};
use std::path::PathBuf;
use tracing::info;

/// Remote launcher controller over a serial text link.
#[derive(Parser, Debug)]
#[command(name = "launch-control", version, about)]
struct Args {
    /// host:port of a TCP serial bridge (overrides the settings file)
    #[arg(long)]
    bridge: Option<String>,

    /// Run without hardware, echoing outbound frames back to the session
    #[arg(long, conflicts_with = "bridge")]
    loopback: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validation code for this session
    #[arg(long)]
    code: Option<String>,

    /// Log filter, e.g. "debug" or "launch_control=trace"
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = match args.config {
        Some(path) => SettingsService::with_path(path),
        None => SettingsService::new()?,
    };
    {
        let s = settings.get_mut();
        if let Some(code) = args.code {
            s.validation_code = code;
        }
        if let Some(level) = args.log_level {
            s.log_settings.level = level;
        }
        if args.bridge.is_some() {
            s.link.bridge_address = args.bridge;
        }
    }

    let _log_guard = logging::init_logger(&settings.get().log_settings)?;
    info!("Starting Launch Control");

    let mode = match &settings.get().link.bridge_address {
        Some(address) if !args.loopback => LinkMode::Bridge(address.clone()),
        _ => LinkMode::Loopback,
    };

    let mut app = LaunchApp::start(settings, mode).await?;
    let result = app.run_console().await;
    app.shutdown().await;

    info!("Application exiting");
    result
}

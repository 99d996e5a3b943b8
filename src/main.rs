use anyhow::Context;
use clap::Parser;
use tracing::info;

use drip_butler::app::App;
use drip_butler::embedded::configuration::HardwareMode;
use drip_butler::embedded::platform::SystemProbe;
use drip_butler::logging;
use drip_butler::schedule::settings::{Settings, DEFAULT_SETTINGS_PATH};

#[derive(Parser, Debug)]
#[command(name = "drip-butler", version, about = "Keeps potted plants watered")]
struct Args {
    /// Settings file (JSON). Missing files fall back to defaults and DRIP_* variables.
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: String,

    /// Override the hardware backend selection.
    #[arg(short, long, value_enum)]
    mode: Option<HardwareMode>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.settings)
        .with_context(|| format!("Failed to load settings from {}", args.settings))?;
    if let Some(mode) = args.mode {
        settings.hardware_mode = mode;
    }
    logging::init(&settings.logging)?;

    info!("Drip butler starting ...");
    App::new(settings)
        .run(&SystemProbe)
        .await
        .context("Drip butler failed")?;
    info!("Exiting drip butler ...");
    Ok(())
}

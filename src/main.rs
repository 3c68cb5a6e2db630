mod app;
mod domain;
mod error;
mod infrastructure;
mod robot;

use anyhow::Context;
use domain::settings::SettingsService;
use infrastructure::logging;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().context("failed to load settings")?;
    let settings = settings_service.get().clone();

    // Keep the guard alive so file logs are flushed on exit
    let _log_guard = logging::init_logger(&settings.log_settings)?;
    info!(
        "Starting BLE robot drive (settings: {})",
        settings_service.path().display()
    );
    for problem in settings_service.problems() {
        warn!("{}", problem);
    }

    app::run(&settings).await
}

mod domain;
mod infrastructure;
mod presentation;

use crate::domain::settings::SettingsService;
use crate::presentation::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;

    let _logging_guard = infrastructure::logging::init_logger(&settings.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!(
        "Starting gatt_mouse (settings: {})",
        settings.path().display()
    );

    let stdin = std::io::stdin();
    let mut app = App::new(settings, stdin.lock(), std::io::stdout());
    app.run().await
}

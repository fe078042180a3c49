use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use sirambro::config::AppConfig;
use sirambro::session::SessionHandle;
use sirambro::ui::SiramBroUI;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::default_path()?;
    let config = AppConfig::load_or_create(&config_path).await?;
    info!("Using broker {}", config.mqtt);

    let cancel = CancellationToken::new();
    let handle = SessionHandle::spawn(&config.mqtt, cancel.clone())?;

    info!("Starting UI");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title(config.ui.title.clone())
        .with_inner_size([480.0, 640.0])
        .with_fullscreen(config.ui.fullscreen);

    let ui_config = config.ui.clone();
    let view = handle.view.clone();
    let commands = handle.commands.clone();
    let diagnostics = handle.diagnostics();
    let ui_result = eframe::run_native(
        &config.ui.title,
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(SiramBroUI::new(
                cc,
                view,
                commands,
                diagnostics,
                &ui_config,
            )))
        }),
    );

    info!("UI closed, shutting down");
    handle.shutdown().await;

    ui_result.map_err(|e| eyre!("UI failed: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

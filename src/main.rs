use rpi_formatter::config::Settings;
use rpi_formatter::ui::RpiFormatter;
use rpi_formatter::{logging, style, utils};
use tracing::{error, info};

pub fn main() -> iced::Result {
    let (settings, settings_error) = match Settings::load() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    // Keep the guard alive so the log file is flushed on exit
    let _log_guard = logging::init(&settings);

    if let Some(e) = settings_error {
        error!("Failed to load settings, using defaults: {:#}", e);
    }
    info!("Starting rpi-formatter {}", env!("CARGO_PKG_VERSION"));
    info!("{}", utils::get_elevation_status());

    iced::application(
        move || RpiFormatter::new(settings.clone()),
        RpiFormatter::update,
        RpiFormatter::view,
    )
    .title(RpiFormatter::title)
    .subscription(RpiFormatter::subscription)
    .window_size(iced::Size::new(560f32, 620f32))
    .theme(|_: &RpiFormatter| style::custom_theme())
    .centered()
    .run()
}

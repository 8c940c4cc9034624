// Library interface for rpi-formatter
//
// The disk orchestration core is usable without the GUI; the iced front end
// in `ui` drives it from the binary.

pub mod config;
pub mod disk;
pub mod logging;
pub mod models;
pub mod style;
pub mod ui;
pub mod utils;

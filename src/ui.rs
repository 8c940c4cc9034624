pub mod application;
pub mod controls;

// Workflow modules
pub mod format_workflow;
pub mod volume_selection;

// Unified message system
pub mod messages;

pub use application::RpiFormatter;

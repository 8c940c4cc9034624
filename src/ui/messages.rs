use crate::ui::{format_workflow::FormatMessage, volume_selection::VolumeMessage};

#[derive(Debug, Clone)]
pub enum Message {
    // App-level messages
    ShowError(String),
    ErrorDialogClosed,
    DismissError,
    Quit,

    // Module-specific message variants
    VolumeSelection(VolumeMessage),
    Format(FormatMessage),
}

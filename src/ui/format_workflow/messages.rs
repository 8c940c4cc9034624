use std::path::PathBuf;
use std::sync::Arc;

use crate::disk::{CancelHandle, FormatError, FormatOutcome, OutputChunk};
use crate::models::DeviceIdentifier;

#[derive(Debug, Clone)]
pub enum FormatMessage {
    SelectDiskImage,
    DiskImageSelected(Option<PathBuf>),
    DiskImagePathChanged(String),
    StartFormat,
    Started {
        device: DeviceIdentifier,
        cancel: CancelHandle,
    },
    Output(OutputChunk),
    Finished(Result<FormatOutcome, Arc<FormatError>>),
    Cancel,
    Tick, // Advance the activity bar
}

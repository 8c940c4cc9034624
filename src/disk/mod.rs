// Disk orchestration module with platform abstraction
//
// Volume listing, device resolution and formatting are all delegated to the
// operating system. This module wires those services together behind small
// traits so the flow can be driven from the UI and exercised in tests.

pub mod arbitration;
pub mod format;
pub mod volumes;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// Disk arbitration is only available on macOS
#[cfg(target_os = "macos")]
mod macos;

pub use arbitration::{
    ArbitratedDisk, ArbitrationSession, DiskArbiter, ResolveError, resolve_device,
};
pub use format::{
    CancelHandle, FormatError, FormatJob, FormatOrchestrator, FormatOutcome, Formatter,
    OutputChunk, OutputStream, erase_arguments,
};
pub use volumes::{MountTable, MountedVolume, SystemMountTable, VolumeLister};
pub use watcher::{VolumeEvent, VolumeWatcher, WatchHandle, diff_snapshots};

#[cfg(target_os = "macos")]
pub use macos::{DiskArbitrationFramework as SystemArbiter, DiskArbitrationSession};

#[cfg(not(target_os = "macos"))]
pub use arbitration::UnsupportedArbiter as SystemArbiter;

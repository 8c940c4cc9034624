use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use rs_drivelist::device::DeviceDescriptor;
use tracing::{debug, info, warn};

use crate::models::{VolumeEntry, VolumeIcon};

/// A mounted filesystem as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolume {
    /// Mount point, e.g. `/Volumes/BOOT`
    pub path: PathBuf,
    /// Volume name (last path component of the mount point)
    pub name: String,
    pub removable: bool,
    pub ejectable: bool,
    /// Backing device as reported by the enumeration service, if any
    pub device: Option<String>,
    pub icon: Option<VolumeIcon>,
}

impl MountedVolume {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            name,
            removable: false,
            ejectable: false,
            device: None,
            icon: None,
        }
    }
}

/// Source of the live mount table.
///
/// Implementations are queried on every use; nothing is cached between calls.
pub trait MountTable {
    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>>;
}

impl<T: MountTable + ?Sized> MountTable for Arc<T> {
    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>> {
        (**self).mounted_volumes()
    }
}

/// Mount table backed by the platform drive list
#[derive(Debug, Clone, Default)]
pub struct SystemMountTable;

fn icon_for(drive: &DeviceDescriptor) -> VolumeIcon {
    if drive.isCard {
        VolumeIcon::SdCard
    } else if drive.isUSB {
        VolumeIcon::Usb
    } else if drive.isRemovable {
        VolumeIcon::Removable
    } else {
        VolumeIcon::Drive
    }
}

impl MountTable for SystemMountTable {
    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>> {
        let drives = rs_drivelist::drive_list()
            .map_err(|e| anyhow!("Failed to enumerate drives: {}", e))?;
        debug!("Found {} drives with rs-drivelist", drives.len());

        let mut volumes = Vec::new();
        for drive in drives {
            let icon = icon_for(&drive);
            let ejectable = drive.isRemovable || drive.isUSB || drive.isCard;
            for mountpoint in &drive.mountpoints {
                let mut volume = MountedVolume::new(&mountpoint.path);
                volume.removable = drive.isRemovable;
                volume.ejectable = ejectable;
                volume.device = Some(drive.device.clone());
                volume.icon = Some(icon);
                volumes.push(volume);
            }
        }

        Ok(volumes)
    }
}

/// True when the path's first component below the root equals `removable_root`.
pub fn is_under_removable_root(path: &Path, removable_root: &str) -> bool {
    let mut components = path.components();
    if components.next() != Some(Component::RootDir) {
        return false;
    }
    matches!(components.next(), Some(Component::Normal(first)) if first == removable_root)
}

/// Produces the candidate volume list for the volume picker
#[derive(Debug, Clone)]
pub struct VolumeLister<M> {
    table: M,
    removable_root: String,
}

impl<M: MountTable> VolumeLister<M> {
    pub fn new(table: M, removable_root: impl Into<String>) -> Self {
        Self {
            table,
            removable_root: removable_root.into(),
        }
    }

    pub fn table(&self) -> &M {
        &self.table
    }

    pub fn removable_root(&self) -> &str {
        &self.removable_root
    }

    /// List mounted volumes under the removable-media root, in enumeration
    /// order. An enumeration failure is reported as an empty list.
    pub fn list_volumes(&self) -> Vec<VolumeEntry> {
        let mounted = match self.table.mounted_volumes() {
            Ok(mounted) => mounted,
            Err(e) => {
                warn!("Failed to enumerate mounted volumes: {:#}", e);
                return Vec::new();
            }
        };

        let entries: Vec<VolumeEntry> = mounted
            .into_iter()
            .filter(|v| is_under_removable_root(&v.path, &self.removable_root))
            .map(|v| VolumeEntry {
                display_path: v.path.to_string_lossy().to_string(),
                icon: v.icon,
            })
            .collect();

        info!("Listed {} candidate volumes", entries.len());
        entries
    }
}

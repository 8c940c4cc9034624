use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::volumes::MountTable;
use crate::models::DeviceIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Failed to create disk arbitration session.")]
    SessionUnavailable,
    #[error("Failed to obtain volume identifier for {path}.")]
    DiskUnavailable { path: String },
    #[error("Failed to read the device name of {path}.")]
    DeviceNameUnavailable { path: String },
}

/// A disk handle produced by an arbitration session for one mounted volume
#[derive(Debug, Clone)]
pub struct ArbitratedDisk {
    volume: PathBuf,
    raw_name: Option<Vec<u8>>,
}

impl ArbitratedDisk {
    /// `raw_name` is `None` when the service returned no name pointer.
    pub fn new(volume: impl Into<PathBuf>, raw_name: Option<Vec<u8>>) -> Self {
        Self {
            volume: volume.into(),
            raw_name,
        }
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }

    /// Decode the device name as UTF-8 text.
    pub fn device_name(&self) -> Result<DeviceIdentifier, ResolveError> {
        let unavailable = || ResolveError::DeviceNameUnavailable {
            path: self.volume.to_string_lossy().to_string(),
        };

        let raw = self.raw_name.as_deref().ok_or_else(unavailable)?;
        let name = std::str::from_utf8(raw).map_err(|_| unavailable())?;
        DeviceIdentifier::parse(name).ok_or_else(unavailable)
    }
}

/// An open connection to the OS disk arbitration service.
///
/// Dropping the session releases it.
pub trait ArbitrationSession {
    fn disk_for_volume(&self, volume: &Path) -> Option<ArbitratedDisk>;
}

/// Entry point to the OS disk arbitration service
pub trait DiskArbiter {
    type Session: ArbitrationSession;

    fn open_session(&self) -> Result<Self::Session, ResolveError>;
}

/// Map a user-visible volume path to its device identifier.
///
/// The mapping is derived from the live mount table on every call.
pub fn resolve_device<M, A>(
    display_path: &str,
    mounts: &M,
    arbiter: &A,
) -> Result<DeviceIdentifier, ResolveError>
where
    M: MountTable + ?Sized,
    A: DiskArbiter + ?Sized,
{
    let session = arbiter.open_session()?;
    debug!("Opened disk arbitration session to resolve {}", display_path);

    let mounted = mounts.mounted_volumes().unwrap_or_else(|e| {
        warn!("Failed to enumerate mounted volumes: {:#}", e);
        Vec::new()
    });

    let disk_unavailable = || ResolveError::DiskUnavailable {
        path: display_path.to_string(),
    };

    let volume = mounted
        .iter()
        .find(|v| v.path == Path::new(display_path))
        .ok_or_else(disk_unavailable)?;

    let disk = session
        .disk_for_volume(&volume.path)
        .ok_or_else(disk_unavailable)?;
    let device = disk.device_name()?;

    info!("Resolved {} to device {}", display_path, device);
    Ok(device)
}

/// Arbiter for platforms without a disk arbitration back end
#[derive(Debug, Clone, Default)]
pub struct UnsupportedArbiter;

#[derive(Debug)]
pub enum NoSession {}

impl ArbitrationSession for NoSession {
    fn disk_for_volume(&self, _volume: &Path) -> Option<ArbitratedDisk> {
        match *self {}
    }
}

impl DiskArbiter for UnsupportedArbiter {
    type Session = NoSession;

    fn open_session(&self) -> Result<Self::Session, ResolveError> {
        Err(ResolveError::SessionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::testing::{FakeArbiter, FakeMountTable};

    #[test]
    fn test_resolves_mounted_volume() {
        let mounts = FakeMountTable::with_paths(&["/", "/Volumes/BOOT"]);
        let arbiter = FakeArbiter::with_disk("/Volumes/BOOT", "disk3s1");

        let device = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap();
        assert_eq!(device.as_str(), "disk3s1");
    }

    #[test]
    fn test_unmounted_path_is_disk_unavailable() {
        // The arbiter knows the path but the mount table no longer lists it
        let mounts = FakeMountTable::with_paths(&["/", "/Volumes/Other"]);
        let arbiter = FakeArbiter::with_disk("/Volumes/BOOT", "disk3s1");

        let err = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap_err();
        assert_eq!(
            err,
            ResolveError::DiskUnavailable {
                path: "/Volumes/BOOT".to_string()
            }
        );
    }

    #[test]
    fn test_volume_without_disk_is_disk_unavailable() {
        let mounts = FakeMountTable::with_paths(&["/Volumes/BOOT"]);
        let arbiter = FakeArbiter::default();

        let err = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap_err();
        assert!(matches!(err, ResolveError::DiskUnavailable { .. }));
    }

    #[test]
    fn test_session_failure_comes_first() {
        let mounts = FakeMountTable::with_paths(&["/Volumes/BOOT"]);
        let arbiter = FakeArbiter::unavailable();

        let err = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap_err();
        assert_eq!(err, ResolveError::SessionUnavailable);
        assert_eq!(mounts.calls(), 0);
    }

    #[test]
    fn test_missing_or_undecodable_name() {
        let mounts = FakeMountTable::with_paths(&["/Volumes/A", "/Volumes/B", "/Volumes/C"]);
        let mut arbiter = FakeArbiter::default();
        arbiter.disks.insert(PathBuf::from("/Volumes/A"), None);
        arbiter
            .disks
            .insert(PathBuf::from("/Volumes/B"), Some(vec![0x64, 0xff, 0xfe]));
        arbiter
            .disks
            .insert(PathBuf::from("/Volumes/C"), Some(b"-force".to_vec()));

        for path in ["/Volumes/A", "/Volumes/B", "/Volumes/C"] {
            let err = resolve_device(path, &mounts, &arbiter).unwrap_err();
            assert_eq!(
                err,
                ResolveError::DeviceNameUnavailable {
                    path: path.to_string()
                }
            );
        }
    }

    #[test]
    fn test_mount_table_failure_is_disk_unavailable() {
        let mounts = FakeMountTable::failing();
        let arbiter = FakeArbiter::with_disk("/Volumes/BOOT", "disk3s1");

        let err = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap_err();
        assert!(matches!(err, ResolveError::DiskUnavailable { .. }));
    }

    #[test]
    fn test_unsupported_arbiter_has_no_session() {
        let mounts = FakeMountTable::with_paths(&["/Volumes/BOOT"]);
        let err = resolve_device("/Volumes/BOOT", &mounts, &UnsupportedArbiter).unwrap_err();
        assert_eq!(err, ResolveError::SessionUnavailable);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_system_arbiter_has_no_session_off_macos() {
        let mounts = FakeMountTable::with_paths(&["/Volumes/BOOT"]);
        let arbiter = crate::disk::SystemArbiter::default();
        let err = resolve_device("/Volumes/BOOT", &mounts, &arbiter).unwrap_err();
        assert_eq!(err, ResolveError::SessionUnavailable);
    }
}

// In-memory stand-ins for the OS services used by the disk module tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};

use super::arbitration::{ArbitratedDisk, ArbitrationSession, DiskArbiter, ResolveError};
use super::volumes::{MountTable, MountedVolume};

pub struct FakeMountTable {
    volumes: Mutex<Option<Vec<MountedVolume>>>,
    calls: AtomicUsize,
}

impl FakeMountTable {
    pub fn new(volumes: Vec<MountedVolume>) -> Self {
        Self {
            volumes: Mutex::new(Some(volumes)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_paths(paths: &[&str]) -> Self {
        Self::new(paths.iter().map(|p| MountedVolume::new(*p)).collect())
    }

    pub fn failing() -> Self {
        Self {
            volumes: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, volumes: Vec<MountedVolume>) {
        *self.volumes.lock().unwrap() = Some(volumes);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MountTable for FakeMountTable {
    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.volumes
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("mount table unavailable"))
    }
}

/// Disk arbitration fake: maps volume paths to raw device-name bytes.
/// A path mapped to `None` produces a disk whose name pointer is unavailable.
#[derive(Default)]
pub struct FakeArbiter {
    pub session_unavailable: bool,
    pub disks: HashMap<PathBuf, Option<Vec<u8>>>,
    pub sessions_opened: AtomicUsize,
}

impl FakeArbiter {
    pub fn with_disk(path: &str, name: &str) -> Self {
        let mut arbiter = Self::default();
        arbiter
            .disks
            .insert(PathBuf::from(path), Some(name.as_bytes().to_vec()));
        arbiter
    }

    pub fn unavailable() -> Self {
        Self {
            session_unavailable: true,
            ..Self::default()
        }
    }
}

pub struct FakeSession {
    disks: HashMap<PathBuf, Option<Vec<u8>>>,
}

impl DiskArbiter for FakeArbiter {
    type Session = FakeSession;

    fn open_session(&self) -> Result<Self::Session, ResolveError> {
        if self.session_unavailable {
            return Err(ResolveError::SessionUnavailable);
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            disks: self.disks.clone(),
        })
    }
}

impl ArbitrationSession for FakeSession {
    fn disk_for_volume(&self, volume: &Path) -> Option<ArbitratedDisk> {
        self.disks
            .get(volume)
            .map(|name| ArbitratedDisk::new(volume, name.clone()))
    }
}

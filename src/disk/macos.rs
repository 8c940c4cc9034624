use std::ffi::CStr;
use std::path::Path;

use objc2_core_foundation::{CFRetained, CFURL};
use objc2_disk_arbitration::{DADisk, DASession};
use tracing::{debug, error};

use super::arbitration::{ArbitratedDisk, ArbitrationSession, DiskArbiter, ResolveError};

/// DiskArbitration.framework back end
#[derive(Debug, Clone, Default)]
pub struct DiskArbitrationFramework;

/// Retained `DASession`; released when dropped
pub struct DiskArbitrationSession {
    session: CFRetained<DASession>,
}

impl DiskArbiter for DiskArbitrationFramework {
    type Session = DiskArbitrationSession;

    fn open_session(&self) -> Result<Self::Session, ResolveError> {
        match unsafe { DASession::new(None) } {
            Some(session) => Ok(DiskArbitrationSession { session }),
            None => {
                error!("DASessionCreate returned no session");
                Err(ResolveError::SessionUnavailable)
            }
        }
    }
}

impl ArbitrationSession for DiskArbitrationSession {
    fn disk_for_volume(&self, volume: &Path) -> Option<ArbitratedDisk> {
        let url = CFURL::from_directory_path(volume)?;
        let disk = unsafe { DADisk::from_volume_path(None, &self.session, &url) }?;

        let name = unsafe { disk.bsd_name() };
        let raw_name = if name.is_null() {
            None
        } else {
            // The name is owned by the disk object, copy it before the disk is released
            Some(unsafe { CStr::from_ptr(name) }.to_bytes().to_vec())
        };

        debug!("DiskArbitration returned a disk for {}", volume.display());
        Some(ArbitratedDisk::new(volume, raw_name))
    }
}

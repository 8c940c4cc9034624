use crate::disk::VolumeEvent;
use crate::models::VolumeEntry;

use super::VolumeOption;

#[derive(Debug, Clone)]
pub enum VolumeMessage {
    RefreshVolumes,
    VolumesLoaded {
        generation: u64,
        volumes: Vec<VolumeEntry>,
    },
    SelectVolume(VolumeOption),
    VolumeEvent(VolumeEvent),
}

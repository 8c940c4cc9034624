use std::sync::Arc;

use iced::Task;
use tracing::{debug, error, info};

use super::{VolumeMessage, VolumeSelectionState};
use crate::disk::{DiskArbiter, Formatter, MountTable};
use crate::ui::messages::Message;

/// List volumes on the blocking pool and report the result tagged with `generation`
pub fn refresh<M, A>(formatter: &Arc<Formatter<M, A>>, generation: u64) -> Task<Message>
where
    M: MountTable + Send + Sync + 'static,
    A: DiskArbiter + Send + Sync + 'static,
{
    let formatter = Arc::clone(formatter);
    Task::perform(
        async move {
            tokio::task::spawn_blocking(move || formatter.lister().list_volumes())
                .await
                .unwrap_or_else(|e| {
                    error!("Volume listing task failed: {}", e);
                    Vec::new()
                })
        },
        move |volumes| {
            Message::VolumeSelection(VolumeMessage::VolumesLoaded {
                generation,
                volumes,
            })
        },
    )
}

pub fn handle_message<M, A>(
    state: &mut VolumeSelectionState,
    formatter: &Arc<Formatter<M, A>>,
    message: VolumeMessage,
) -> Task<Message>
where
    M: MountTable + Send + Sync + 'static,
    A: DiskArbiter + Send + Sync + 'static,
{
    match message {
        VolumeMessage::RefreshVolumes => {
            let generation = state.next_generation();
            debug!("Starting volume refresh {}", generation);
            refresh(formatter, generation)
        }

        VolumeMessage::VolumeEvent(event) => {
            // Every event triggers its own full relist, no coalescing
            info!("Volume change: {:?}", event);
            refresh(formatter, state.next_generation())
        }

        VolumeMessage::VolumesLoaded {
            generation,
            volumes,
        } => {
            if state.apply_listing(generation, volumes) {
                debug!("Volume picker holds {} entries", state.volumes.len());
            }
            Task::none()
        }

        VolumeMessage::SelectVolume(option) => {
            debug!("Selected volume: {}", option.0.display_path);
            state.select(option.0.display_path);
            Task::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::testing::{FakeArbiter, FakeMountTable};
    use crate::disk::{FormatOrchestrator, VolumeEvent, VolumeLister};
    use crate::models::VolumeEntry;
    use crate::ui::volume_selection::VolumeOption;
    use std::path::PathBuf;

    fn formatter() -> Arc<Formatter<FakeMountTable, FakeArbiter>> {
        Arc::new(Formatter::new(
            VolumeLister::new(FakeMountTable::with_paths(&["/Volumes/BOOT"]), "Volumes"),
            FakeArbiter::default(),
            FormatOrchestrator::new("echo"),
        ))
    }

    fn loaded(generation: u64, paths: &[&str]) -> VolumeMessage {
        VolumeMessage::VolumesLoaded {
            generation,
            volumes: paths
                .iter()
                .map(|p| VolumeEntry {
                    display_path: p.to_string(),
                    icon: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_each_event_requests_its_own_relist() {
        let formatter = formatter();
        let mut state = VolumeSelectionState::new();

        for event in [
            VolumeEvent::Unmounted(PathBuf::from("/Volumes/A")),
            VolumeEvent::Mounted(PathBuf::from("/Volumes/B")),
            VolumeEvent::Renamed {
                from: PathBuf::from("/Volumes/B"),
                to: PathBuf::from("/Volumes/C"),
            },
        ] {
            let _ = handle_message(&mut state, &formatter, VolumeMessage::VolumeEvent(event));
        }

        assert_eq!(state.requested_generation, 3);
        assert!(state.is_refreshing);
    }

    #[test]
    fn test_stale_relist_result_is_ignored() {
        let formatter = formatter();
        let mut state = VolumeSelectionState::new();

        let _ = handle_message(
            &mut state,
            &formatter,
            VolumeMessage::VolumeEvent(VolumeEvent::Mounted(PathBuf::from("/Volumes/A"))),
        );
        let _ = handle_message(
            &mut state,
            &formatter,
            VolumeMessage::VolumeEvent(VolumeEvent::Mounted(PathBuf::from("/Volumes/B"))),
        );

        // The second listing finishes first
        let _ = handle_message(&mut state, &formatter, loaded(2, &["/Volumes/A", "/Volumes/B"]));
        let _ = handle_message(&mut state, &formatter, loaded(1, &["/Volumes/A"]));

        assert_eq!(state.volumes.len(), 2);
        assert!(!state.is_refreshing);

        let select = VolumeMessage::SelectVolume(VolumeOption(state.volumes[1].clone()));
        let _ = handle_message(&mut state, &formatter, select);
        assert_eq!(state.selected.as_deref(), Some("/Volumes/B"));
    }
}

use std::sync::Arc;

use iced::Task;
use iced::task::{self, Sipper};
use tracing::{debug, error, info, warn};

use super::{FormatMessage, FormatState};
use crate::disk::{
    CancelHandle, DiskArbiter, FormatError, FormatOutcome, Formatter, MountTable, OutputChunk,
};
use crate::models::{DeviceIdentifier, DiskImagePath};
use crate::ui::controls::{ControlId, ControlSet};
use crate::ui::messages::Message;

/// Progress reported while a job runs
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        device: DeviceIdentifier,
        cancel: CancelHandle,
    },
    Output(OutputChunk),
}

/// Resolve, launch, forward every output chunk, then wait for exit
pub fn run_format<M, A>(
    formatter: Arc<Formatter<M, A>>,
    selected: Option<String>,
    image: DiskImagePath,
) -> impl Sipper<Result<FormatOutcome, FormatError>, JobEvent> + Send + 'static
where
    M: MountTable + Send + Sync + 'static,
    A: DiskArbiter + Send + Sync + 'static,
{
    task::sipper(
        async move |mut sipper| -> Result<FormatOutcome, FormatError> {
            let mut job = formatter.format(selected, image).await?;

            sipper
                .send(JobEvent::Started {
                    device: job.device().clone(),
                    cancel: job.cancel_handle(),
                })
                .await;

            while let Some(chunk) = job.next_output().await {
                sipper.send(JobEvent::Output(chunk)).await;
            }

            job.wait().await
        },
    )
}

async fn pick_disk_image() -> Option<std::path::PathBuf> {
    rfd::AsyncFileDialog::new()
        .set_title("Select Disk Image")
        .add_filter("Disk Image", &["img"])
        .pick_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}

/// A cancel the user asked for only updates the status line
fn alert_for(error: &FormatError) -> Option<String> {
    match error {
        FormatError::Cancelled { .. } => None,
        other => Some(other.to_string()),
    }
}

pub fn handle_message<M, A>(
    state: &mut FormatState,
    controls: &mut ControlSet,
    formatter: &Arc<Formatter<M, A>>,
    selected_volume: Option<&str>,
    message: FormatMessage,
) -> Task<Message>
where
    M: MountTable + Send + Sync + 'static,
    A: DiskArbiter + Send + Sync + 'static,
{
    match message {
        FormatMessage::SelectDiskImage => {
            if !controls.is_enabled(ControlId::BrowseImage) {
                return Task::none();
            }
            Task::perform(pick_disk_image(), |path| {
                Message::Format(FormatMessage::DiskImageSelected(path))
            })
        }

        FormatMessage::DiskImageSelected(Some(path)) => {
            info!("Selected disk image: {}", path.display());
            state.set_image(path.to_string_lossy().to_string());
            Task::none()
        }

        FormatMessage::DiskImageSelected(None) => {
            debug!("Disk image selection cancelled");
            Task::none()
        }

        FormatMessage::DiskImagePathChanged(input) => {
            if controls.is_enabled(ControlId::ImagePath) {
                state.set_image(input);
            }
            Task::none()
        }

        FormatMessage::StartFormat => {
            if state.is_running() || !controls.is_enabled(ControlId::Format) {
                warn!("Format requested while a job is active, ignoring");
                return Task::none();
            }

            if let Err(e) = Formatter::<M, A>::check_preconditions(selected_volume, &state.image) {
                warn!("Format rejected: {}", e);
                return Task::done(Message::ShowError(e.to_string()));
            }

            controls.disable_all();
            state.begin();

            Task::sip(
                run_format(
                    Arc::clone(formatter),
                    selected_volume.map(str::to_string),
                    state.image.clone(),
                ),
                |event| {
                    Message::Format(match event {
                        JobEvent::Started { device, cancel } => {
                            FormatMessage::Started { device, cancel }
                        }
                        JobEvent::Output(chunk) => FormatMessage::Output(chunk),
                    })
                },
                |result| Message::Format(FormatMessage::Finished(result.map_err(Arc::new))),
            )
        }

        FormatMessage::Started { device, cancel } => {
            info!("Format job started on {}", device);
            state.started(device, cancel);
            Task::none()
        }

        FormatMessage::Output(chunk) => {
            state.push_output(&chunk);
            Task::none()
        }

        FormatMessage::Finished(result) => {
            controls.enable_all();
            match result {
                Ok(outcome) => {
                    info!(
                        "Formatted {} in {}s",
                        outcome.device,
                        outcome.elapsed().num_seconds()
                    );
                    state.finish(format!(
                        "{} was formatted as FAT32 \"BOOT\" at {}.",
                        outcome.device,
                        outcome.finished_at.format("%H:%M:%S")
                    ));
                    Task::none()
                }
                Err(e) => {
                    state.finish(e.to_string());
                    match alert_for(&e) {
                        Some(alert) => {
                            error!("Format failed: {}", e);
                            Task::done(Message::ShowError(alert))
                        }
                        None => {
                            info!("{}", e);
                            Task::none()
                        }
                    }
                }
            }
        }

        FormatMessage::Cancel => {
            match &state.cancel {
                Some(cancel) => {
                    info!("Cancel requested");
                    cancel.cancel();
                }
                None => debug!("Nothing to cancel"),
            }
            Task::none()
        }

        FormatMessage::Tick => {
            state.tick();
            Task::none()
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use iced::widget::{
    Column, button, column, container, pick_list, progress_bar, row, scrollable, text,
    text_input,
};
use iced::{Alignment, Element, Length, Subscription, Task};
use tracing::{debug, info};

use crate::config::Settings;
use crate::disk::{
    FormatOrchestrator, Formatter, SystemArbiter, SystemMountTable, VolumeLister, VolumeWatcher,
};
use crate::style;
use crate::ui::controls::{ControlId, ControlSet};
use crate::ui::format_workflow::{self, FormatMessage, FormatState};
use crate::ui::messages::Message;
use crate::ui::volume_selection::{self, VolumeMessage, VolumeSelectionState};

pub type SystemFormatter = Formatter<Arc<SystemMountTable>, SystemArbiter>;

const ACTIVITY_FRAME: Duration = Duration::from_millis(50);

/// Watcher parameters; a change restarts the subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WatchConfig {
    interval: Duration,
}

fn watch_volumes(config: &WatchConfig) -> impl Stream<Item = Message> + use<> {
    let interval = config.interval;
    // The watcher spawns its poller on first poll, inside the runtime
    stream::once(async move {
        VolumeWatcher::new(Arc::new(SystemMountTable), interval).events()
    })
    .flatten()
    .map(|event| Message::VolumeSelection(VolumeMessage::VolumeEvent(event)))
}

async fn show_alert(message: String) {
    rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Oops")
        .set_description(message)
        .set_buttons(rfd::MessageButtons::OkCustom("Close".to_string()))
        .show()
        .await;
}

pub struct RpiFormatter {
    settings: Settings,
    formatter: Arc<SystemFormatter>,
    volumes: VolumeSelectionState,
    format: FormatState,
    controls: ControlSet,
    error_message: Option<String>,
}

impl RpiFormatter {
    pub fn new(settings: Settings) -> (Self, Task<Message>) {
        let table = Arc::new(SystemMountTable);
        let formatter = Arc::new(Formatter::new(
            VolumeLister::new(table, settings.removable_root.clone()),
            SystemArbiter::default(),
            FormatOrchestrator::new(&settings.diskutil_path),
        ));
        info!(
            "Using {} for volumes under /{}",
            settings.diskutil_path.display(),
            settings.removable_root
        );

        let app = Self {
            settings,
            formatter,
            volumes: VolumeSelectionState::new(),
            format: FormatState::new(),
            controls: ControlSet::new(),
            error_message: None,
        };

        (
            app,
            Task::done(Message::VolumeSelection(VolumeMessage::RefreshVolumes)),
        )
    }

    pub fn title(&self) -> String {
        String::from("Raspberry Pi SD Card Formatter")
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ShowError(error) => {
                self.error_message = Some(error.clone());
                Task::perform(show_alert(error), |_| Message::ErrorDialogClosed)
            }
            Message::ErrorDialogClosed => {
                debug!("Error dialog closed");
                Task::none()
            }
            Message::DismissError => {
                self.error_message = None;
                Task::none()
            }
            Message::Quit => {
                if !self.controls.is_enabled(ControlId::Quit) {
                    return Task::none();
                }
                info!("Quitting");
                iced::exit()
            }
            Message::VolumeSelection(VolumeMessage::SelectVolume(_))
                if !self.controls.is_enabled(ControlId::VolumePicker) =>
            {
                Task::none()
            }
            Message::VolumeSelection(message) => {
                volume_selection::handle_message(&mut self.volumes, &self.formatter, message)
            }
            Message::Format(message) => {
                if matches!(message, FormatMessage::StartFormat) {
                    self.error_message = None;
                }
                format_workflow::handle_message(
                    &mut self.format,
                    &mut self.controls,
                    &self.formatter,
                    self.volumes.selected.as_deref(),
                    message,
                )
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let enabled = |id: ControlId| self.controls.is_enabled(id);

        let header = column![
            text("Raspberry Pi SD Card Formatter").size(24),
            text("Erases the selected volume as FAT32 and names it BOOT.")
                .size(14)
                .color(style::MUTED),
        ]
        .spacing(4);

        let volume_picker = column![
            text("Volume").size(14),
            pick_list(
                self.volumes.options(),
                self.volumes.selected_option(),
                |option| Message::VolumeSelection(VolumeMessage::SelectVolume(option)),
            )
            .placeholder(if self.volumes.volumes.is_empty() {
                "No removable volumes"
            } else {
                "Select a volume"
            })
            .width(Length::Fill),
        ]
        .spacing(5);

        let image_exists = self.format.image.exists();
        let mut image_input = text_input("Path to a .img file", &self.format.image_input)
            .style(move |theme, status| style::image_path_input(theme, status, image_exists))
            .width(Length::Fill);
        if enabled(ControlId::ImagePath) {
            image_input = image_input
                .on_input(|input| Message::Format(FormatMessage::DiskImagePathChanged(input)));
        }

        let image_field = column![
            text("Disk image").size(14),
            row![
                image_input,
                button(text("Select Disk Image"))
                    .style(button::secondary)
                    .on_press_maybe(
                        enabled(ControlId::BrowseImage)
                            .then_some(Message::Format(FormatMessage::SelectDiskImage)),
                    ),
            ]
            .spacing(10)
            .align_y(Alignment::Center),
            text("The image is not written. It must exist before a volume can be formatted.")
                .size(12)
                .color(style::MUTED),
        ]
        .spacing(5);

        let mut actions = row![
            button(text("Format"))
                .style(button::primary)
                .on_press_maybe(
                    enabled(ControlId::Format).then_some(Message::Format(FormatMessage::StartFormat)),
                ),
        ]
        .spacing(10);
        if self.format.is_running() {
            actions = actions.push(
                button(text("Cancel"))
                    .style(button::danger)
                    .on_press_maybe(
                        self.format
                            .cancel
                            .is_some()
                            .then_some(Message::Format(FormatMessage::Cancel)),
                    ),
            );
        }
        actions = actions.push(
            button(text("Quit"))
                .style(button::secondary)
                .on_press_maybe(enabled(ControlId::Quit).then_some(Message::Quit)),
        );

        let activity = progress_bar(0.0..=1.0, self.format.activity);

        let status = text(self.format.status.clone().unwrap_or_default()).size(14);

        let log = container(
            scrollable(
                Column::with_children(
                    self.format
                        .log
                        .iter()
                        .map(|line| text(line.as_str()).size(12).into()),
                )
                .spacing(2)
                .width(Length::Fill),
            )
            .height(Length::Fill),
        )
        .padding(10)
        .height(Length::Fill)
        .width(Length::Fill)
        .style(style::log_box);

        let mut content = column![header].spacing(16);
        if let Some(error) = &self.error_message {
            content = content.push(
                container(
                    row![
                        text(error.as_str()).size(14).width(Length::Fill),
                        button(text("Dismiss"))
                            .style(button::text)
                            .on_press(Message::DismissError),
                    ]
                    .align_y(Alignment::Center),
                )
                .padding(10)
                .width(Length::Fill)
                .style(style::error_banner),
            );
        }
        content = content
            .push(volume_picker)
            .push(image_field)
            .push(actions)
            .push(activity)
            .push(status)
            .push(log);

        container(content)
            .padding(20)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(style::main_box)
            .into()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let watch = Subscription::run_with(
            WatchConfig {
                interval: self.settings.poll_interval(),
            },
            watch_volumes,
        );

        if self.format.is_running() {
            Subscription::batch([
                watch,
                iced::time::every(ACTIVITY_FRAME).map(|_| Message::Format(FormatMessage::Tick)),
            ])
        } else {
            watch
        }
    }
}

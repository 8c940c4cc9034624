use crate::disk::{CancelHandle, OutputChunk, OutputStream};
use crate::models::{DeviceIdentifier, DiskImagePath, FormatJobState};

/// Output lines kept for the log panel
pub const MAX_LOG_LINES: usize = 500;

const ACTIVITY_STEP: f32 = 0.04;

#[derive(Debug, Clone, Default)]
pub struct FormatState {
    pub image: DiskImagePath,
    pub image_input: String,
    pub job_state: FormatJobState,
    pub device: Option<DeviceIdentifier>,
    pub cancel: Option<CancelHandle>,
    pub activity: f32,
    pub log: Vec<String>,
    pub status: Option<String>,
}

impl FormatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.job_state == FormatJobState::Running
    }

    pub fn set_image(&mut self, input: String) {
        self.image = DiskImagePath::new(&input);
        self.image_input = input;
    }

    pub fn begin(&mut self) {
        self.job_state = FormatJobState::Running;
        self.device = None;
        self.cancel = None;
        self.activity = 0.0;
        self.log.clear();
        self.status = Some("Resolving device...".to_string());
    }

    pub fn started(&mut self, device: DeviceIdentifier, cancel: CancelHandle) {
        self.status = Some(format!("Formatting {} as FAT32 \"BOOT\"...", device));
        self.device = Some(device);
        self.cancel = Some(cancel);
    }

    pub fn push_output(&mut self, chunk: &OutputChunk) {
        for line in chunk.text.lines().filter(|l| !l.trim().is_empty()) {
            match chunk.stream {
                OutputStream::Stdout => self.log.push(line.to_string()),
                OutputStream::Stderr => self.log.push(format!("! {}", line)),
            }
        }
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    pub fn finish(&mut self, status: String) {
        self.job_state = FormatJobState::Completed;
        self.cancel = None;
        self.activity = 0.0;
        self.status = Some(status);
    }

    /// Indeterminate activity: the bar sweeps and wraps around
    pub fn tick(&mut self) {
        if self.is_running() {
            self.activity = (self.activity + ACTIVITY_STEP) % 1.0;
        }
    }
}

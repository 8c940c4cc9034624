// Format orchestration
//
// Erasing is delegated to the platform disk utility. This module owns the
// lifecycle of that child process: one job at a time, both output streams
// read continuously, and a single completion signal when the process exits.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::arbitration::{DiskArbiter, ResolveError, resolve_device};
use super::volumes::{MountTable, VolumeLister};
use crate::models::{DeviceIdentifier, DiskImagePath};

/// Disk utility verb that erases a single volume
pub const ERASE_VERB: &str = "erase-volume";
/// Target filesystem; not configurable
pub const FILESYSTEM: &str = "fat32";
/// FAT32 volume names must be upper case
pub const VOLUME_LABEL: &str = "BOOT";

const READ_BUFFER_SIZE: usize = 4096;

/// Arguments passed to the disk utility, in this exact order
pub fn erase_arguments(device: &DeviceIdentifier) -> [&str; 4] {
    [ERASE_VERB, FILESYSTEM, VOLUME_LABEL, device.as_str()]
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("No volume selected or the disk image does not exist.")]
    NoVolumeSelectedOrImageMissing,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("A format is already in progress.")]
    AlreadyRunning,
    #[error("Failed to launch {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Formatting {device} failed ({}).", describe_code(.code))]
    CommandFailed {
        device: DeviceIdentifier,
        code: Option<i32>,
    },
    #[error("Formatting {device} was cancelled.")]
    Cancelled { device: DeviceIdentifier },
    #[error("Format job failed: {0}")]
    Supervisor(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn name(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// One decoded chunk of child process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

/// Result of a finished job. Any termination lands here; see [`FormatOutcome::into_result`].
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    pub device: DeviceIdentifier,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl FormatOutcome {
    fn new(
        device: DeviceIdentifier,
        status: ExitStatus,
        cancelled: bool,
        started_at: DateTime<Local>,
    ) -> Self {
        Self {
            device,
            exit_code: status.code(),
            success: status.success() && !cancelled,
            cancelled,
            started_at,
            finished_at: Local::now(),
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Treat cancellation and nonzero exit as errors
    pub fn into_result(self) -> Result<Self, FormatError> {
        if self.cancelled {
            Err(FormatError::Cancelled {
                device: self.device,
            })
        } else if !self.success {
            Err(FormatError::CommandFailed {
                device: self.device,
                code: self.exit_code,
            })
        } else {
            Ok(self)
        }
    }
}

/// Requests termination of a running job
#[derive(Debug, Clone)]
pub struct CancelHandle {
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // notify_one keeps a permit, so a cancel sent before the supervisor
        // starts waiting is not lost
        self.notify.notify_one();
    }
}

#[derive(Debug, Default)]
struct JobSlot {
    busy: AtomicBool,
}

/// Holds the single job slot; released on drop
struct SlotGuard(Arc<JobSlot>);

impl JobSlot {
    fn try_acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard(Arc::clone(self)))
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

/// An in-flight invocation of the disk utility
pub struct FormatJob {
    device: DeviceIdentifier,
    started_at: DateTime<Local>,
    output: mpsc::UnboundedReceiver<OutputChunk>,
    cancel: CancelHandle,
    completion: JoinHandle<std::io::Result<FormatOutcome>>,
}

impl std::fmt::Debug for FormatJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatJob")
            .field("device", &self.device)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl FormatJob {
    pub fn device(&self) -> &DeviceIdentifier {
        &self.device
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Next chunk of output from either stream, in arrival order per stream.
    /// Returns `None` once both streams are closed.
    pub async fn next_output(&mut self) -> Option<OutputChunk> {
        self.output.recv().await
    }

    /// Wait for the process to exit. Unread output is discarded.
    pub async fn wait(self) -> Result<FormatOutcome, FormatError> {
        match self.completion.await {
            Ok(Ok(outcome)) => outcome.into_result(),
            Ok(Err(e)) => Err(FormatError::Supervisor(e.to_string())),
            Err(e) => Err(FormatError::Supervisor(e.to_string())),
        }
    }

    /// Run `on_complete` exactly once when the job finishes
    pub fn on_complete<F>(self, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<FormatOutcome, FormatError>) + Send + 'static,
    {
        tokio::spawn(async move {
            let result = self.wait().await;
            on_complete(result);
        })
    }
}

/// Incremental UTF-8 decoder for a byte stream.
///
/// A character split across two reads is completed by the next read. Only
/// byte sequences that can never be valid are dropped.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much text as possible; `None` if nothing complete was decoded
    fn push(&mut self, bytes: &[u8], stream: OutputStream) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        let mut rest = self.pending.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            trace!("Dropped {} undecodable bytes from {}", bad, stream.name());
                            rest = &after[bad..];
                        }
                        // Incomplete character at the end, wait for more bytes
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();

        (!text.is_empty()).then_some(text)
    }

    /// Bytes left over when the stream closes can never complete
    fn finish(self, stream: OutputStream) {
        if !self.pending.is_empty() {
            trace!(
                "Dropped {} trailing undecodable bytes from {}",
                self.pending.len(),
                stream.name()
            );
        }
    }
}

async fn pump<R>(mut reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Decoder::default();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Error reading {}: {}", stream.name(), e);
                break;
            }
        };

        let Some(text) = decoder.push(&buf[..n], stream) else {
            continue;
        };

        info!(target: "diskutil", "[{}] {}", stream.name(), text.trim_end());
        // Keep draining even when nobody listens so the child never blocks on a full pipe
        let _ = tx.send(OutputChunk { stream, text });
    }
    decoder.finish(stream);
}

/// Launches format jobs, one at a time
#[derive(Debug, Clone)]
pub struct FormatOrchestrator {
    program: PathBuf,
    slot: Arc<JobSlot>,
}

impl FormatOrchestrator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            slot: Arc::new(JobSlot::default()),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn is_busy(&self) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }

    /// Spawn the disk utility for `device`. Must be called within a tokio runtime.
    pub fn start_format(&self, device: DeviceIdentifier) -> Result<FormatJob, FormatError> {
        let guard = self.slot.try_acquire().ok_or(FormatError::AlreadyRunning)?;

        let args = erase_arguments(&device);
        info!("Running {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                error!("Failed to launch {}: {}", self.program.display(), source);
                FormatError::Launch {
                    program: self.program.clone(),
                    source,
                }
            })?;

        let started_at = Local::now();
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump(out, OutputStream::Stdout, tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump(err, OutputStream::Stderr, tx.clone())));
        drop(tx);

        let notify = Arc::new(Notify::new());
        let cancel = CancelHandle {
            notify: Arc::clone(&notify),
        };

        let job_device = device.clone();
        let completion = tokio::spawn(async move {
            let _guard = guard;

            let (status, cancelled) = tokio::select! {
                status = child.wait() => (status?, false),
                _ = notify.notified() => {
                    info!("Cancelling format of {}", job_device);
                    if let Err(e) = child.start_kill() {
                        warn!("Failed to kill format process: {}", e);
                    }
                    (child.wait().await?, true)
                }
            };

            for task in [stdout_task, stderr_task].into_iter().flatten() {
                if let Err(e) = task.await {
                    warn!("Output reader failed: {}", e);
                }
            }

            let outcome = FormatOutcome::new(job_device, status, cancelled, started_at);
            info!(
                "Format of {} finished after {}s: {:?}",
                outcome.device,
                outcome.elapsed().num_seconds(),
                status
            );
            Ok(outcome)
        });

        Ok(FormatJob {
            device,
            started_at,
            output: rx,
            cancel,
            completion,
        })
    }
}

/// The "format" action: precondition gate, device resolution, launch
pub struct Formatter<M, A> {
    lister: VolumeLister<M>,
    arbiter: A,
    orchestrator: FormatOrchestrator,
}

impl<M, A> Formatter<M, A>
where
    M: MountTable + Send + Sync + 'static,
    A: DiskArbiter + Send + Sync + 'static,
{
    pub fn new(lister: VolumeLister<M>, arbiter: A, orchestrator: FormatOrchestrator) -> Self {
        Self {
            lister,
            arbiter,
            orchestrator,
        }
    }

    pub fn lister(&self) -> &VolumeLister<M> {
        &self.lister
    }

    pub fn orchestrator(&self) -> &FormatOrchestrator {
        &self.orchestrator
    }

    /// A volume must be selected and the image must exist. The image is only
    /// a gate: its content is never read or written.
    pub fn check_preconditions<'a>(
        selected: Option<&'a str>,
        image: &DiskImagePath,
    ) -> Result<&'a str, FormatError> {
        match selected {
            Some(volume) if !volume.is_empty() && image.exists() => Ok(volume),
            _ => Err(FormatError::NoVolumeSelectedOrImageMissing),
        }
    }

    pub fn resolve(&self, display_path: &str) -> Result<DeviceIdentifier, ResolveError> {
        resolve_device(display_path, self.lister.table(), &self.arbiter)
    }

    pub async fn format(
        self: Arc<Self>,
        selected: Option<String>,
        image: DiskImagePath,
    ) -> Result<FormatJob, FormatError> {
        let volume = Self::check_preconditions(selected.as_deref(), &image)?.to_string();
        if self.orchestrator.is_busy() {
            return Err(FormatError::AlreadyRunning);
        }

        debug!("Formatting {} (gated on image {})", volume, image.path().display());
        let this = Arc::clone(&self);
        let device = tokio::task::spawn_blocking(move || this.resolve(&volume))
            .await
            .map_err(|e| FormatError::Supervisor(e.to_string()))??;

        self.orchestrator.start_format(device)
    }
}

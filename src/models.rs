use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

/// Best-effort icon for a mounted volume, derived from the backing drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeIcon {
    SdCard,
    Usb,
    Removable,
    Drive,
}

impl VolumeIcon {
    /// Short glyph the UI renders next to the volume picker
    pub fn glyph(self) -> &'static str {
        match self {
            VolumeIcon::SdCard => "[SD]",
            VolumeIcon::Usb => "[USB]",
            VolumeIcon::Removable => "[EXT]",
            VolumeIcon::Drive => "[HDD]",
        }
    }
}

/// A candidate volume shown in the volume picker.
///
/// Identity is the display path; entries are produced fresh on every listing.
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub display_path: String,
    pub icon: Option<VolumeIcon>,
}

impl PartialEq for VolumeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.display_path == other.display_path
    }
}

impl Eq for VolumeEntry {}

// pick_list renders entries through Display
impl fmt::Display for VolumeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_path)
    }
}

/// Low-level device node name, e.g. `disk3s1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentifier(String);

static DEVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]*$").expect("valid device pattern"));

impl DeviceIdentifier {
    /// Accepts plain device node names only. Anything that could be read as a
    /// path or a command-line option is refused.
    pub fn parse(name: &str) -> Option<Self> {
        if DEVICE_NAME.is_match(name) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Path of the disk image the user browsed to.
///
/// Only its existence is checked; the image content is never read by the
/// format action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskImagePath(PathBuf);

impl DiskImagePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    pub fn exists(&self) -> bool {
        !self.is_empty() && self.0.is_file()
    }
}

impl From<&str> for DiskImagePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle of a format job as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatJobState {
    #[default]
    Idle,
    Running,
    Completed,
}

use std::fmt;

use tracing::debug;

use crate::models::VolumeEntry;

/// Picker item: a volume rendered with its icon glyph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOption(pub VolumeEntry);

impl fmt::Display for VolumeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.icon {
            Some(icon) => write!(f, "{} {}", icon.glyph(), self.0.display_path),
            None => write!(f, "{}", self.0.display_path),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VolumeSelectionState {
    pub volumes: Vec<VolumeEntry>,
    pub selected: Option<String>,
    pub is_refreshing: bool,
    /// Generation of the most recent refresh request
    pub requested_generation: u64,
    /// Generation of the listing currently shown
    pub applied_generation: u64,
}

impl VolumeSelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new refresh and return its generation
    pub fn next_generation(&mut self) -> u64 {
        self.requested_generation += 1;
        self.is_refreshing = true;
        self.requested_generation
    }

    /// Replace the volume list wholesale. The selection survives only if the
    /// selected path is still listed.
    ///
    /// Listings finish out of order; one older than the listing already shown
    /// is discarded. Returns whether the listing was applied.
    pub fn apply_listing(&mut self, generation: u64, volumes: Vec<VolumeEntry>) -> bool {
        if generation <= self.applied_generation {
            debug!(
                "Discarding stale volume listing {} (showing {})",
                generation, self.applied_generation
            );
            return false;
        }

        if let Some(selected) = &self.selected {
            if !volumes.iter().any(|v| &v.display_path == selected) {
                self.selected = None;
            }
        }
        self.volumes = volumes;
        self.applied_generation = generation;
        if generation >= self.requested_generation {
            self.is_refreshing = false;
        }
        true
    }

    pub fn select(&mut self, display_path: String) {
        if self.volumes.iter().any(|v| v.display_path == display_path) {
            self.selected = Some(display_path);
        }
    }

    pub fn options(&self) -> Vec<VolumeOption> {
        self.volumes.iter().cloned().map(VolumeOption).collect()
    }

    pub fn selected_option(&self) -> Option<VolumeOption> {
        let selected = self.selected.as_ref()?;
        self.volumes
            .iter()
            .find(|v| &v.display_path == selected)
            .cloned()
            .map(VolumeOption)
    }
}

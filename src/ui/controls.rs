use tracing::debug;

/// Interactive widgets the controller locks while a format job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    VolumePicker,
    ImagePath,
    BrowseImage,
    Format,
    Quit,
}

impl ControlId {
    pub const ALL: [ControlId; 5] = [
        ControlId::VolumePicker,
        ControlId::ImagePath,
        ControlId::BrowseImage,
        ControlId::Format,
        ControlId::Quit,
    ];
}

pub trait Toggle {
    fn enable(&mut self);
    fn disable(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    id: ControlId,
    enabled: bool,
}

impl Control {
    pub fn new(id: ControlId) -> Self {
        Self { id, enabled: true }
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Toggle for Control {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

/// The explicit list of controls owned by the main window.
///
/// Views ask `is_enabled` before wiring an `on_press`/`on_input` handler, so a
/// disabled control never produces messages.
#[derive(Debug, Clone)]
pub struct ControlSet {
    controls: Vec<Control>,
}

impl Default for ControlSet {
    fn default() -> Self {
        Self {
            controls: ControlId::ALL.into_iter().map(Control::new).collect(),
        }
    }
}

impl ControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_all(&mut self) {
        debug!("Enabling {} controls", self.controls.len());
        self.controls.iter_mut().for_each(Toggle::enable);
    }

    pub fn disable_all(&mut self) {
        debug!("Disabling {} controls", self.controls.len());
        self.controls.iter_mut().for_each(Toggle::disable);
    }

    pub fn is_enabled(&self, id: ControlId) -> bool {
        self.controls
            .iter()
            .find(|c| c.id() == id)
            .is_some_and(Control::is_enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_controls_start_enabled() {
        let controls = ControlSet::new();
        assert_eq!(controls.iter().count(), ControlId::ALL.len());
        assert!(ControlId::ALL.iter().all(|id| controls.is_enabled(*id)));
    }

    #[test]
    fn test_disable_then_enable_all() {
        let mut controls = ControlSet::new();

        controls.disable_all();
        assert!(controls.iter().all(|c| !c.is_enabled()));

        controls.enable_all();
        assert!(controls.iter().all(Control::is_enabled));
    }

    #[test]
    fn test_toggle_single_control() {
        let mut control = Control::new(ControlId::Format);
        control.disable();
        assert!(!control.is_enabled());
        control.enable();
        assert!(control.is_enabled());
    }
}

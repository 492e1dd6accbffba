//! Debounced on/off toggles for the accessibility modes.
//!
//! The input layer can report one physical chord twice, so by default a
//! toggle takes two detections: the first arms the transition, the second
//! performs it. With debouncing off a single detection is enough.

/// State of one toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeToggle {
    #[default]
    Off,
    /// Off, one more detection turns it on.
    ArmingOn,
    On,
    /// On, one more detection turns it off.
    ArmingOff,
}

/// Settled transition produced by a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeChange {
    Enabled,
    Disabled,
}

impl ModeToggle {
    /// Whether the mode's effect is in force.
    pub fn is_on(self) -> bool {
        matches!(self, ModeToggle::On | ModeToggle::ArmingOff)
    }

    /// Handle one detection of the toggle chord. Returns the change to
    /// apply, if the toggle settled.
    pub fn press(&mut self, debounce: bool) -> Option<ModeChange> {
        use ModeToggle::*;

        let (next, change) = match (*self, debounce) {
            (Off, true) => (ArmingOn, None),
            (Off | ArmingOn, _) => (On, Some(ModeChange::Enabled)),
            (On, true) => (ArmingOff, None),
            (On | ArmingOff, _) => (Off, Some(ModeChange::Disabled)),
        };
        *self = next;
        change
    }
}

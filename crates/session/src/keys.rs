//! Key chords, session actions and key encoding.

use collections::FxHashMap;
use settings::KeybindingEntry;
use termwiz::input::{KeyCode, KeyCodeEncodeModes, KeyEvent, KeyboardEncoding, Modifiers};

/// Commands handled by the session instead of being sent to the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleScreenCursor,
    ToggleEditorMode,
    JumpPrevious,
    JumpNext,
    MuteScreen,
    StopSpeech,
    ToggleListingView,
    NewShellTab,
    NewSshTab,
    CloseTab,
    NextTab,
    PreviousTab,
    SaveTranscript,
    FocusInput,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::ToggleScreenCursor,
        Action::ToggleEditorMode,
        Action::JumpPrevious,
        Action::JumpNext,
        Action::MuteScreen,
        Action::StopSpeech,
        Action::ToggleListingView,
        Action::NewShellTab,
        Action::NewSshTab,
        Action::CloseTab,
        Action::NextTab,
        Action::PreviousTab,
        Action::SaveTranscript,
        Action::FocusInput,
    ];

    /// Name used in `[[keybindings]]`.
    pub fn name(self) -> &'static str {
        match self {
            Action::ToggleScreenCursor => "toggle-screen-cursor",
            Action::ToggleEditorMode => "toggle-editor-mode",
            Action::JumpPrevious => "jump-previous",
            Action::JumpNext => "jump-next",
            Action::MuteScreen => "mute-screen",
            Action::StopSpeech => "stop-speech",
            Action::ToggleListingView => "toggle-listing-view",
            Action::NewShellTab => "new-shell-tab",
            Action::NewSshTab => "new-ssh-tab",
            Action::CloseTab => "close-tab",
            Action::NextTab => "next-tab",
            Action::PreviousTab => "previous-tab",
            Action::SaveTranscript => "save-transcript",
            Action::FocusInput => "focus-input",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    fn default_chord(self) -> &'static str {
        match self {
            Action::ToggleScreenCursor => "ctrl-b",
            Action::ToggleEditorMode => "alt-e",
            Action::JumpPrevious => "alt-p",
            Action::JumpNext => "alt-n",
            Action::MuteScreen => "alt-m",
            Action::StopSpeech => "alt-s",
            Action::ToggleListingView => "alt-l",
            Action::NewShellTab => "alt-t",
            Action::NewSshTab => "alt-h",
            Action::CloseTab => "alt-w",
            Action::NextTab => "alt-]",
            Action::PreviousTab => "alt-[",
            Action::SaveTranscript => "alt-x",
            Action::FocusInput => "insert",
        }
    }
}

/// A key plus the modifiers that matter for matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: KeyCode,
    pub mods: Modifiers,
}

impl KeyChord {
    /// Parse `"ctrl-b"`, `"alt-]"`, `"ctrl-shift-f5"`, `"insert"`.
    pub fn parse(chord: &str) -> Option<Self> {
        let chord = chord.trim().to_ascii_lowercase();
        let (mods_part, key_part) = if let Some(rest) = chord.strip_suffix("--") {
            (rest, "-")
        } else {
            match chord.rsplit_once('-') {
                Some((mods, key)) if !key.is_empty() => (mods, key),
                _ => ("", chord.as_str()),
            }
        };

        let mut mods = Modifiers::NONE;
        for part in mods_part.split('-').filter(|part| !part.is_empty()) {
            mods |= match part {
                "ctrl" | "control" => Modifiers::CTRL,
                "alt" | "opt" | "option" | "meta" => Modifiers::ALT,
                "shift" => Modifiers::SHIFT,
                "super" | "cmd" | "win" => Modifiers::SUPER,
                _ => return None,
            };
        }

        Some(Self {
            key: parse_key(key_part)?,
            mods,
        })
    }

    /// Chord for an incoming key event, with letter case folded into SHIFT
    /// and left/right modifier variants dropped.
    pub fn from_event(event: &KeyEvent) -> Self {
        let mut mods =
            event.modifiers & (Modifiers::CTRL | Modifiers::ALT | Modifiers::SHIFT | Modifiers::SUPER);
        let key = match event.key {
            KeyCode::Char(c) if c.is_ascii_uppercase() => {
                mods |= Modifiers::SHIFT;
                KeyCode::Char(c.to_ascii_lowercase())
            }
            key => key,
        };
        Self { key, mods }
    }
}

fn parse_key(name: &str) -> Option<KeyCode> {
    let key = match name {
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "escape" | "esc" => KeyCode::Escape,
        "backspace" => KeyCode::Backspace,
        "space" => KeyCode::Char(' '),
        "insert" => KeyCode::Insert,
        "delete" => KeyCode::Delete,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "up" => KeyCode::UpArrow,
        "down" => KeyCode::DownArrow,
        "left" => KeyCode::LeftArrow,
        "right" => KeyCode::RightArrow,
        _ => {
            if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return (1..=24).contains(&n).then_some(KeyCode::Function(n));
            }
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

/// Chord to action lookup.
#[derive(Clone, Debug)]
pub struct Keymap {
    bindings: FxHashMap<KeyChord, Action>,
}

impl Default for Keymap {
    fn default() -> Self {
        let bindings = Action::ALL
            .into_iter()
            .filter_map(|action| Some((KeyChord::parse(action.default_chord())?, action)))
            .collect();
        Self { bindings }
    }
}

impl Keymap {
    /// Defaults overridden by configured bindings. Binding an action
    /// replaces its default chord.
    pub fn from_config(entries: &[KeybindingEntry]) -> Self {
        let mut keymap = Self::default();
        let mut overridden = Vec::new();

        for entry in entries {
            let Some(action) = Action::from_name(&entry.action) else {
                tracing::warn!("Unknown keybinding action '{}', ignoring", entry.action);
                continue;
            };
            let Some(chord) = KeyChord::parse(&entry.keys) else {
                tracing::warn!("Invalid key chord '{}' for {}, ignoring", entry.keys, entry.action);
                continue;
            };
            if !overridden.contains(&action) {
                keymap.bindings.retain(|_, bound| *bound != action);
                overridden.push(action);
            }
            keymap.bindings.insert(chord, action);
        }
        keymap
    }

    pub fn action_for(&self, event: &KeyEvent) -> Option<Action> {
        self.bindings.get(&KeyChord::from_event(event)).copied()
    }

    pub fn chords_for(&self, action: Action) -> Vec<KeyChord> {
        self.bindings
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(chord, _)| *chord)
            .collect()
    }
}

/// Encode a key press as the bytes a terminal application expects.
pub fn encode_key(event: &KeyEvent, application_cursor: bool) -> Option<Vec<u8>> {
    let modes = KeyCodeEncodeModes {
        encoding: KeyboardEncoding::Xterm,
        application_cursor_keys: application_cursor,
        newline_mode: false,
        modify_other_keys: None,
    };
    match event.key.encode(event.modifiers, modes, true) {
        Ok(seq) if !seq.is_empty() => Some(seq.into_bytes()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Cannot encode {:?}: {}", event.key, e);
            None
        }
    }
}

//! Fallback keyboard table for surfaces without structured input events.
//!
//! Patterns read like `mod+shift?+backspace`: every modifier named is
//! required, a trailing `?` makes it optional and any modifier not named must
//! be released. `mod` is the command key on Apple keymaps and control
//! elsewhere.

use crate::input::EditCommand;
use crate::model::{Direction, Unit};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hotkey {
    Bold,
    Italic,
    Undo,
    Redo,
    SplitBlock,
    InsertSoftBreak,
    MoveBackward,
    MoveForward,
    MoveWordBackward,
    MoveWordForward,
    MoveLineBackward,
    MoveLineForward,
    ExtendBackward,
    ExtendForward,
    ExtendLineBackward,
    ExtendLineForward,
    DeleteBackward,
    DeleteForward,
    DeleteWordBackward,
    DeleteWordForward,
    DeleteLineBackward,
    DeleteLineForward,
}

const HOTKEYS: &[(Hotkey, &str)] = &[
    (Hotkey::Bold, "mod+b"),
    (Hotkey::Italic, "mod+i"),
    (Hotkey::Undo, "mod+z"),
    (Hotkey::SplitBlock, "enter"),
    (Hotkey::InsertSoftBreak, "shift+enter"),
    (Hotkey::MoveBackward, "left"),
    (Hotkey::MoveForward, "right"),
    (Hotkey::MoveWordBackward, "ctrl+left"),
    (Hotkey::MoveWordForward, "ctrl+right"),
    (Hotkey::ExtendBackward, "shift+left"),
    (Hotkey::ExtendForward, "shift+right"),
    (Hotkey::DeleteBackward, "shift?+backspace"),
    (Hotkey::DeleteForward, "shift?+delete"),
];

const APPLE_HOTKEYS: &[(Hotkey, &str)] = &[
    (Hotkey::MoveLineBackward, "opt+up"),
    (Hotkey::MoveLineForward, "opt+down"),
    (Hotkey::MoveWordBackward, "opt+left"),
    (Hotkey::MoveWordForward, "opt+right"),
    (Hotkey::DeleteBackward, "ctrl+backspace"),
    (Hotkey::DeleteBackward, "ctrl+h"),
    (Hotkey::DeleteForward, "ctrl+delete"),
    (Hotkey::DeleteForward, "ctrl+d"),
    (Hotkey::DeleteLineBackward, "cmd+shift?+backspace"),
    (Hotkey::DeleteLineForward, "cmd+shift?+delete"),
    (Hotkey::DeleteLineForward, "ctrl+k"),
    (Hotkey::DeleteWordBackward, "opt+shift?+backspace"),
    (Hotkey::DeleteWordForward, "opt+shift?+delete"),
    (Hotkey::ExtendLineBackward, "opt+shift+up"),
    (Hotkey::ExtendLineForward, "opt+shift+down"),
    (Hotkey::Redo, "cmd+shift+z"),
];

const WINDOWS_HOTKEYS: &[(Hotkey, &str)] = &[
    (Hotkey::DeleteWordBackward, "ctrl+shift?+backspace"),
    (Hotkey::DeleteWordForward, "ctrl+shift?+delete"),
    (Hotkey::Redo, "ctrl+y"),
    (Hotkey::Redo, "ctrl+shift+z"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Pressed,
    Released,
    Either,
}

impl Requirement {
    fn allows(self, pressed: bool) -> bool {
        match self {
            Requirement::Pressed => pressed,
            Requirement::Released => !pressed,
            Requirement::Either => true,
        }
    }
}

/// Does `event` match `pattern` under the given keymap
fn is_hotkey(pattern: &str, event: &KeyEvent, apple: bool) -> bool {
    let mut parts: Vec<&str> = pattern.split('+').collect();
    let Some(key) = parts.pop() else {
        return false;
    };

    let [mut ctrl, mut shift, mut alt, mut meta] = [Requirement::Released; 4];
    for part in parts {
        let (name, requirement) = match part.strip_suffix('?') {
            Some(name) => (name, Requirement::Either),
            None => (part, Requirement::Pressed),
        };
        let slot = match name {
            "mod" if apple => &mut meta,
            "mod" => &mut ctrl,
            "cmd" | "meta" => &mut meta,
            "ctrl" | "control" => &mut ctrl,
            "shift" => &mut shift,
            "opt" | "option" | "alt" => &mut alt,
            other => {
                log::warn!("unknown modifier {other} in hotkey pattern {pattern}");
                return false;
            }
        };
        *slot = requirement;
    }

    ctrl.allows(event.ctrl)
        && shift.allows(event.shift)
        && alt.allows(event.alt)
        && meta.allows(event.meta)
        && key_name(key).eq_ignore_ascii_case(&event.key)
}

fn key_name(key: &str) -> &str {
    match key {
        "left" => "ArrowLeft",
        "right" => "ArrowRight",
        "up" => "ArrowUp",
        "down" => "ArrowDown",
        "backspace" => "Backspace",
        "delete" => "Delete",
        "enter" => "Enter",
        other => other,
    }
}

impl Hotkey {
    /// The first hotkey `event` matches, generic bindings before the
    /// platform's own
    pub fn matching(event: &KeyEvent, apple: bool) -> Option<Hotkey> {
        let platform = if apple { APPLE_HOTKEYS } else { WINDOWS_HOTKEYS };
        HOTKEYS
            .iter()
            .chain(platform)
            .find(|(_, pattern)| is_hotkey(pattern, event, apple))
            .map(|(hotkey, _)| *hotkey)
    }

    /// Caret movement that never edits the document
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Hotkey::MoveBackward
                | Hotkey::MoveForward
                | Hotkey::MoveWordBackward
                | Hotkey::MoveWordForward
                | Hotkey::MoveLineBackward
                | Hotkey::MoveLineForward
                | Hotkey::ExtendBackward
                | Hotkey::ExtendForward
                | Hotkey::ExtendLineBackward
                | Hotkey::ExtendLineForward
        )
    }

    pub fn command(&self) -> EditCommand {
        let movement = |unit, reverse, extend| EditCommand::Move { unit, reverse, extend };
        let delete = |unit, direction| EditCommand::Delete { unit, direction };
        match self {
            Hotkey::Bold => EditCommand::ToggleMark("bold".to_string()),
            Hotkey::Italic => EditCommand::ToggleMark("italic".to_string()),
            Hotkey::Undo => EditCommand::Undo,
            Hotkey::Redo => EditCommand::Redo,
            Hotkey::SplitBlock | Hotkey::InsertSoftBreak => EditCommand::InsertBreak,
            Hotkey::MoveBackward => movement(Unit::Character, true, false),
            Hotkey::MoveForward => movement(Unit::Character, false, false),
            Hotkey::MoveWordBackward => movement(Unit::Word, true, false),
            Hotkey::MoveWordForward => movement(Unit::Word, false, false),
            Hotkey::MoveLineBackward => movement(Unit::Line, true, false),
            Hotkey::MoveLineForward => movement(Unit::Line, false, false),
            Hotkey::ExtendBackward => movement(Unit::Character, true, true),
            Hotkey::ExtendForward => movement(Unit::Character, false, true),
            Hotkey::ExtendLineBackward => movement(Unit::Line, true, true),
            Hotkey::ExtendLineForward => movement(Unit::Line, false, true),
            Hotkey::DeleteBackward => delete(Unit::Character, Direction::Backward),
            Hotkey::DeleteForward => delete(Unit::Character, Direction::Forward),
            Hotkey::DeleteWordBackward => delete(Unit::Word, Direction::Backward),
            Hotkey::DeleteWordForward => delete(Unit::Word, Direction::Forward),
            Hotkey::DeleteLineBackward => delete(Unit::Line, Direction::Backward),
            Hotkey::DeleteLineForward => delete(Unit::Line, Direction::Forward),
        }
    }
}

/*!
 * # Input Event Translator
 *
 * Turns native editing events into [`EditCommand`]s that the host surface
 * runs against the model.
 *
 * Surfaces with structured input events deliver a named intent plus optional
 * data and target range (`beforeinput`). Surfaces without them fall back to
 * the [`hotkeys`] table and literal text input.
 *
 * Translation is pure: it only looks at the event, the mapped target range and
 * the current model selection, so the rules can be tested without a surface.
 */

pub mod hotkeys;

use std::fmt;
use std::str::FromStr;

use crate::model::{Direction, Range, Unit};
use crate::surface::NativeSelection;
use crate::transfer::TransferPayload;

pub use hotkeys::{Hotkey, KeyEvent};

/// `beforeinput` intents the translator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputIntent {
    InsertText,
    InsertReplacementText,
    InsertLineBreak,
    InsertParagraph,
    InsertFromPaste,
    InsertFromDrop,
    InsertFromComposition,
    InsertFromYank,
    InsertCompositionText,
    DeleteContent,
    DeleteContentForward,
    DeleteContentBackward,
    DeleteWordForward,
    DeleteWordBackward,
    DeleteSoftLineForward,
    DeleteSoftLineBackward,
    DeleteHardLineForward,
    DeleteHardLineBackward,
    DeleteEntireSoftLine,
    DeleteByCut,
    DeleteByDrag,
    DeleteByComposition,
    HistoryUndo,
    HistoryRedo,
    FormatBold,
    FormatItalic,
}

const INTENT_NAMES: &[(InputIntent, &str)] = &[
    (InputIntent::InsertText, "insertText"),
    (InputIntent::InsertReplacementText, "insertReplacementText"),
    (InputIntent::InsertLineBreak, "insertLineBreak"),
    (InputIntent::InsertParagraph, "insertParagraph"),
    (InputIntent::InsertFromPaste, "insertFromPaste"),
    (InputIntent::InsertFromDrop, "insertFromDrop"),
    (InputIntent::InsertFromComposition, "insertFromComposition"),
    (InputIntent::InsertFromYank, "insertFromYank"),
    (InputIntent::InsertCompositionText, "insertCompositionText"),
    (InputIntent::DeleteContent, "deleteContent"),
    (InputIntent::DeleteContentForward, "deleteContentForward"),
    (InputIntent::DeleteContentBackward, "deleteContentBackward"),
    (InputIntent::DeleteWordForward, "deleteWordForward"),
    (InputIntent::DeleteWordBackward, "deleteWordBackward"),
    (InputIntent::DeleteSoftLineForward, "deleteSoftLineForward"),
    (InputIntent::DeleteSoftLineBackward, "deleteSoftLineBackward"),
    (InputIntent::DeleteHardLineForward, "deleteHardLineForward"),
    (InputIntent::DeleteHardLineBackward, "deleteHardLineBackward"),
    (InputIntent::DeleteEntireSoftLine, "deleteEntireSoftLine"),
    (InputIntent::DeleteByCut, "deleteByCut"),
    (InputIntent::DeleteByDrag, "deleteByDrag"),
    (InputIntent::DeleteByComposition, "deleteByComposition"),
    (InputIntent::HistoryUndo, "historyUndo"),
    (InputIntent::HistoryRedo, "historyRedo"),
    (InputIntent::FormatBold, "formatBold"),
    (InputIntent::FormatItalic, "formatItalic"),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown input intent: {0}")]
pub struct UnknownIntent(pub String);

impl InputIntent {
    pub fn as_str(&self) -> &'static str {
        INTENT_NAMES
            .iter()
            .find(|(intent, _)| intent == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    pub fn is_delete(&self) -> bool {
        self.as_str().starts_with("delete")
    }

    /// Intents that carry text typed or committed by the user
    fn is_text_entry(&self) -> bool {
        matches!(
            self,
            InputIntent::InsertText | InputIntent::InsertCompositionText | InputIntent::InsertFromComposition
        )
    }
}

impl FromStr for InputIntent {
    type Err = UnknownIntent;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        INTENT_NAMES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(intent, _)| *intent)
            .ok_or_else(|| UnknownIntent(name.to_string()))
    }
}

impl fmt::Display for InputIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to an input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputData {
    Text(String),
    Transfer(TransferPayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeInputEvent {
    pub intent: InputIntent,
    pub data: Option<InputData>,
    /// Surface range the intent applies to, when the surface reports one
    pub target_range: Option<NativeSelection>,
    pub is_composing: bool,
}

impl BeforeInputEvent {
    pub fn new(intent: InputIntent) -> Self {
        Self {
            intent,
            data: None,
            target_range: None,
            is_composing: false,
        }
    }

    /// Build an event from the surface's intent name.
    ///
    /// Unknown intents yield `None` and are ignored.
    pub fn from_native(name: &str, data: Option<InputData>, target_range: Option<NativeSelection>) -> Option<Self> {
        match name.parse::<InputIntent>() {
            Ok(intent) => Some(Self {
                intent,
                data,
                target_range,
                is_composing: false,
            }),
            Err(err) => {
                log::debug!("{err}");
                None
            }
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.data = Some(InputData::Text(text.into()));
        self
    }

    pub fn with_transfer(mut self, payload: TransferPayload) -> Self {
        self.data = Some(InputData::Transfer(payload));
        self
    }

    pub fn with_target(mut self, target: NativeSelection) -> Self {
        self.target_range = Some(target);
        self
    }

    pub fn composing(mut self) -> Self {
        self.is_composing = true;
        self
    }
}

/// A model-level edit the host surface runs against the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    Select(Range),
    DeleteFragment,
    Delete { unit: Unit, direction: Direction },
    InsertBreak,
    InsertText(String),
    InsertData(TransferPayload),
    ToggleMark(String),
    Undo,
    Redo,
    Move { unit: Unit, reverse: bool, extend: bool },
}

impl EditCommand {
    /// Whether the command changes the document rather than only the
    /// selection
    pub fn is_editing(&self) -> bool {
        !matches!(self, EditCommand::Select(_) | EditCommand::Move { .. })
    }
}

/// Translate a structured input event into edit commands.
///
/// `target` is the event's target range already mapped into the model, and
/// `composing` reports an active composition session. The first matching rule
/// wins.
pub fn translate(
    event: &BeforeInputEvent,
    target: Option<Range>,
    selection: Option<&Range>,
    composing: bool,
) -> Vec<EditCommand> {
    let intent = event.intent;
    if (composing || event.is_composing) && intent.is_text_entry() && intent != InputIntent::InsertFromComposition {
        log::trace!("deferring {intent} until composition ends");
        return Vec::new();
    }

    let mut commands = Vec::new();
    let mut selection = selection.cloned();
    if let Some(target) = target
        && !intent.is_delete()
        && selection.as_ref() != Some(&target)
    {
        selection = Some(target.clone());
        commands.push(EditCommand::Select(target));
    }

    if intent.is_delete() && selection.as_ref().is_some_and(Range::is_expanded) {
        commands.push(EditCommand::DeleteFragment);
        return commands;
    }

    let delete = |unit, direction| EditCommand::Delete { unit, direction };
    match intent {
        InputIntent::DeleteByCut | InputIntent::DeleteByDrag | InputIntent::DeleteByComposition => {
            commands.push(EditCommand::DeleteFragment)
        }
        InputIntent::DeleteContent | InputIntent::DeleteContentForward => {
            commands.push(delete(Unit::Character, Direction::Forward))
        }
        InputIntent::DeleteContentBackward => commands.push(delete(Unit::Character, Direction::Backward)),
        InputIntent::DeleteWordForward => commands.push(delete(Unit::Word, Direction::Forward)),
        InputIntent::DeleteWordBackward => commands.push(delete(Unit::Word, Direction::Backward)),
        InputIntent::DeleteSoftLineForward => commands.push(delete(Unit::Line, Direction::Forward)),
        InputIntent::DeleteSoftLineBackward => commands.push(delete(Unit::Line, Direction::Backward)),
        InputIntent::DeleteHardLineForward => commands.push(delete(Unit::Block, Direction::Forward)),
        InputIntent::DeleteHardLineBackward => commands.push(delete(Unit::Block, Direction::Backward)),
        InputIntent::DeleteEntireSoftLine => {
            commands.push(delete(Unit::Block, Direction::Backward));
            commands.push(delete(Unit::Block, Direction::Forward));
        }
        InputIntent::InsertLineBreak | InputIntent::InsertParagraph => commands.push(EditCommand::InsertBreak),
        InputIntent::InsertText
        | InputIntent::InsertReplacementText
        | InputIntent::InsertFromPaste
        | InputIntent::InsertFromDrop
        | InputIntent::InsertFromComposition
        | InputIntent::InsertFromYank => match &event.data {
            Some(InputData::Transfer(payload)) => commands.push(EditCommand::InsertData(payload.clone())),
            Some(InputData::Text(text)) if !text.is_empty() => commands.push(EditCommand::InsertText(text.clone())),
            _ => {}
        },
        InputIntent::InsertCompositionText => {}
        InputIntent::HistoryUndo => commands.push(EditCommand::Undo),
        InputIntent::HistoryRedo => commands.push(EditCommand::Redo),
        InputIntent::FormatBold => commands.push(EditCommand::ToggleMark("bold".to_string())),
        InputIntent::FormatItalic => commands.push(EditCommand::ToggleMark("italic".to_string())),
    }
    commands
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::ModelError;
use crate::model::editor::{ApplyHook, Editor};
use crate::model::operation::Operation;
use crate::model::path::Range;

/// Undo stack depth
const MAX_UNDOS: usize = 100;

/// One undoable unit: the operations of a committed change
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub operations: Vec<Operation>,
    pub selection_before: Option<Range>,
}

/// Undo/redo stacks filled by [`HistoryRecorder`]
#[derive(Debug, Default)]
pub struct History {
    undos: Vec<Batch>,
    redos: Vec<Batch>,
    open: Option<Batch>,
    replaying: bool,
}

pub type SharedHistory = Rc<RefCell<History>>;

impl History {
    pub fn shared() -> SharedHistory {
        Rc::new(RefCell::new(History::default()))
    }

    pub fn can_undo(&self) -> bool {
        !self.undos.is_empty() || self.open.is_some()
    }

    pub fn can_redo(&self) -> bool {
        !self.redos.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undos.len() + usize::from(self.open.is_some())
    }

    /// Close the batch being recorded so the next operation starts a new one
    pub fn seal(&mut self) {
        if let Some(batch) = self.open.take() {
            self.undos.push(batch);
            if self.undos.len() > MAX_UNDOS {
                self.undos.remove(0);
            }
        }
    }

    fn record(&mut self, op: &Operation, selection_before: Option<&Range>) {
        if self.replaying || op.is_selection() {
            return;
        }
        let batch = self.open.get_or_insert_with(|| Batch {
            operations: Vec::new(),
            selection_before: selection_before.cloned(),
        });
        batch.operations.push(op.clone());
        self.redos.clear();
    }

    /// Revert the most recent batch and restore the selection it started with
    pub fn undo(history: &SharedHistory, editor: &mut Editor) -> Result<bool, ModelError> {
        let batch = {
            let mut history = history.borrow_mut();
            history.seal();
            match history.undos.pop() {
                Some(batch) => batch,
                None => return Ok(false),
            }
        };

        Self::replay(history, || {
            for op in batch.operations.iter().rev() {
                editor.apply(op.inverse())?;
            }
            match &batch.selection_before {
                Some(selection) if editor.has_range(selection) => editor.select(selection.clone()),
                _ => Ok(()),
            }
        })?;
        log::debug!("undid {} operations", batch.operations.len());
        history.borrow_mut().redos.push(batch);
        Ok(true)
    }

    /// Reapply the most recently undone batch
    pub fn redo(history: &SharedHistory, editor: &mut Editor) -> Result<bool, ModelError> {
        let Some(batch) = history.borrow_mut().redos.pop() else {
            return Ok(false);
        };

        Self::replay(history, || {
            match &batch.selection_before {
                Some(selection) if editor.has_range(selection) => editor.select(selection.clone())?,
                _ => {}
            }
            for op in &batch.operations {
                editor.apply(op.clone())?;
            }
            Ok(())
        })?;
        log::debug!("redid {} operations", batch.operations.len());
        history.borrow_mut().undos.push(batch);
        Ok(true)
    }

    fn replay(
        history: &SharedHistory,
        apply: impl FnOnce() -> Result<(), ModelError>,
    ) -> Result<(), ModelError> {
        history.borrow_mut().replaying = true;
        let result = apply();
        history.borrow_mut().replaying = false;
        result
    }
}

/// Apply hook that records every committed operation into a [`History`]
pub struct HistoryRecorder {
    history: SharedHistory,
}

impl HistoryRecorder {
    pub fn new(history: SharedHistory) -> Self {
        Self { history }
    }
}

impl ApplyHook for HistoryRecorder {
    fn before_apply(&mut self, editor: &Editor, op: &Operation) {
        self.history.borrow_mut().record(op, editor.selection());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::Node;
    use crate::model::path::Point;
    use pretty_assertions::assert_eq;

    fn editor_with_history() -> (Editor, SharedHistory) {
        let history = History::shared();
        let mut editor = Editor::new(vec![Node::paragraph("ab")]);
        editor.add_hook(Box::new(HistoryRecorder::new(history.clone())));
        editor
            .select(Range::collapsed(Point::new(vec![0, 0], 2)))
            .unwrap();
        (editor, history)
    }

    #[test]
    fn test_undo_reverts_batch_and_restores_selection() {
        let (mut editor, history) = editor_with_history();
        editor.insert_text("c").unwrap();
        editor.insert_break().unwrap();
        history.borrow_mut().seal();

        assert!(History::undo(&history, &mut editor).unwrap());
        assert_eq!(editor.children(), &[Node::paragraph("ab")]);
        assert_eq!(
            editor.selection(),
            Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
        );
        assert!(history.borrow().can_redo());
    }

    #[test]
    fn test_redo_reapplies_batch() {
        let (mut editor, history) = editor_with_history();
        editor.insert_text("c").unwrap();
        history.borrow_mut().seal();
        editor.insert_text("d").unwrap();
        history.borrow_mut().seal();

        History::undo(&history, &mut editor).unwrap();
        History::undo(&history, &mut editor).unwrap();
        assert_eq!(editor.root().string(), "ab");

        History::redo(&history, &mut editor).unwrap();
        assert_eq!(editor.root().string(), "abc");
        assert_eq!(history.borrow().undo_depth(), 1);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let (mut editor, history) = editor_with_history();
        editor.insert_text("c").unwrap();
        History::undo(&history, &mut editor).unwrap();
        assert!(history.borrow().can_redo());

        editor.insert_text("x").unwrap();
        assert!(!history.borrow().can_redo());
    }

    #[test]
    fn test_selection_only_changes_are_not_recorded() {
        let (mut editor, history) = editor_with_history();
        editor.collapse(crate::model::transforms::Edge::Start).unwrap();
        editor
            .select(Range::collapsed(Point::new(vec![0, 0], 0)))
            .unwrap();
        assert!(!history.borrow().can_undo());
        assert!(!History::undo(&history, &mut editor).unwrap());
    }
}

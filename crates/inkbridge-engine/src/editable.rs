/*!
 * # Editable Surface
 *
 * [`Editable`] ties the engine together for a host: it owns the editor, the
 * identity registry, the rendered surface, the selection synchronizer, the
 * virtual clock and the undo history, and exposes one handler per native
 * event.
 *
 * Every handler follows the same shape. It translates the event into
 * [`EditCommand`]s, runs them against the editor and commits once: the
 * committed batch re-renders the surface when the document changed, notifies
 * `on_change` listeners and pushes the model selection back onto the surface.
 *
 * Failures while mapping between the model and the surface abandon the
 * current event with a log line; the next render brings everything back in
 * line.
 */

use std::cell::Ref;
use std::rc::Rc;
use std::time::Duration;

use inkbridge_config::Config;

use crate::capabilities::Capabilities;
use crate::error::EngineError;
use crate::input::{BeforeInputEvent, EditCommand, Hotkey, KeyEvent, translate};
use crate::mapper::Mapper;
use crate::model::{
    Direction, Editor, History, HistoryRecorder, NodeRef, Operation, Point, Range, SharedHistory, Unit,
};
use crate::registry::{KeyMigration, Registry, SharedRegistry};
use crate::render::Renderer;
use crate::schedule::{Scheduler, Task};
use crate::surface::{Surface, SurfaceId, SurfacePosition, attrs};
use crate::sync::{SyncState, Synchronizer};
use crate::transfer::{self, TransferPayload};

type ChangeListener = Box<dyn FnMut(&[Operation])>;

#[derive(Debug, Clone)]
pub struct EditableOptions {
    pub placeholder: Option<String>,
    pub read_only: bool,
    pub selection_debounce: Duration,
    pub capabilities: Capabilities,
}

impl Default for EditableOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EditableOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            placeholder: config.placeholder.clone(),
            read_only: config.read_only,
            selection_debounce: config.selection_debounce(),
            capabilities: Capabilities::for_engine(config.engine, config.apple_keymap),
        }
    }
}

pub struct Editable {
    editor: Editor,
    registry: SharedRegistry,
    history: SharedHistory,
    surface: Surface,
    root: SurfaceId,
    sync: Synchronizer,
    scheduler: Scheduler,
    options: EditableOptions,
    listeners: Vec<ChangeListener>,
    /// Selection being dragged from inside this surface
    dragging: Option<Range>,
}

impl Editable {
    pub fn new(children: Vec<NodeRef>, options: EditableOptions) -> Self {
        let registry = Registry::shared();
        let history = History::shared();
        let mut editor = Editor::new(children);
        editor.add_hook(Box::new(KeyMigration::new(Rc::clone(&registry))));
        editor.add_hook(Box::new(HistoryRecorder::new(Rc::clone(&history))));

        let mut surface = Surface::new();
        let body = surface.body();
        let editable = if options.read_only { "false" } else { "true" };
        let root = surface.append_element(
            body,
            "div",
            &[(attrs::EDITOR, "true"), (attrs::CONTENT_EDITABLE, editable)],
        );

        let mut editable = Self {
            editor,
            registry,
            history,
            surface,
            root,
            sync: Synchronizer::new(),
            scheduler: Scheduler::new(),
            options,
            listeners: Vec::new(),
            dragging: None,
        };
        editable.render();
        editable
    }

    pub fn from_config(children: Vec<NodeRef>, config: &Config) -> Self {
        Self::new(children, EditableOptions::from_config(config))
    }

    // ============ Accessors ============

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Mutable access for hosts driving the native side, such as moving the
    /// native selection before reporting a selection change
    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// The editable root element
    pub fn root(&self) -> SurfaceId {
        self.root
    }

    pub fn registry(&self) -> Ref<'_, Registry> {
        self.registry.borrow()
    }

    pub fn history(&self) -> Ref<'_, History> {
        self.history.borrow()
    }

    pub fn options(&self) -> &EditableOptions {
        &self.options
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Run `f` with a mapper over the current model and surface
    pub fn with_mapper<R>(&self, f: impl FnOnce(&Mapper<'_>) -> R) -> R {
        let registry = self.registry.borrow();
        f(&Mapper::new(&self.editor, &registry, &self.surface))
    }

    // ============ Host controls ============

    pub fn is_focused(&self) -> bool {
        self.sync.is_focused()
    }

    pub fn focus(&mut self) {
        self.surface.focus(self.root);
        self.sync.on_focus(self.root);
        self.sync_surface_selection();
    }

    pub fn blur(&mut self) {
        self.surface.blur();
        self.sync.clear_focus();
    }

    /// Clear both the native and the model selection
    pub fn deselect(&mut self) {
        self.surface.set_selection(None);
        if let Err(err) = self.editor.deselect() {
            log::debug!("Unable to deselect: {err}");
        }
        self.commit();
    }

    /// Replace the model selection, as a host command would
    pub fn select(&mut self, range: Range) {
        self.execute(vec![EditCommand::Select(range)]);
    }

    /// Register a listener called once per committed batch of operations
    pub fn on_change(&mut self, listener: impl FnMut(&[Operation]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Move the virtual clock forward and run every task that became due
    pub fn advance(&mut self, by: Duration) {
        self.scheduler.advance(by);
        for task in self.scheduler.take_due() {
            match task {
                Task::ResolveNativeSelection => self.resolve_native_selection(),
                Task::LeaveApplyingSelection => self.sync.leave_applying(),
                Task::RestoreFocus => {
                    if self.sync.is_focused() {
                        self.surface.focus(self.root);
                    }
                }
            }
        }
    }

    // ============ Focus and selection events ============

    pub fn on_focus(&mut self) {
        self.sync.on_focus(self.root);
    }

    /// Returns whether focus was actually lost
    pub fn on_blur(&mut self, related: Option<SurfaceId>) -> bool {
        self.sync.on_blur(&self.surface, self.root, related)
    }

    /// The surface reported a native selection change
    pub fn on_selection_change(&mut self) {
        if self.sync.ignores_native_selection() {
            log::trace!("ignoring native selection change in state {:?}", self.sync.state());
            return;
        }
        self.scheduler
            .throttle(Task::ResolveNativeSelection, self.options.selection_debounce);
    }

    /// Resolve a native selection change still waiting on the throttle
    fn flush_native_selection(&mut self) {
        if self.scheduler.take(Task::ResolveNativeSelection) {
            self.resolve_native_selection();
        }
    }

    fn resolve_native_selection(&mut self) {
        let result = {
            let registry = self.registry.borrow();
            self.sync
                .resolve_native_selection(&mut self.editor, &registry, &self.surface, self.root)
        };
        if let Err(err) = result {
            log::debug!("Abandoning native selection change: {err}");
        }
        self.commit();
    }

    // ============ Input events ============

    /// Handle a structured input event, returning whether the native default
    /// action must be prevented
    pub fn on_before_input(&mut self, event: &BeforeInputEvent) -> bool {
        if !self.options.capabilities.structured_input_events {
            return false;
        }
        if self.options.read_only {
            return true;
        }
        self.flush_native_selection();

        let target = match event.target_range.filter(|_| !event.intent.is_delete()) {
            Some(native) => match self.with_mapper(|mapper| mapper.to_model_range(&native)) {
                Ok(range) => Some(range),
                Err(err) => {
                    log::debug!("Abandoning {}: {err}", event.intent);
                    return false;
                }
            },
            None => None,
        };

        let commands = translate(event, target, self.editor.selection(), self.sync.is_composing());
        if commands.is_empty() {
            return false;
        }
        self.execute(commands);
        true
    }

    /// Handle a key press, returning whether it was consumed.
    ///
    /// Navigation hotkeys are honoured everywhere; editing hotkeys only on
    /// surfaces without structured input events.
    pub fn on_key_down(&mut self, event: &KeyEvent) -> bool {
        if self.sync.is_composing() {
            return false;
        }
        self.flush_native_selection();
        let Some(hotkey) = Hotkey::matching(event, self.options.capabilities.apple_keymap) else {
            return false;
        };
        if !hotkey.is_navigation()
            && (self.options.read_only || self.options.capabilities.structured_input_events)
        {
            return false;
        }
        log::trace!("hotkey {hotkey:?}");
        self.execute(vec![hotkey.command()]);
        true
    }

    /// Literal text typed on a surface without structured input events
    pub fn on_text_input(&mut self, text: &str) -> bool {
        if text.is_empty()
            || self.options.read_only
            || self.options.capabilities.structured_input_events
            || self.sync.is_composing()
        {
            return false;
        }
        self.flush_native_selection();
        self.execute(vec![EditCommand::InsertText(text.to_string())]);
        true
    }

    // ============ Composition ============

    pub fn on_composition_start(&mut self) {
        self.flush_native_selection();
        if !self.options.read_only && self.editor.selection().is_some_and(Range::is_expanded) {
            self.execute(vec![EditCommand::DeleteFragment]);
        }
        self.sync.begin_composition();
    }

    pub fn on_composition_update(&mut self) {
        if !self.sync.is_composing() {
            self.sync.begin_composition();
        }
    }

    /// Finish composition with the committed `data`
    pub fn on_composition_end(&mut self, data: &str) {
        let deferred = self.sync.end_composition();
        let inserts = !self.options.read_only
            && !data.is_empty()
            && !self.options.capabilities.composition_commits_via_input_event;
        if inserts {
            self.execute(vec![EditCommand::InsertText(data.to_string())]);
        } else if deferred {
            self.sync_surface_selection();
        }
    }

    // ============ Clipboard and drag ============

    pub fn on_copy(&mut self) -> Option<TransferPayload> {
        self.flush_native_selection();
        transfer::serialize(&self.editor)
    }

    /// Serialize the selection and remove it from the document
    pub fn on_cut(&mut self) -> Option<TransferPayload> {
        self.flush_native_selection();
        let payload = transfer::serialize(&self.editor)?;
        if self.options.read_only {
            return Some(payload);
        }
        let command = match self.editor.selection() {
            Some(selection) if selection.is_expanded() => EditCommand::DeleteFragment,
            _ => EditCommand::Delete {
                unit: Unit::Character,
                direction: Direction::Forward,
            },
        };
        self.execute(vec![command]);
        Some(payload)
    }

    /// Paste on surfaces without structured input events; structured surfaces
    /// deliver `insertFromPaste` instead
    pub fn on_paste(&mut self, payload: TransferPayload) -> bool {
        if self.options.capabilities.structured_input_events {
            return false;
        }
        if !self.options.read_only {
            self.flush_native_selection();
            self.execute(vec![EditCommand::InsertData(payload)]);
        }
        true
    }

    /// Start dragging from `target`; dragging a void selects it first
    pub fn on_drag_start(&mut self, target: SurfaceId) -> Option<TransferPayload> {
        self.flush_native_selection();
        let void_start = self
            .surface
            .closest(target, attrs::VOID)
            .filter(|&element| self.surface.contains(self.root, element))
            .and_then(|element| {
                let registry = self.registry.borrow();
                let key = registry.key_for_element(element)?;
                registry.path_of(key).ok()
            })
            .and_then(|path| self.editor.start(&path));
        if let Some(start) = void_start {
            self.execute(vec![EditCommand::Select(Range::collapsed(start))]);
        }

        self.dragging = self.editor.selection().cloned();
        transfer::serialize(&self.editor)
    }

    pub fn on_drag_end(&mut self) {
        self.dragging = None;
    }

    /// Drop `payload` at `position`.
    ///
    /// A drag that started in this surface moves its content: the dragged
    /// range is removed unless the drop lands on it or inside a void.
    pub fn on_drop(&mut self, position: SurfacePosition, payload: TransferPayload) -> bool {
        let dragged = self.dragging.take();
        if self.options.read_only {
            return true;
        }
        let point = match self.with_mapper(|mapper| mapper.to_model_point(&position)) {
            Ok(point) => point,
            Err(err) => {
                log::debug!("Abandoning drop: {err}");
                return false;
            }
        };

        if let Err(err) = self.drop_at(point, dragged, &payload) {
            log::debug!("Abandoning drop: {err}");
        }
        self.commit();
        true
    }

    fn drop_at(&mut self, point: Point, dragged: Option<Range>, payload: &TransferPayload) -> Result<(), EngineError> {
        let target = Range::collapsed(point);
        self.editor.select(target.clone())?;
        if let Some(dragged) = dragged
            && dragged != target
            && self.editor.void_above(&target.anchor.path).is_none()
        {
            self.editor.delete_range(&dragged)?;
            self.editor.normalize()?;
        }
        transfer::insert_data(&mut self.editor, payload)?;
        Ok(())
    }

    // ============ Commands ============

    /// Run `commands` in order and commit them as one batch.
    ///
    /// A failing command abandons the rest of the batch.
    pub fn execute(&mut self, commands: Vec<EditCommand>) {
        for command in commands {
            if self.options.read_only && command.is_editing() {
                log::debug!("read-only surface ignores {command:?}");
                continue;
            }
            if let Err(err) = self.run_command(command) {
                log::debug!("Abandoning edit: {err}");
                break;
            }
        }
        self.commit();
    }

    fn run_command(&mut self, command: EditCommand) -> Result<(), EngineError> {
        if let Some(selection) = self.editor.selection()
            && !self.editor.has_range(selection)
        {
            return Err(EngineError::UnresolvedPoint(selection.anchor.clone()));
        }

        match command {
            EditCommand::Select(range) => {
                if !self.editor.has_range(&range) {
                    return Err(EngineError::UnresolvedPoint(range.anchor));
                }
                self.editor.select(range)?;
            }
            EditCommand::DeleteFragment => self.editor.delete_fragment()?,
            EditCommand::Delete { unit, direction } => self.editor.delete_unit(unit, direction)?,
            EditCommand::InsertBreak => self.editor.insert_break()?,
            EditCommand::InsertText(text) => self.editor.insert_text(&text)?,
            EditCommand::InsertData(payload) => transfer::insert_data(&mut self.editor, &payload)?,
            EditCommand::ToggleMark(mark) => self.editor.toggle_mark(&mark)?,
            EditCommand::Undo => {
                History::undo(&self.history, &mut self.editor)?;
            }
            EditCommand::Redo => {
                History::redo(&self.history, &mut self.editor)?;
            }
            EditCommand::Move { unit, reverse, extend } => self.editor.move_selection(unit, reverse, extend)?,
        }
        Ok(())
    }

    /// Close the current batch: re-render, notify listeners and push the
    /// model selection onto the surface
    fn commit(&mut self) {
        self.history.borrow_mut().seal();
        let Some(operations) = self.editor.flush() else {
            return;
        };
        if operations.iter().any(|op| !op.is_selection()) {
            self.render();
        }
        log::debug!("committed {} operations", operations.len());
        for listener in self.listeners.iter_mut() {
            listener(&operations);
        }
        self.sync_surface_selection();
    }

    fn render(&mut self) {
        let decorations = Synchronizer::placeholder_decorations(&self.editor, self.options.placeholder.as_deref());
        let mut registry = self.registry.borrow_mut();
        Renderer::new(&mut self.surface, &mut registry, &decorations).render_document(self.editor.root(), self.root);
    }

    fn sync_surface_selection(&mut self) {
        let pushed = {
            let registry = self.registry.borrow();
            self.sync
                .push_model_selection(&self.editor, &registry, &mut self.surface, self.root)
        };
        match pushed {
            Ok(true) => {
                self.scheduler.next_turn(Task::LeaveApplyingSelection);
                if self.options.capabilities.refocus_after_selection_update && self.sync.is_focused() {
                    self.scheduler.next_turn(Task::RestoreFocus);
                }
            }
            Ok(false) => {}
            Err(err) => log::debug!("Unable to push model selection: {err}"),
        }
    }
}

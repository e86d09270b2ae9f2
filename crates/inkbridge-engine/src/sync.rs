//! Selection and focus reconciliation between the model and the surface.
//!
//! The synchronizer is a small state machine. Selection flows both ways and
//! the state decides which direction is allowed to win:
//!
//! - `Idle`: native selection changes are pulled into the model
//! - `Composing`: the input method owns the caret, so pushes are deferred
//! - `ApplyingModelSelection`: our own write to the native selection is
//!   echoing back and must not be pulled in again

use crate::error::EngineError;
use crate::mapper::Mapper;
use crate::model::{Editor, Point, Range};
use crate::registry::Registry;
use crate::render::Decoration;
use crate::surface::{Surface, SurfaceId, attrs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Composing,
    ApplyingModelSelection,
}

#[derive(Debug, Default)]
pub struct Synchronizer {
    state: SyncState,
    focused: bool,
    /// Element that held focus when the surface last blurred
    latest_element: Option<SurfaceId>,
    /// A model selection push was skipped during composition
    deferred_push: bool,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_composing(&self) -> bool {
        self.state == SyncState::Composing
    }

    pub fn latest_element(&self) -> Option<SurfaceId> {
        self.latest_element
    }

    pub fn on_focus(&mut self, root: SurfaceId) {
        self.latest_element = Some(root);
        self.focused = true;
    }

    /// Handle a blur of the editable root, returning whether focus was lost.
    ///
    /// A blur is spurious when the surface still reports the root as its
    /// active element, or when focus moved into the non-editable companion
    /// of a void inside the root.
    pub fn on_blur(&mut self, surface: &Surface, root: SurfaceId, related: Option<SurfaceId>) -> bool {
        if self.state == SyncState::ApplyingModelSelection {
            log::trace!("ignoring blur while applying model selection");
            return false;
        }
        self.latest_element = surface.active_element();
        if surface.active_element() == Some(root) || related == Some(root) {
            return false;
        }
        if let Some(related) = related
            && surface.contains(root, related)
            && surface.closest(related, attrs::VOID).is_some()
        {
            log::trace!("focus moved into a void companion, staying focused");
            return false;
        }
        self.focused = false;
        true
    }

    /// Force the unfocused state, as an explicit host blur does
    pub fn clear_focus(&mut self) {
        self.focused = false;
    }

    pub fn begin_composition(&mut self) {
        self.state = SyncState::Composing;
    }

    /// Leave composition, returning whether a selection push was deferred
    pub fn end_composition(&mut self) -> bool {
        if self.state == SyncState::Composing {
            self.state = SyncState::Idle;
        }
        std::mem::take(&mut self.deferred_push)
    }

    pub fn leave_applying(&mut self) {
        if self.state == SyncState::ApplyingModelSelection {
            self.state = SyncState::Idle;
        }
    }

    /// Native selection changes are dropped while composing or while our own
    /// write is echoing back
    pub fn ignores_native_selection(&self) -> bool {
        self.state != SyncState::Idle
    }

    /// Pull the surface's selection into the model.
    ///
    /// A native selection outside `root` clears the model selection.
    pub fn resolve_native_selection(
        &self,
        editor: &mut Editor,
        registry: &Registry,
        surface: &Surface,
        root: SurfaceId,
    ) -> Result<(), EngineError> {
        if self.ignores_native_selection() {
            log::trace!("dropping native selection change in state {:?}", self.state);
            return Ok(());
        }

        let anchored = surface
            .selection()
            .filter(|native| surface.contains(root, native.anchor.node) && surface.contains(root, native.focus.node));
        let Some(native) = anchored else {
            editor.deselect()?;
            return Ok(());
        };

        let range = Mapper::new(editor, registry, surface).to_model_range(&native)?;
        if !editor.has_range(&range) {
            return Err(EngineError::UnresolvedPoint(range.anchor));
        }
        if editor.selection() != Some(&range) {
            log::debug!("native selection resolved to {range:?}");
            editor.select(range)?;
        }
        Ok(())
    }

    /// Push the model selection onto the surface.
    ///
    /// Returns `true` when the native selection was written, in which case
    /// the caller must schedule [`Synchronizer::leave_applying`] for the next
    /// turn.
    pub fn push_model_selection(
        &mut self,
        editor: &Editor,
        registry: &Registry,
        surface: &mut Surface,
        root: SurfaceId,
    ) -> Result<bool, EngineError> {
        if self.state == SyncState::Composing {
            self.deferred_push = true;
            return Ok(false);
        }

        let native = surface
            .selection()
            .filter(|native| surface.contains(root, native.anchor.node) && surface.contains(root, native.focus.node));

        let target = {
            let mapper = Mapper::new(editor, registry, surface);
            let current = native.and_then(|native| mapper.to_model_range(&native).ok());
            match editor.selection() {
                Some(selection) if current.as_ref() == Some(selection) => return Ok(false),
                Some(selection) => Some(mapper.to_native_selection(selection)?),
                None if native.is_none() => return Ok(false),
                None => None,
            }
        };

        self.state = SyncState::ApplyingModelSelection;
        surface.set_selection(target);
        if let Some(target) = target {
            surface.scroll_into_view(target.focus);
        }
        Ok(true)
    }

    /// A placeholder decoration at the start of a document holding only an
    /// empty block
    pub fn placeholder_decorations(editor: &Editor, placeholder: Option<&str>) -> Vec<Decoration> {
        match placeholder {
            Some(text) if editor.is_empty_document() => editor
                .start(&[])
                .map(|start: Point| vec![Decoration::placeholder(Range::collapsed(start), text)])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use crate::render::Renderer;
    use crate::surface::{NativeSelection, SurfacePosition};
    use pretty_assertions::assert_eq;

    struct Fixture {
        editor: Editor,
        registry: Registry,
        surface: Surface,
        root: SurfaceId,
    }

    fn fixture() -> Fixture {
        let editor = Editor::new(vec![Node::paragraph("hello"), Node::void("image")]);
        let mut surface = Surface::new();
        let body = surface.body();
        let root = surface.append_element(body, "div", &[(attrs::EDITOR, "true")]);
        let mut registry = Registry::new();
        Renderer::new(&mut surface, &mut registry, &[]).render_document(editor.root(), root);
        Fixture {
            editor,
            registry,
            surface,
            root,
        }
    }

    fn text_node(fixture: &Fixture, content: &str) -> SurfaceId {
        fixture
            .surface
            .descendants(fixture.root)
            .into_iter()
            .find(|&id| fixture.surface.text(id) == Some(content))
            .unwrap()
    }

    #[test]
    fn test_pull_native_selection() {
        let mut fixture = fixture();
        let hello = text_node(&fixture, "hello");
        fixture
            .surface
            .set_selection(Some(NativeSelection::collapsed(SurfacePosition::new(hello, 3))));

        let sync = Synchronizer::new();
        sync.resolve_native_selection(&mut fixture.editor, &fixture.registry, &fixture.surface, fixture.root)
            .unwrap();

        assert_eq!(
            fixture.editor.selection(),
            Some(&Range::collapsed(Point::new(vec![0, 0], 3)))
        );
    }

    #[test]
    fn test_native_selection_outside_root_clears_model_selection() {
        let mut fixture = fixture();
        fixture
            .editor
            .select(Range::collapsed(Point::new(vec![0, 0], 1)))
            .unwrap();
        let body = fixture.surface.body();
        let outside = fixture.surface.append_text(body, "outside");
        fixture
            .surface
            .set_selection(Some(NativeSelection::collapsed(SurfacePosition::new(outside, 0))));

        Synchronizer::new()
            .resolve_native_selection(&mut fixture.editor, &fixture.registry, &fixture.surface, fixture.root)
            .unwrap();
        assert_eq!(fixture.editor.selection(), None);
    }

    #[test]
    fn test_push_skips_equal_selection() {
        let mut fixture = fixture();
        let hello = text_node(&fixture, "hello");
        fixture
            .surface
            .set_selection(Some(NativeSelection::collapsed(SurfacePosition::new(hello, 2))));
        fixture
            .editor
            .select(Range::collapsed(Point::new(vec![0, 0], 2)))
            .unwrap();

        let mut sync = Synchronizer::new();
        let writes = fixture.surface.selection_writes();
        let pushed = sync
            .push_model_selection(&fixture.editor, &fixture.registry, &mut fixture.surface, fixture.root)
            .unwrap();

        assert!(!pushed);
        assert_eq!(fixture.surface.selection_writes(), writes);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_push_enters_applying_state() {
        let mut fixture = fixture();
        let hello = text_node(&fixture, "hello");
        fixture
            .editor
            .select(Range::new(Point::new(vec![0, 0], 4), Point::new(vec![0, 0], 1)))
            .unwrap();

        let mut sync = Synchronizer::new();
        assert!(
            sync.push_model_selection(&fixture.editor, &fixture.registry, &mut fixture.surface, fixture.root)
                .unwrap()
        );
        assert_eq!(sync.state(), SyncState::ApplyingModelSelection);
        assert!(sync.ignores_native_selection());
        assert_eq!(
            fixture.surface.selection(),
            Some(NativeSelection {
                anchor: SurfacePosition::new(hello, 4),
                focus: SurfacePosition::new(hello, 1),
            })
        );
        assert_eq!(fixture.surface.scroll_requests(), 1);

        sync.leave_applying();
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_push_deferred_while_composing() {
        let mut fixture = fixture();
        fixture
            .editor
            .select(Range::collapsed(Point::new(vec![0, 0], 1)))
            .unwrap();
        let mut sync = Synchronizer::new();
        sync.begin_composition();

        let pushed = sync
            .push_model_selection(&fixture.editor, &fixture.registry, &mut fixture.surface, fixture.root)
            .unwrap();
        assert!(!pushed);
        assert_eq!(fixture.surface.selection(), None);
        assert!(sync.end_composition());
        assert!(!sync.end_composition());
    }

    #[test]
    fn test_blur_rules() {
        let mut fixture = fixture();
        let root = fixture.root;
        let companion = fixture
            .surface
            .descendants(root)
            .into_iter()
            .find(|&id| fixture.surface.has_attr(id, attrs::VOID_CONTENT))
            .unwrap();
        let mut sync = Synchronizer::new();
        sync.on_focus(root);

        fixture.surface.focus(root);
        assert!(!sync.on_blur(&fixture.surface, root, None));
        assert!(sync.is_focused());

        fixture.surface.focus(companion);
        assert!(!sync.on_blur(&fixture.surface, root, Some(companion)));
        assert!(sync.is_focused());

        fixture.surface.blur();
        assert!(sync.on_blur(&fixture.surface, root, None));
        assert!(!sync.is_focused());
    }

    #[test]
    fn test_placeholder_only_for_empty_document() {
        let empty = Editor::new(vec![Node::paragraph("")]);
        let decorations = Synchronizer::placeholder_decorations(&empty, Some("Write"));
        assert_eq!(
            decorations,
            vec![Decoration::placeholder(Range::collapsed(Point::new(vec![0, 0], 0)), "Write")]
        );

        let filled = Editor::new(vec![Node::paragraph("x")]);
        assert!(Synchronizer::placeholder_decorations(&filled, Some("Write")).is_empty());
        assert!(Synchronizer::placeholder_decorations(&empty, None).is_empty());
    }
}

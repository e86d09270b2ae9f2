//! Conversion between model points and surface positions.
//!
//! A model text node renders as one `data-ink-node="text"` element holding
//! one or more leaves. Each leaf ends in a run: either a string run with the
//! literal text, or a zero-width run whose `data-ink-length` declares how
//! many model characters it stands for. Mapping walks those runs in order.

use crate::error::EngineError;
use crate::model::node::char_len;
use crate::model::{Editor, Point, Range};
use crate::registry::Registry;
use crate::surface::{
    NativeSelection, PLACEHOLDER_CHAR, Surface, SurfaceId, SurfacePosition, SurfaceRange, attrs,
};

pub struct Mapper<'a> {
    editor: &'a Editor,
    registry: &'a Registry,
    surface: &'a Surface,
}

impl<'a> Mapper<'a> {
    pub fn new(editor: &'a Editor, registry: &'a Registry, surface: &'a Surface) -> Self {
        Self {
            editor,
            registry,
            surface,
        }
    }

    fn runs(&self, text_element: SurfaceId) -> Vec<SurfaceId> {
        self.surface
            .descendants(text_element)
            .into_iter()
            .filter(|&id| self.surface.has_attr(id, attrs::STRING) || self.surface.has_attr(id, attrs::ZERO_WIDTH))
            .collect()
    }

    fn run_text_node(&self, run: SurfaceId) -> Option<SurfaceId> {
        self.surface
            .children(run)
            .iter()
            .copied()
            .find(|&child| self.surface.is_text(child))
    }

    /// Model characters a run stands for
    fn run_length(&self, run: SurfaceId, text_node: SurfaceId) -> usize {
        if self.surface.has_attr(run, attrs::ZERO_WIDTH) {
            self.surface
                .attr(run, attrs::LENGTH)
                .and_then(|length| length.parse().ok())
                .unwrap_or(0)
        } else {
            self.surface.text(text_node).map_or(0, char_len)
        }
    }

    pub fn to_surface_point(&self, point: &Point) -> Result<SurfacePosition, EngineError> {
        let unresolved = || EngineError::UnresolvedPoint(point.clone());
        let node = self.editor.node(&point.path).ok_or_else(unresolved)?;
        let key = self.registry.find_key(node).ok_or_else(unresolved)?;
        let text_element = self.registry.element_of(key).map_err(|_| unresolved())?;

        let offset = if self.editor.void_above(&point.path).is_some() {
            0
        } else {
            point.offset
        };

        let runs = self.runs(text_element);
        let mut start = 0;
        for (index, &run) in runs.iter().enumerate() {
            let Some(text_node) = self.run_text_node(run) else {
                continue;
            };
            let end = start + self.run_length(run, text_node);
            if offset <= end || index + 1 == runs.len() {
                let stored = self.surface.text(text_node).map_or(0, char_len);
                let local = offset.saturating_sub(start).min(stored);
                return Ok(SurfacePosition::new(text_node, local));
            }
            start = end;
        }
        Err(unresolved())
    }

    /// Surface positions of `range` in document order
    pub fn to_surface_range(&self, range: &Range) -> Result<SurfaceRange, EngineError> {
        let (start, end) = range.edges();
        let start = self.to_surface_point(&start)?;
        let end = if range.is_collapsed() {
            start
        } else {
            self.to_surface_point(&end)?
        };
        Ok(SurfaceRange { start, end })
    }

    /// `range` as a native selection, keeping its direction
    pub fn to_native_selection(&self, range: &Range) -> Result<NativeSelection, EngineError> {
        let surface_range = self.to_surface_range(range)?;
        Ok(if range.is_backward() {
            NativeSelection {
                anchor: surface_range.end,
                focus: surface_range.start,
            }
        } else {
            NativeSelection {
                anchor: surface_range.start,
                focus: surface_range.end,
            }
        })
    }

    /// Descend from a container position to the nearest text node, skipping
    /// non-editable children and preferring the side the offset points at
    fn normalize(&self, position: SurfacePosition) -> SurfacePosition {
        let surface = self.surface;
        if !surface.is_element(position.node) {
            return position;
        }
        let children = surface.children(position.node);
        if children.is_empty() {
            return position;
        }

        let mut at_end = position.offset >= children.len();
        let index = if at_end { children.len() - 1 } else { position.offset };
        let Some((mut node, found)) = self.editable_child(position.node, index, at_end) else {
            return position;
        };
        at_end = found < position.offset;

        while surface.is_element(node) && !surface.children(node).is_empty() {
            let count = surface.children(node).len();
            let index = if at_end { count - 1 } else { 0 };
            match self.editable_child(node, index, at_end) {
                Some((child, _)) => node = child,
                None => break,
            }
        }

        let offset = if at_end { surface.text(node).map_or(0, char_len) } else { 0 };
        SurfacePosition::new(node, offset)
    }

    /// The child at `index`, or the nearest editable one searching away from
    /// the preferred side first
    fn editable_child(&self, parent: SurfaceId, index: usize, backward: bool) -> Option<(SurfaceId, usize)> {
        let children = self.surface.children(parent);
        let editable = |i: usize| self.surface.attr(children[i], attrs::CONTENT_EDITABLE) != Some("false");
        if editable(index) {
            return Some((children[index], index));
        }
        let backward_search = (0..index).rev();
        let forward_search = index + 1..children.len();
        let found = if backward {
            backward_search.clone().find(|&i| editable(i)).or_else(|| forward_search.clone().find(|&i| editable(i)))
        } else {
            forward_search.clone().find(|&i| editable(i)).or_else(|| backward_search.clone().find(|&i| editable(i)))
        };
        found.map(|i| (children[i], i))
    }

    /// Characters a text node contributes to the model offset, counting the
    /// first `limit` of them
    fn measured(&self, text_node: SurfaceId, limit: Option<usize>) -> usize {
        if self.surface.is_non_editable(text_node) {
            return 0;
        }
        let in_zero_width = self.surface.closest(text_node, attrs::ZERO_WIDTH).is_some();
        let text = self.surface.text(text_node).unwrap_or_default();
        text.chars()
            .take(limit.unwrap_or(usize::MAX))
            .filter(|&c| !(in_zero_width && c == PLACEHOLDER_CHAR))
            .count()
    }

    fn text_element_of(&self, id: SurfaceId) -> Option<SurfaceId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.surface.attr(node, attrs::NODE) == Some("text") {
                return Some(node);
            }
            current = self.surface.parent(node);
        }
        None
    }

    pub fn to_model_point(&self, position: &SurfacePosition) -> Result<Point, EngineError> {
        let unresolved = || EngineError::UnresolvedSurfacePosition(*position);
        let normalized = self.normalize(*position);
        let surface = self.surface;
        let context = if surface.is_text(normalized.node) {
            surface.parent(normalized.node).ok_or_else(unresolved)?
        } else {
            normalized.node
        };

        let void = surface.closest(context, attrs::VOID);
        let leaf = surface.closest(context, attrs::LEAF);

        let (text_element, offset) = match (leaf, void) {
            (Some(leaf), _) => {
                let text_element = self.text_element_of(leaf).ok_or_else(unresolved)?;
                let mut offset = 0;
                let mut total = 0;
                let mut reached = false;
                for node in surface.descendants(text_element) {
                    if !surface.is_text(node) {
                        continue;
                    }
                    let full = self.measured(node, None);
                    total += full;
                    if reached {
                        continue;
                    }
                    if node == normalized.node {
                        offset += self.measured(node, Some(normalized.offset));
                        reached = true;
                    } else {
                        offset += full;
                    }
                }
                if !reached {
                    return Err(unresolved());
                }
                let in_zero_width = surface.closest(context, attrs::ZERO_WIDTH).is_some();
                if in_zero_width && offset == total && offset > 0 {
                    offset -= 1;
                }
                (text_element, offset)
            }
            (None, Some(void)) => {
                let leaf = surface
                    .descendants(void)
                    .into_iter()
                    .find(|&id| surface.has_attr(id, attrs::LEAF))
                    .ok_or_else(unresolved)?;
                (self.text_element_of(leaf).ok_or_else(unresolved)?, 0)
            }
            (None, None) => return Err(unresolved()),
        };

        let key = self.registry.key_for_element(text_element).ok_or_else(unresolved)?;
        let path = self.registry.path_of(key)?;
        let offset = if self.editor.void_above(&path).is_some() { 0 } else { offset };
        Ok(Point::new(path, offset))
    }

    pub fn to_model_range(&self, selection: &NativeSelection) -> Result<Range, EngineError> {
        let anchor = self.to_model_point(&selection.anchor)?;
        let focus = if selection.is_collapsed() {
            anchor.clone()
        } else {
            self.to_model_point(&selection.focus)?
        };
        Ok(Range::new(anchor, focus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeRef};
    use crate::render::{Decoration, Renderer};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct Fixture {
        editor: Editor,
        registry: Registry,
        surface: Surface,
        container: SurfaceId,
    }

    impl Fixture {
        fn new(children: Vec<NodeRef>, decorations: &[Decoration]) -> Self {
            let editor = Editor::new(children);
            let mut surface = Surface::new();
            let body = surface.body();
            let container = surface.append_element(body, "div", &[(attrs::EDITOR, "true")]);
            let mut registry = Registry::new();
            Renderer::new(&mut surface, &mut registry, decorations).render_document(editor.root(), container);
            Self {
                editor,
                registry,
                surface,
                container,
            }
        }

        fn mapper(&self) -> Mapper<'_> {
            Mapper::new(&self.editor, &self.registry, &self.surface)
        }

        fn find(&self, predicate: impl Fn(SurfaceId) -> bool) -> SurfaceId {
            self.surface
                .descendants(self.container)
                .into_iter()
                .find(|&id| predicate(id))
                .unwrap()
        }
    }

    fn mixed() -> Vec<NodeRef> {
        vec![
            Node::element("paragraph", vec![Node::text("ab"), Node::marked("cd", ["bold"])]),
            Node::void("image"),
            Node::paragraph(""),
            Node::paragraph("héllo"),
        ]
    }

    #[rstest]
    #[case(Point::new(vec![0, 0], 0))]
    #[case(Point::new(vec![0, 0], 2))]
    #[case(Point::new(vec![0, 1], 1))]
    #[case(Point::new(vec![0, 1], 2))]
    #[case(Point::new(vec![1, 0], 0))]
    #[case(Point::new(vec![2, 0], 0))]
    #[case(Point::new(vec![3, 0], 3))]
    fn test_round_trip(#[case] point: Point) {
        let fixture = Fixture::new(mixed(), &[]);
        let mapper = fixture.mapper();
        let position = mapper.to_surface_point(&point).unwrap();
        assert_eq!(mapper.to_model_point(&position).unwrap(), point);
    }

    #[test]
    fn test_void_offset_clamps_to_zero() {
        let fixture = Fixture::new(
            vec![Node::element(
                "paragraph",
                vec![
                    Node::text("ab"),
                    Node::inline_void("mention"),
                    Node::text("cd"),
                ],
            )],
            &[],
        );
        let mapper = fixture.mapper();
        let position = mapper.to_surface_point(&Point::new(vec![0, 1, 0], 5)).unwrap();
        assert_eq!(position.offset, 0);
        assert_eq!(
            mapper.to_model_point(&position).unwrap(),
            Point::new(vec![0, 1, 0], 0)
        );
    }

    #[test]
    fn test_boundary_binds_to_earlier_leaf() {
        let decoration = Decoration {
            range: Range::new(Point::new(vec![0, 0], 2), Point::new(vec![0, 0], 4)),
            marks: ["bold".to_string()].into_iter().collect(),
            placeholder: None,
        };
        let fixture = Fixture::new(vec![Node::paragraph("abcdef")], &[decoration]);
        let mapper = fixture.mapper();

        let first_run = fixture.find(|id| fixture.surface.text(id) == Some("ab"));
        let position = mapper.to_surface_point(&Point::new(vec![0, 0], 2)).unwrap();
        assert_eq!(position, SurfacePosition::new(first_run, 2));

        let last_run = fixture.find(|id| fixture.surface.text(id) == Some("ef"));
        let position = mapper.to_surface_point(&Point::new(vec![0, 0], 6)).unwrap();
        assert_eq!(position, SurfacePosition::new(last_run, 2));
        assert_eq!(
            mapper.to_model_point(&SurfacePosition::new(last_run, 0)).unwrap(),
            Point::new(vec![0, 0], 4)
        );
    }

    #[test]
    fn test_surface_range_is_ordered() {
        let fixture = Fixture::new(mixed(), &[]);
        let mapper = fixture.mapper();
        let backward = Range::new(Point::new(vec![3, 0], 1), Point::new(vec![0, 0], 1));

        let range = mapper.to_surface_range(&backward).unwrap();
        assert!(fixture.surface.compare_positions(&range.start, &range.end).is_lt());

        let native = mapper.to_native_selection(&backward).unwrap();
        assert_eq!(native.anchor, range.end);
        assert_eq!(native.focus, range.start);
        assert_eq!(mapper.to_model_range(&native).unwrap(), backward);
    }

    #[test]
    fn test_container_positions_descend_to_text() {
        let fixture = Fixture::new(mixed(), &[]);
        let mapper = fixture.mapper();

        let start = SurfacePosition::new(fixture.container, 0);
        assert_eq!(mapper.to_model_point(&start).unwrap(), Point::new(vec![0, 0], 0));

        let paragraph = fixture.surface.children(fixture.container)[3];
        let end = SurfacePosition::new(paragraph, 1);
        assert_eq!(mapper.to_model_point(&end).unwrap(), Point::new(vec![3, 0], 5));
    }

    #[test]
    fn test_position_in_companion_resolves_to_void() {
        let fixture = Fixture::new(mixed(), &[]);
        let mapper = fixture.mapper();
        let companion = fixture.find(|id| fixture.surface.has_attr(id, attrs::VOID_CONTENT));
        let caption = fixture.surface.children(companion)[0];

        assert_eq!(
            mapper.to_model_point(&SurfacePosition::new(caption, 3)).unwrap(),
            Point::new(vec![1, 0], 0)
        );
    }

    #[test]
    fn test_placeholder_text_is_not_measured() {
        let decoration = Decoration::placeholder(Range::collapsed(Point::new(vec![0, 0], 0)), "Write");
        let fixture = Fixture::new(vec![Node::paragraph("")], &[decoration]);
        let mapper = fixture.mapper();

        let position = mapper.to_surface_point(&Point::new(vec![0, 0], 0)).unwrap();
        assert_eq!(fixture.surface.text(position.node), Some("\u{FEFF}"));
        assert_eq!(
            mapper.to_model_point(&SurfacePosition::new(position.node, 1)).unwrap(),
            Point::new(vec![0, 0], 0)
        );
    }

    #[test]
    fn test_text_typed_into_zero_width_run_is_corrected() {
        let mut fixture = Fixture::new(vec![Node::paragraph("")], &[]);
        let run = fixture.find(|id| fixture.surface.text(id) == Some("\u{FEFF}"));
        fixture.surface.set_text(run, "x\u{FEFF}");
        let mapper = fixture.mapper();

        assert_eq!(
            mapper.to_model_point(&SurfacePosition::new(run, 1)).unwrap(),
            Point::new(vec![0, 0], 0)
        );
    }

    #[test]
    fn test_full_length_of_regular_run_is_kept() {
        let fixture = Fixture::new(vec![Node::paragraph("ab")], &[]);
        let run = fixture.find(|id| fixture.surface.text(id) == Some("ab"));
        let mapper = fixture.mapper();

        assert_eq!(
            mapper.to_model_point(&SurfacePosition::new(run, 2)).unwrap(),
            Point::new(vec![0, 0], 2)
        );
    }

    #[test]
    fn test_outside_positions_fail() {
        let mut fixture = Fixture::new(mixed(), &[]);
        let body = fixture.surface.body();
        let outside = fixture.surface.append_text(body, "elsewhere");
        let mapper = fixture.mapper();

        assert!(matches!(
            mapper.to_model_point(&SurfacePosition::new(outside, 2)),
            Err(EngineError::UnresolvedSurfacePosition(_))
        ));
        assert!(matches!(
            mapper.to_surface_point(&Point::new(vec![9, 0], 0)),
            Err(EngineError::UnresolvedPoint(_))
        ));
    }
}

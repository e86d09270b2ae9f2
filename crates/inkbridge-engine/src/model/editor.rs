use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::model::ModelError;
use crate::model::node::{self, Node, NodeRef, byte_index, char_len, char_offset};
use crate::model::operation::{self, Operation};
use crate::model::path::{self, Affinity, Path, Point, Range};
use crate::model::transforms::Unit;

/// Upper bound on normalization steps for a single pass
const MAX_NORMALIZE_STEPS: usize = 1_000;

/// Observer wrapped around [`Editor::apply`].
///
/// Hooks run in registration order before an operation lands and in reverse
/// order after it landed, like nested middleware.
pub trait ApplyHook {
    fn before_apply(&mut self, _editor: &Editor, _op: &Operation) {}
    fn after_apply(&mut self, _editor: &Editor, _op: &Operation) {}
}

/// The document model plus its selection.
///
/// All mutation goes through [`Editor::apply`]; the operations applied since
/// the last [`Editor::flush`] form one committed change.
pub struct Editor {
    pub(crate) root: NodeRef,
    pub(crate) selection: Option<Range>,
    /// Marks applied to the next inserted text at a collapsed selection
    pub(crate) marks: Option<BTreeSet<String>>,
    operations: Vec<Operation>,
    hooks: Vec<Box<dyn ApplyHook>>,
    version: u64,
}

impl Editor {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self {
            root: Node::root(children),
            selection: None,
            marks: None,
            operations: Vec::new(),
            hooks: Vec::new(),
            version: 0,
        }
    }

    pub fn add_hook(&mut self, hook: Box<dyn ApplyHook>) {
        self.hooks.push(hook);
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn children(&self) -> &[NodeRef] {
        self.root.children()
    }

    pub fn selection(&self) -> Option<&Range> {
        self.selection.as_ref()
    }

    pub fn marks(&self) -> Option<&BTreeSet<String>> {
        self.marks.as_ref()
    }

    /// Number of operations applied over the editor's lifetime
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Operations applied since the last flush
    pub fn pending_operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Apply one operation through the hook chain
    pub fn apply(&mut self, op: Operation) -> Result<(), ModelError> {
        let mut hooks = std::mem::take(&mut self.hooks);
        for hook in hooks.iter_mut() {
            hook.before_apply(self, &op);
        }

        let result = self.apply_operation(&op);
        if result.is_ok() {
            for hook in hooks.iter_mut().rev() {
                hook.after_apply(self, &op);
            }
            log::trace!("applied {op:?}");
            self.operations.push(op);
            self.version += 1;
        }

        hooks.append(&mut self.hooks);
        self.hooks = hooks;
        result
    }

    /// Take the operations applied since the last flush.
    ///
    /// Returns `None` when nothing changed, so callers notify observers once
    /// per batch of synchronous mutations.
    pub fn flush(&mut self) -> Option<Vec<Operation>> {
        if self.operations.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.operations))
        }
    }

    fn apply_operation(&mut self, op: &Operation) -> Result<(), ModelError> {
        if let Operation::SetSelection { new_selection, .. } = op {
            self.selection = new_selection.clone();
            self.marks = None;
            return Ok(());
        }

        operation::apply_to_tree(&mut self.root, op)?;
        if let Some(selection) = self.selection.take() {
            let anchor = self.transform_point(&selection.anchor, op);
            let focus = self.transform_point(&selection.focus, op);
            self.selection = anchor.zip(focus).map(|(anchor, focus)| Range { anchor, focus });
        }
        Ok(())
    }

    /// Move a selection point through `op`, falling back to the nearest text
    /// when its own node was removed
    fn transform_point(&self, point: &Point, op: &Operation) -> Option<Point> {
        if let Some(point) = point.transform(op, Affinity::Forward) {
            return Some(point);
        }
        let Operation::RemoveNode { path: removed, .. } = op else {
            return None;
        };

        let texts = node::texts(&self.root);
        let previous = texts
            .iter()
            .rev()
            .find(|(p, _)| path::compare(p, removed).is_lt());
        let next = texts
            .iter()
            .find(|(p, _)| !path::compare(p, removed).is_lt());

        let prefer_next = match (previous, next) {
            (Some((previous, _)), Some((next, _))) => {
                if next == removed {
                    next.last().is_some_and(|&index| index == 0)
                } else {
                    path::common(previous, removed).len() < path::common(next, removed).len()
                }
            }
            _ => false,
        };

        match (previous, next) {
            (Some((path, node)), _) if !prefer_next => {
                Some(Point::new(path.clone(), node.as_text().map_or(0, |t| t.len())))
            }
            (_, Some((path, _))) => Some(Point::new(path.clone(), 0)),
            _ => None,
        }
    }

    // ============ Queries ============

    pub fn node(&self, path: &[usize]) -> Option<&NodeRef> {
        node::get(&self.root, path)
    }

    /// The root and every ancestor of `path` down to the node itself
    pub fn levels(&self, path: &[usize]) -> Vec<(Path, NodeRef)> {
        (0..=path.len())
            .map_while(|depth| {
                let prefix = path[..depth].to_vec();
                self.node(&prefix).map(|node| (prefix, node.clone()))
            })
            .collect()
    }

    /// Concatenated text under `path`
    pub fn string(&self, path: &[usize]) -> String {
        self.node(path).map(|node| node.string()).unwrap_or_default()
    }

    /// Lowest void element containing `path`, the node itself included
    pub fn void_above(&self, path: &[usize]) -> Option<Path> {
        self.levels(path)
            .into_iter()
            .rev()
            .find(|(_, node)| node.is_void())
            .map(|(path, _)| path)
    }

    /// Lowest block element containing `path`, never the root
    pub fn block_above(&self, path: &[usize]) -> Option<Path> {
        self.levels(path)
            .into_iter()
            .rev()
            .find(|(path, node)| !path.is_empty() && node.is_block())
            .map(|(path, _)| path)
    }

    pub fn has_point(&self, point: &Point) -> bool {
        matches!(
            self.node(&point.path).map(|n| n.as_ref()),
            Some(Node::Text(text)) if point.offset <= text.len()
        )
    }

    pub fn has_range(&self, range: &Range) -> bool {
        self.has_point(&range.anchor) && self.has_point(&range.focus)
    }

    pub fn start(&self, path: &[usize]) -> Option<Point> {
        node::first_text(&self.root, path).map(|path| Point::new(path, 0))
    }

    pub fn end(&self, path: &[usize]) -> Option<Point> {
        let path = node::last_text(&self.root, path)?;
        let len = self.node(&path)?.as_text()?.len();
        Some(Point::new(path, len))
    }

    /// The document is one block holding one empty text
    pub fn is_empty_document(&self) -> bool {
        let texts = node::texts(&self.root);
        self.children().len() == 1 && texts.len() == 1 && self.root.string().is_empty()
    }

    /// Offset of `point` counted from the start of the block at `block`
    pub fn block_offset(&self, block: &[usize], point: &Point) -> Option<usize> {
        let block_node = self.node(block)?;
        let mut offset = 0;
        for (path, leaf) in node::texts(block_node) {
            let full: Path = block.iter().copied().chain(path).collect();
            if full == point.path {
                return Some(offset + point.offset);
            }
            offset += leaf.as_text().map_or(0, |t| t.len());
        }
        None
    }

    /// The point at `offset` chars into the block at `block`.
    ///
    /// Boundary offsets bind to the end of the earlier leaf.
    pub fn point_at_block_offset(&self, block: &[usize], offset: usize) -> Option<Point> {
        let block_node = self.node(block)?;
        let mut start = 0;
        let mut last = None;
        for (path, leaf) in node::texts(block_node) {
            let full: Path = block.iter().copied().chain(path).collect();
            let len = leaf.as_text().map_or(0, |t| t.len());
            if start + len >= offset {
                return Some(Point::new(full, offset - start));
            }
            start += len;
            last = Some(Point::new(full, len));
        }
        last
    }

    /// The position one `unit` before `at`, crossing into the previous block
    /// when `at` sits at a block start
    pub fn before(&self, at: &Point, unit: Unit) -> Option<Point> {
        let block = self.block_above(&at.path);
        if let Some(block) = &block
            && self.void_above(&at.path).is_none()
        {
            let offset = self.block_offset(block, at)?;
            if offset > 0 {
                let text = self.string(block);
                let target = match unit {
                    Unit::Character => previous_grapheme(&text, offset),
                    Unit::Word => previous_word(&text, offset),
                    Unit::Line | Unit::Block => 0,
                };
                return self.point_at_block_offset(block, target);
            }
        }

        let first = match &block {
            Some(block) => node::first_text(&self.root, block)?,
            None => at.path.clone(),
        };
        let texts = node::texts(&self.root);
        let index = texts.iter().position(|(path, _)| *path == first)?;
        let (path, leaf) = texts.get(index.checked_sub(1)?)?;
        let offset = if self.void_above(path).is_some() {
            0
        } else {
            leaf.as_text().map_or(0, |t| t.len())
        };
        Some(Point::new(path.clone(), offset))
    }

    /// The position one `unit` after `at`, crossing into the next block when
    /// `at` sits at a block end
    pub fn after(&self, at: &Point, unit: Unit) -> Option<Point> {
        let block = self.block_above(&at.path);
        if let Some(block) = &block
            && self.void_above(&at.path).is_none()
        {
            let offset = self.block_offset(block, at)?;
            let text = self.string(block);
            let len = char_len(&text);
            if offset < len {
                let target = match unit {
                    Unit::Character => next_grapheme(&text, offset),
                    Unit::Word => next_word(&text, offset),
                    Unit::Line | Unit::Block => len,
                };
                return self.point_at_block_offset(block, target);
            }
        }

        let last = match &block {
            Some(block) => node::last_text(&self.root, block)?,
            None => at.path.clone(),
        };
        let texts = node::texts(&self.root);
        let index = texts.iter().position(|(path, _)| *path == last)?;
        let (path, _) = texts.get(index + 1)?;
        Some(Point::new(path.clone(), 0))
    }

    // ============ Normalization ============

    /// Restore the tree invariants the rest of the engine relies on.
    ///
    /// Elements are never empty (the root gets an empty paragraph), adjacent
    /// texts with equal marks are merged and empty texts do not linger next
    /// to other texts.
    pub fn normalize(&mut self) -> Result<(), ModelError> {
        for _ in 0..MAX_NORMALIZE_STEPS {
            match self.next_normalization() {
                Some(op) => self.apply(op)?,
                None => return Ok(()),
            }
        }
        log::warn!("normalization did not settle after {MAX_NORMALIZE_STEPS} steps");
        Ok(())
    }

    fn next_normalization(&self) -> Option<Operation> {
        let root = (Vec::new(), self.root.clone());
        for (path, node) in std::iter::once(root).chain(node::descendants(&self.root)) {
            let Node::Element(element) = node.as_ref() else {
                continue;
            };
            let child_path = |index: usize| -> Path {
                path.iter().copied().chain(std::iter::once(index)).collect()
            };

            if element.children.is_empty() {
                let node = if path.is_empty() {
                    Node::paragraph("")
                } else {
                    Node::text("")
                };
                return Some(Operation::InsertNode {
                    path: child_path(0),
                    node,
                });
            }

            for index in 1..element.children.len() {
                let previous = &element.children[index - 1];
                let current = &element.children[index];
                let (Some(prev_text), Some(text)) = (previous.as_text(), current.as_text()) else {
                    continue;
                };
                if prev_text.marks == text.marks {
                    return Some(Operation::MergeNode {
                        path: child_path(index),
                        position: prev_text.len(),
                        properties: current.properties(),
                    });
                }
                if prev_text.is_empty() {
                    return Some(Operation::RemoveNode {
                        path: child_path(index - 1),
                        node: previous.clone(),
                    });
                }
                if text.is_empty() {
                    return Some(Operation::RemoveNode {
                        path: child_path(index),
                        node: current.clone(),
                    });
                }
            }
        }
        None
    }
}

fn previous_grapheme(text: &str, offset: usize) -> usize {
    let at = byte_index(text, offset);
    text[..at]
        .grapheme_indices(true)
        .next_back()
        .map_or(0, |(index, _)| char_offset(text, index))
}

fn next_grapheme(text: &str, offset: usize) -> usize {
    let at = byte_index(text, offset);
    text[at..]
        .graphemes(true)
        .next()
        .map_or(offset, |grapheme| offset + char_len(grapheme))
}

fn is_word(segment: &str) -> bool {
    segment.chars().any(char::is_alphanumeric)
}

fn previous_word(text: &str, offset: usize) -> usize {
    let at = byte_index(text, offset);
    text[..at]
        .split_word_bound_indices()
        .rev()
        .find(|(_, segment)| is_word(segment))
        .map_or(0, |(index, _)| char_offset(text, index))
}

fn next_word(text: &str, offset: usize) -> usize {
    let at = byte_index(text, offset);
    text[at..]
        .split_word_bound_indices()
        .find(|(_, segment)| is_word(segment))
        .map_or(char_len(text), |(index, segment)| {
            char_offset(text, at + index + segment.len())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor() -> Editor {
        Editor::new(vec![
            Node::paragraph("hello world"),
            Node::void("image"),
            Node::element(
                "paragraph",
                vec![Node::text("ab"), Node::marked("cd", ["bold"])],
            ),
        ])
    }

    struct Recorder(Rc<RefCell<Vec<String>>>, &'static str);

    impl ApplyHook for Recorder {
        fn before_apply(&mut self, _editor: &Editor, _op: &Operation) {
            self.0.borrow_mut().push(format!("{}:before", self.1));
        }
        fn after_apply(&mut self, _editor: &Editor, _op: &Operation) {
            self.0.borrow_mut().push(format!("{}:after", self.1));
        }
    }

    #[test]
    fn test_hooks_wrap_apply_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut editor = editor();
        editor.add_hook(Box::new(Recorder(log.clone(), "outer")));
        editor.add_hook(Box::new(Recorder(log.clone(), "inner")));

        editor
            .apply(Operation::InsertText {
                path: vec![0, 0],
                offset: 0,
                text: "x".to_string(),
            })
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
    }

    #[test]
    fn test_flush_batches_operations() {
        let mut editor = editor();
        assert!(editor.flush().is_none());
        for offset in [0, 1] {
            editor
                .apply(Operation::InsertText {
                    path: vec![0, 0],
                    offset,
                    text: "x".to_string(),
                })
                .unwrap();
        }
        assert_eq!(editor.flush().map(|ops| ops.len()), Some(2));
        assert!(editor.flush().is_none());
        assert_eq!(editor.version(), 2);
    }

    #[test]
    fn test_selection_follows_removed_node_to_previous_text() {
        let mut editor = editor();
        editor.selection = Some(Range::collapsed(Point::new(vec![2, 1], 1)));
        let node = editor.node(&[2]).unwrap().clone();
        editor
            .apply(Operation::RemoveNode {
                path: vec![2],
                node,
            })
            .unwrap();

        assert_eq!(
            editor.selection(),
            Some(&Range::collapsed(Point::new(vec![1, 0], 0)))
        );
    }

    #[test]
    fn test_block_offsets_span_leaves() {
        let editor = editor();
        assert_eq!(
            editor.block_offset(&[2], &Point::new(vec![2, 1], 1)),
            Some(3)
        );
        assert_eq!(
            editor.point_at_block_offset(&[2], 2),
            Some(Point::new(vec![2, 0], 2))
        );
        assert_eq!(
            editor.point_at_block_offset(&[2], 3),
            Some(Point::new(vec![2, 1], 1))
        );
    }

    #[rstest]
    #[case(Point::new(vec![0, 0], 11), Unit::Character, Some(Point::new(vec![0, 0], 10)))]
    #[case(Point::new(vec![0, 0], 11), Unit::Word, Some(Point::new(vec![0, 0], 6)))]
    #[case(Point::new(vec![0, 0], 6), Unit::Word, Some(Point::new(vec![0, 0], 0)))]
    #[case(Point::new(vec![0, 0], 4), Unit::Line, Some(Point::new(vec![0, 0], 0)))]
    #[case(Point::new(vec![0, 0], 0), Unit::Character, None)]
    #[case(Point::new(vec![2, 0], 0), Unit::Character, Some(Point::new(vec![1, 0], 0)))]
    #[case(Point::new(vec![1, 0], 0), Unit::Character, Some(Point::new(vec![0, 0], 11)))]
    fn test_before(#[case] at: Point, #[case] unit: Unit, #[case] expected: Option<Point>) {
        assert_eq!(editor().before(&at, unit), expected);
    }

    #[rstest]
    #[case(Point::new(vec![0, 0], 0), Unit::Word, Some(Point::new(vec![0, 0], 5)))]
    #[case(Point::new(vec![0, 0], 5), Unit::Word, Some(Point::new(vec![0, 0], 11)))]
    #[case(Point::new(vec![0, 0], 11), Unit::Character, Some(Point::new(vec![1, 0], 0)))]
    #[case(Point::new(vec![2, 0], 1), Unit::Block, Some(Point::new(vec![2, 1], 2)))]
    #[case(Point::new(vec![2, 1], 2), Unit::Character, None)]
    fn test_after(#[case] at: Point, #[case] unit: Unit, #[case] expected: Option<Point>) {
        assert_eq!(editor().after(&at, unit), expected);
    }

    #[test]
    fn test_before_steps_over_whole_graphemes() {
        let editor = Editor::new(vec![Node::paragraph("ae\u{301}")]);
        assert_eq!(
            editor.before(&Point::new(vec![0, 0], 3), Unit::Character),
            Some(Point::new(vec![0, 0], 1))
        );
    }

    #[test]
    fn test_normalize_merges_and_fills() {
        let mut editor = Editor::new(vec![
            Node::element("paragraph", vec![Node::text("a"), Node::text("b")]),
            Node::element("paragraph", vec![]),
            Node::element("paragraph", vec![Node::text(""), Node::marked("c", ["bold"])]),
        ]);
        editor.normalize().unwrap();

        assert_eq!(
            editor.children(),
            &[
                Node::paragraph("ab"),
                Node::paragraph(""),
                Node::element("paragraph", vec![Node::marked("c", ["bold"])]),
            ]
        );
    }

    #[test]
    fn test_empty_document_detection() {
        assert!(Editor::new(vec![Node::paragraph("")]).is_empty_document());
        assert!(!Editor::new(vec![Node::paragraph("x")]).is_empty_document());
        assert!(!Editor::new(vec![Node::paragraph(""), Node::paragraph("")]).is_empty_document());
    }
}

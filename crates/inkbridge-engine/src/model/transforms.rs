//! Editing commands expressed as sequences of operations.
//!
//! Every command goes through [`Editor::apply`], so identity migration and
//! history see exactly the operations listed here plus those emitted by
//! normalization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::ModelError;
use crate::model::editor::Editor;
use crate::model::node::{self, Node, NodeRef, Properties, slice_chars};
use crate::model::operation::Operation;
use crate::model::path::{self, Affinity, Path, Point, Range};

/// Granularity of cursor movement and deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Character,
    Word,
    Line,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Which end of the selection a collapse keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Anchor,
    Focus,
    Start,
    End,
}

/// A point kept current while operations are applied
#[derive(Debug, Clone)]
struct PointRef {
    point: Option<Point>,
    affinity: Affinity,
}

impl PointRef {
    fn new(point: Point, affinity: Affinity) -> Self {
        Self {
            point: Some(point),
            affinity,
        }
    }

    fn update(&mut self, op: &Operation) {
        self.point = self
            .point
            .take()
            .and_then(|point| point.transform(op, self.affinity));
    }
}

impl Editor {
    fn apply_tracked(&mut self, op: Operation, refs: &mut [&mut PointRef]) -> Result<(), ModelError> {
        for point_ref in refs.iter_mut() {
            point_ref.update(&op);
        }
        self.apply(op)
    }

    fn text_len(&self, path: &[usize]) -> usize {
        self.node(path)
            .and_then(|node| node.as_text().map(|t| t.len()))
            .unwrap_or(0)
    }

    // ============ Selection ============

    pub fn select(&mut self, range: Range) -> Result<(), ModelError> {
        if self.selection.as_ref() == Some(&range) {
            return Ok(());
        }
        self.apply(Operation::SetSelection {
            selection: self.selection.clone(),
            new_selection: Some(range),
        })
    }

    pub fn deselect(&mut self) -> Result<(), ModelError> {
        if self.selection.is_none() {
            return Ok(());
        }
        self.apply(Operation::SetSelection {
            selection: self.selection.clone(),
            new_selection: None,
        })
    }

    pub fn collapse(&mut self, edge: Edge) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        let point = match edge {
            Edge::Anchor => selection.anchor,
            Edge::Focus => selection.focus,
            Edge::Start => selection.start(),
            Edge::End => selection.end(),
        };
        self.select(Range::collapsed(point))
    }

    /// Move the caret, or the focus when `extend` is set, by one `unit`.
    ///
    /// An expanded selection moved without extending collapses to the edge
    /// in the direction of travel.
    pub fn move_selection(&mut self, unit: Unit, reverse: bool, extend: bool) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_expanded() && !extend {
            return self.collapse(if reverse { Edge::Start } else { Edge::End });
        }

        let step = |editor: &Editor, point: &Point| {
            let moved = if reverse {
                editor.before(point, unit)
            } else {
                editor.after(point, unit)
            };
            moved.unwrap_or_else(|| point.clone())
        };
        let focus = step(self, &selection.focus);
        let anchor = if extend { selection.anchor } else { focus.clone() };
        self.select(Range::new(anchor, focus))
    }

    /// The fragment covered by the current selection
    pub fn fragment(&self) -> Vec<NodeRef> {
        match &self.selection {
            Some(selection) => node::fragment(&self.root, selection),
            None => Vec::new(),
        }
    }

    // ============ Text ============

    /// Insert `text` at the selection, replacing an expanded selection.
    ///
    /// Pending marks that differ from the leaf's marks put the text in a
    /// new leaf. Text is never inserted inside a void.
    pub fn insert_text(&mut self, text: &str) -> Result<(), ModelError> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_expanded() {
            self.delete_fragment()?;
        }
        let Some(point) = self.selection.as_ref().map(|s| s.anchor.clone()) else {
            return Ok(());
        };
        if self.void_above(&point.path).is_some() {
            log::debug!("ignoring text insertion inside a void at {:?}", point.path);
            return Ok(());
        }

        let leaf_marks = self
            .node(&point.path)
            .and_then(|node| node.as_text().map(|t| t.marks.clone()))
            .ok_or_else(|| ModelError::NotText(point.path.clone()))?;

        match self.marks.clone() {
            Some(marks) if marks != leaf_marks => {
                let len = self.text_len(&point.path);
                let index = if point.offset == 0 {
                    point.path.clone()
                } else {
                    if point.offset < len {
                        self.apply(Operation::SplitNode {
                            path: point.path.clone(),
                            position: point.offset,
                            properties: Properties {
                                kind: None,
                                marks: Some(leaf_marks),
                            },
                        })?;
                    }
                    path::next(&point.path)
                };
                self.apply(Operation::InsertNode {
                    path: index.clone(),
                    node: Node::marked(text, marks),
                })?;
                self.select(Range::collapsed(Point::new(index, node::char_len(text))))?;
                self.marks = None;
                self.normalize()
            }
            _ => {
                self.apply(Operation::InsertText {
                    path: point.path,
                    offset: point.offset,
                    text: text.to_string(),
                })?;
                self.marks = None;
                Ok(())
            }
        }
    }

    /// Remove everything between the edges of `range`.
    ///
    /// Voids touched by the range go as a whole. When the range spans
    /// blocks the end block is merged into the start block. Returns where
    /// the caret belongs afterwards; the selection is only moved by the
    /// operations themselves.
    pub fn delete_range(&mut self, range: &Range) -> Result<Option<Point>, ModelError> {
        let (start, end) = range.edges();
        if start == end {
            return Ok(Some(start));
        }

        let start_void = self.void_above(&start.path);
        let end_void = self.void_above(&end.path);
        if let Some(void) = start_void.as_ref().filter(|void| Some(*void) == end_void.as_ref()) {
            return self.remove_void(void);
        }

        let start_block = self.block_above(&start.path);
        let end_block = self.block_above(&end.path);
        let across_blocks = start_block.is_some() && end_block.is_some() && start_block != end_block;
        let single_text = start.path == end.path;

        // Highest nodes strictly inside the range, plus every void it touches
        let mut matches: Vec<(Path, NodeRef)> = Vec::new();
        for (path, node) in node::descendants(&self.root) {
            if !range.includes_path(&path) {
                continue;
            }
            if matches
                .last()
                .is_some_and(|(last, _)| path::compare(&path, last).is_eq())
            {
                continue;
            }
            let common_with_edge =
                start.path.starts_with(&path) || end.path.starts_with(&path);
            if node.is_void() || !common_with_edge {
                matches.push((path, node));
            }
        }

        let mut start_ref = PointRef::new(start.clone(), Affinity::Backward);
        let mut end_ref = PointRef::new(end.clone(), Affinity::Forward);

        if !single_text && start_void.is_none() {
            let len = self.text_len(&start.path);
            if start.offset < len {
                let text = slice_chars(&self.string(&start.path), start.offset, len);
                self.apply_tracked(
                    Operation::RemoveText {
                        path: start.path.clone(),
                        offset: start.offset,
                        text,
                    },
                    &mut [&mut start_ref, &mut end_ref],
                )?;
            }
        }

        for (path, node) in matches.into_iter().rev() {
            self.apply_tracked(
                Operation::RemoveNode { path, node },
                &mut [&mut start_ref, &mut end_ref],
            )?;
        }

        if end_void.is_none()
            && let Some(end_point) = end_ref.point.clone()
        {
            let offset = if single_text { start.offset } else { 0 };
            if end_point.offset > offset {
                let text = slice_chars(&self.string(&end_point.path), offset, end_point.offset);
                self.apply_tracked(
                    Operation::RemoveText {
                        path: end_point.path.clone(),
                        offset,
                        text,
                    },
                    &mut [&mut start_ref, &mut end_ref],
                )?;
            }
        }

        if !single_text
            && across_blocks
            && let (Some(start_point), Some(end_point)) = (start_ref.point.clone(), end_ref.point.clone())
        {
            self.merge_blocks(&start_point, &end_point, &mut start_ref, &mut end_ref)?;
        }

        Ok(start_ref.point.or(end_ref.point))
    }

    /// Join the block holding `end` onto the block holding `start`
    fn merge_blocks(
        &mut self,
        start: &Point,
        end: &Point,
        start_ref: &mut PointRef,
        end_ref: &mut PointRef,
    ) -> Result<(), ModelError> {
        let (Some(target), Some(source)) = (self.block_above(&start.path), self.block_above(&end.path)) else {
            return Ok(());
        };
        if target == source || path::is_ancestor(&target, &source) || path::is_ancestor(&source, &target) {
            return Ok(());
        }
        let Some(source_node) = self.node(&source).cloned() else {
            return Ok(());
        };
        let position = self.node(&target).map_or(0, |n| n.children().len());

        if source == path::next(&target) {
            return self.apply_tracked(
                Operation::MergeNode {
                    path: source,
                    position,
                    properties: source_node.properties(),
                },
                &mut [&mut *start_ref, &mut *end_ref],
            );
        }

        // Not a sibling: lift the children over and drop the emptied shell
        self.apply_tracked(
            Operation::RemoveNode {
                path: source.clone(),
                node: source_node.clone(),
            },
            &mut [&mut *start_ref, &mut *end_ref],
        )?;
        for (index, child) in source_node.children().iter().enumerate() {
            let mut path = target.clone();
            path.push(position + index);
            self.apply_tracked(
                Operation::InsertNode {
                    path,
                    node: child.clone(),
                },
                &mut [&mut *start_ref, &mut *end_ref],
            )?;
        }

        let mut ancestor = path::parent(&source);
        while !ancestor.is_empty() && self.node(&ancestor).is_some_and(|n| n.children().is_empty()) {
            let Some(node) = self.node(&ancestor).cloned() else {
                break;
            };
            self.apply_tracked(
                Operation::RemoveNode {
                    path: ancestor.clone(),
                    node,
                },
                &mut [&mut *start_ref, &mut *end_ref],
            )?;
            ancestor = path::parent(&ancestor);
        }
        Ok(())
    }

    fn remove_void(&mut self, void: &[usize]) -> Result<Option<Point>, ModelError> {
        let Some(node) = self.node(void).cloned() else {
            return Err(ModelError::InvalidPath(void.to_vec()));
        };
        let fallback = self
            .before(&Point::new(node::first_text(&self.root, void).unwrap_or_default(), 0), Unit::Character)
            .filter(|point| self.void_above(&point.path).as_deref() != Some(void));
        let mut fallback_ref = fallback.map(|point| PointRef::new(point, Affinity::Backward));

        let op = Operation::RemoveNode {
            path: void.to_vec(),
            node,
        };
        if let Some(point_ref) = fallback_ref.as_mut() {
            point_ref.update(&op);
        }
        self.apply(op)?;

        Ok(fallback_ref
            .and_then(|point_ref| point_ref.point)
            .or_else(|| self.start(void)))
    }

    /// Delete the expanded selection and collapse onto the deletion point
    pub fn delete_fragment(&mut self) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_collapsed() {
            return Ok(());
        }
        if let Some(point) = self.delete_range(&selection)? {
            self.select(Range::collapsed(point))?;
        }
        self.normalize()
    }

    /// Delete one `unit` from the caret in `direction`.
    ///
    /// A caret inside a void deletes the void; an expanded selection deletes
    /// the fragment instead.
    pub fn delete_unit(&mut self, unit: Unit, direction: Direction) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_expanded() {
            return self.delete_fragment();
        }
        let point = selection.anchor;

        let caret = if let Some(void) = self.void_above(&point.path) {
            self.remove_void(&void)?
        } else {
            let target = match direction {
                Direction::Forward => self.after(&point, unit),
                Direction::Backward => self.before(&point, unit),
            };
            let Some(target) = target else {
                return Ok(());
            };
            self.delete_range(&Range::new(point, target))?
        };

        if let Some(caret) = caret {
            self.select(Range::collapsed(caret))?;
        }
        self.normalize()?;
        if self.selection.is_none()
            && let Some(start) = self.start(&[])
        {
            self.select(Range::collapsed(start))?;
        }
        Ok(())
    }

    // ============ Structure ============

    /// Split the leaf, any inline ancestors and the block at `point`.
    ///
    /// The block is always split, so the caret ends up at the start of the
    /// block following `block`.
    fn split_block_at(&mut self, point: &Point, block: &[usize]) -> Result<(), ModelError> {
        let mut position = point.offset;
        for depth in (block.len() + 1..=point.path.len()).rev() {
            let path = point.path[..depth].to_vec();
            let Some(node) = self.node(&path).cloned() else {
                return Err(ModelError::InvalidPath(path));
            };
            let len = match node.as_ref() {
                Node::Text(text) => text.len(),
                Node::Element(element) => element.children.len(),
            };
            let index = path.last().copied().unwrap_or(0);
            position = if position == 0 {
                index
            } else if position >= len {
                index + 1
            } else {
                self.apply(Operation::SplitNode {
                    path,
                    position,
                    properties: node.properties(),
                })?;
                index + 1
            };
        }

        let properties = self
            .node(block)
            .map(|n| n.properties())
            .ok_or_else(|| ModelError::InvalidPath(block.to_vec()))?;
        self.apply(Operation::SplitNode {
            path: block.to_vec(),
            position,
            properties,
        })
    }

    /// Split the current block at the caret.
    ///
    /// Inside a void an empty paragraph is inserted after the void instead.
    pub fn insert_break(&mut self) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_expanded() {
            self.delete_fragment()?;
        }
        let Some(point) = self.selection.as_ref().map(|s| s.anchor.clone()) else {
            return Ok(());
        };

        let next = if let Some(void) = self.void_above(&point.path) {
            let next = path::next(&void);
            self.apply(Operation::InsertNode {
                path: next.clone(),
                node: Node::paragraph(""),
            })?;
            next
        } else {
            let Some(block) = self.block_above(&point.path) else {
                return Ok(());
            };
            self.split_block_at(&point, &block)?;
            path::next(&block)
        };

        self.normalize()?;
        if let Some(start) = self.start(&next) {
            self.select(Range::collapsed(start))?;
        }
        Ok(())
    }

    /// Insert a fragment of blocks (or bare leaves) at the caret.
    ///
    /// The first block's content joins the block before the caret and the
    /// last block's content joins the block after it; anything in between
    /// lands as sibling blocks.
    pub fn insert_fragment(&mut self, fragment: &[NodeRef]) -> Result<(), ModelError> {
        if fragment.is_empty() {
            return Ok(());
        }
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        if selection.is_expanded() {
            self.delete_fragment()?;
        }
        let Some(point) = self.selection.as_ref().map(|s| s.anchor.clone()) else {
            return Ok(());
        };

        if let Some(void) = self.void_above(&point.path) {
            let mut at = path::next(&void);
            for node in fragment {
                self.apply(Operation::InsertNode {
                    path: at.clone(),
                    node: node.clone(),
                })?;
                at = path::next(&at);
            }
            let last = path::previous(&at).unwrap_or_default();
            return self.finish_fragment(&last);
        }

        let Some(first_block) = self.block_above(&point.path) else {
            return Ok(());
        };
        self.split_block_at(&point, &first_block)?;
        let mut after = path::next(&first_block);

        let mergeable = |node: &NodeRef| node.is_block() && !node.is_void();
        let inline_only = fragment.iter().all(|n| n.is_text() || n.is_inline());

        if inline_only || (fragment.len() == 1 && mergeable(&fragment[0])) {
            let children: Vec<NodeRef> = if inline_only {
                fragment.to_vec()
            } else {
                fragment[0].children().to_vec()
            };
            let position = self.append_children(&first_block, &children)?;
            let caret = self.end_of_child(&first_block, position, children.len());
            let merge_at = self.node(&first_block).map_or(0, |n| n.children().len());
            let properties = self.node(&after).map(|n| n.properties()).unwrap_or_default();
            self.apply(Operation::MergeNode {
                path: after,
                position: merge_at,
                properties,
            })?;
            if let Some(caret) = caret {
                self.select(Range::collapsed(caret))?;
            }
            return self.normalize();
        }

        let Some((first, rest)) = fragment.split_first() else {
            return Ok(());
        };
        let (last, middle) = match rest.split_last() {
            Some((last, middle)) => (Some(last), middle),
            None => (None, rest),
        };

        let mut caret = if mergeable(first) {
            let position = self.append_children(&first_block, first.children())?;
            self.end_of_child(&first_block, position, first.children().len())
        } else {
            self.apply(Operation::InsertNode {
                path: after.clone(),
                node: first.clone(),
            })?;
            let caret = self.end(&after);
            after = path::next(&after);
            caret
        };

        for node in middle {
            self.apply(Operation::InsertNode {
                path: after.clone(),
                node: node.clone(),
            })?;
            caret = self.end(&after).or(caret);
            after = path::next(&after);
        }

        if let Some(last) = last {
            if mergeable(last) {
                for (index, child) in last.children().iter().enumerate() {
                    let mut path = after.clone();
                    path.push(index);
                    self.apply(Operation::InsertNode {
                        path,
                        node: child.clone(),
                    })?;
                }
                caret = match last.children().len() {
                    0 => self.start(&after),
                    count => {
                        let mut path = after.clone();
                        path.push(count - 1);
                        self.end(&path)
                    }
                }
                .or(caret);
            } else {
                self.apply(Operation::InsertNode {
                    path: after.clone(),
                    node: last.clone(),
                })?;
                caret = self.end(&after).or(caret);
            }
        }

        if let Some(caret) = caret {
            self.select(Range::collapsed(caret))?;
        }
        self.normalize()
    }

    fn finish_fragment(&mut self, last: &[usize]) -> Result<(), ModelError> {
        if let Some(caret) = self.end(last) {
            self.select(Range::collapsed(caret))?;
        }
        self.normalize()
    }

    /// Append `children` to the element at `parent`, returning the index of
    /// the first appended child
    fn append_children(&mut self, parent: &[usize], children: &[NodeRef]) -> Result<usize, ModelError> {
        let position = self.node(parent).map_or(0, |n| n.children().len());
        for (index, child) in children.iter().enumerate() {
            let mut path = parent.to_vec();
            path.push(position + index);
            self.apply(Operation::InsertNode {
                path,
                node: child.clone(),
            })?;
        }
        Ok(position)
    }

    fn end_of_child(&self, parent: &[usize], position: usize, count: usize) -> Option<Point> {
        if count == 0 {
            return None;
        }
        let mut path = parent.to_vec();
        path.push(position + count - 1);
        self.end(&path)
    }

    // ============ Marks ============

    /// Toggle `mark` on the selected text, or on the pending marks when the
    /// selection is collapsed
    pub fn toggle_mark(&mut self, mark: &str) -> Result<(), ModelError> {
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };

        if selection.is_collapsed() {
            let mut marks = match &self.marks {
                Some(marks) => marks.clone(),
                None => self
                    .node(&selection.anchor.path)
                    .and_then(|n| n.as_text().map(|t| t.marks.clone()))
                    .unwrap_or_default(),
            };
            if !marks.remove(mark) {
                marks.insert(mark.to_string());
            }
            self.marks = Some(marks);
            return Ok(());
        }

        let backward = selection.is_backward();
        let (start, end) = selection.edges();
        let mut start_ref = PointRef::new(start, Affinity::Forward);
        let mut end_ref = PointRef::new(end.clone(), Affinity::Backward);

        let end_len = self.text_len(&end.path);
        if end.offset > 0 && end.offset < end_len {
            let properties = self.node(&end.path).map(|n| n.properties()).unwrap_or_default();
            self.apply_tracked(
                Operation::SplitNode {
                    path: end.path.clone(),
                    position: end.offset,
                    properties,
                },
                &mut [&mut start_ref, &mut end_ref],
            )?;
        }
        if let Some(start) = start_ref.point.clone() {
            let start_len = self.text_len(&start.path);
            if start.offset > 0 && start.offset < start_len {
                let properties = self.node(&start.path).map(|n| n.properties()).unwrap_or_default();
                self.apply_tracked(
                    Operation::SplitNode {
                        path: start.path.clone(),
                        position: start.offset,
                        properties,
                    },
                    &mut [&mut start_ref, &mut end_ref],
                )?;
            }
        }

        let (Some(start), Some(end)) = (start_ref.point, end_ref.point) else {
            return Ok(());
        };
        let covered: Vec<(Path, BTreeSet<String>)> = node::texts(&self.root)
            .into_iter()
            .filter(|(path, _)| {
                path::compare(path, &start.path).is_ge() && path::compare(path, &end.path).is_le()
            })
            .filter(|(path, leaf)| {
                let len = leaf.as_text().map_or(0, |t| t.len());
                let before_start = *path == start.path && start.offset >= len && len > 0;
                let after_end = *path == end.path && end.offset == 0 && len > 0;
                !before_start && !after_end && self.void_above(path).is_none()
            })
            .filter_map(|(path, leaf)| leaf.as_text().map(|t| (path, t.marks.clone())))
            .collect();

        let active = !covered.is_empty() && covered.iter().all(|(_, marks)| marks.contains(mark));
        for (path, marks) in covered {
            let mut new_marks = marks.clone();
            if active {
                new_marks.remove(mark);
            } else {
                new_marks.insert(mark.to_string());
            }
            if new_marks == marks {
                continue;
            }
            self.apply(Operation::SetNode {
                path,
                properties: Properties {
                    kind: None,
                    marks: Some(marks),
                },
                new_properties: Properties {
                    kind: None,
                    marks: Some(new_marks),
                },
            })?;
        }

        let range = if backward {
            Range::new(end, start)
        } else {
            Range::new(start, end)
        };
        self.select(range)?;
        self.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at(path: &[usize], offset: usize) -> Point {
        Point::new(path.to_vec(), offset)
    }

    fn editor_with(children: Vec<NodeRef>, selection: Range) -> Editor {
        let mut editor = Editor::new(children);
        editor.select(selection).unwrap();
        editor.flush();
        editor
    }

    fn strings(editor: &Editor) -> Vec<String> {
        editor.children().iter().map(|n| n.string()).collect()
    }

    #[test]
    fn test_insert_text_at_caret() {
        let mut editor = editor_with(vec![Node::paragraph("helo")], Range::collapsed(at(&[0, 0], 3)));
        editor.insert_text("l").unwrap();
        assert_eq!(strings(&editor), vec!["hello"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 4))));
    }

    #[test]
    fn test_insert_text_replaces_expanded_selection() {
        let mut editor = editor_with(
            vec![Node::paragraph("one"), Node::paragraph("two")],
            Range::new(at(&[1, 0], 1), at(&[0, 0], 1)),
        );
        editor.insert_text("X").unwrap();
        assert_eq!(strings(&editor), vec!["oXwo"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 2))));
    }

    #[test]
    fn test_insert_text_with_pending_marks_creates_leaf() {
        let mut editor = editor_with(vec![Node::paragraph("ab")], Range::collapsed(at(&[0, 0], 1)));
        editor.toggle_mark("bold").unwrap();
        editor.insert_text("X").unwrap();

        assert_eq!(
            editor.children(),
            &[Node::element(
                "paragraph",
                vec![Node::text("a"), Node::marked("X", ["bold"]), Node::text("b")]
            )]
        );
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 1], 1))));
        assert!(editor.marks().is_none());
    }

    #[test]
    fn test_insert_text_ignored_inside_void() {
        let mut editor = editor_with(vec![Node::void("image")], Range::collapsed(at(&[0, 0], 0)));
        editor.insert_text("x").unwrap();
        assert_eq!(strings(&editor), vec![""]);
    }

    #[test]
    fn test_delete_range_across_blocks_merges() {
        let mut editor = editor_with(
            vec![
                Node::paragraph("hello"),
                Node::paragraph("middle"),
                Node::paragraph("world"),
            ],
            Range::new(at(&[0, 0], 2), at(&[2, 0], 3)),
        );
        editor.delete_fragment().unwrap();

        assert_eq!(strings(&editor), vec!["held"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 2))));
    }

    #[test]
    fn test_delete_range_lifts_nested_block() {
        let mut editor = editor_with(
            vec![
                Node::paragraph("ab"),
                Node::element(
                    "bulleted-list",
                    vec![Node::element("list-item", vec![Node::text("cd")])],
                ),
            ],
            Range::new(at(&[0, 0], 1), at(&[1, 0, 0], 1)),
        );
        editor.delete_fragment().unwrap();

        assert_eq!(editor.children(), &[Node::paragraph("ad")]);
    }

    #[test]
    fn test_delete_range_removes_touched_voids() {
        let mut editor = editor_with(
            vec![Node::paragraph("ab"), Node::void("image"), Node::paragraph("cd")],
            Range::new(at(&[0, 0], 1), at(&[1, 0], 0)),
        );
        editor.delete_fragment().unwrap();

        assert_eq!(strings(&editor), vec!["a", "cd"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 1))));
    }

    #[rstest]
    #[case(Unit::Character, Direction::Backward, "hello worl", 10)]
    #[case(Unit::Word, Direction::Backward, "hello ", 6)]
    #[case(Unit::Line, Direction::Backward, "", 0)]
    fn test_delete_unit_backward(
        #[case] unit: Unit,
        #[case] direction: Direction,
        #[case] expected: &str,
        #[case] offset: usize,
    ) {
        let mut editor = editor_with(
            vec![Node::paragraph("hello world")],
            Range::collapsed(at(&[0, 0], 11)),
        );
        editor.delete_unit(unit, direction).unwrap();
        assert_eq!(strings(&editor), vec![expected]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], offset))));
    }

    #[test]
    fn test_delete_backward_at_block_start_joins_blocks() {
        let mut editor = editor_with(
            vec![Node::paragraph("ab"), Node::paragraph("cd")],
            Range::collapsed(at(&[1, 0], 0)),
        );
        editor.delete_unit(Unit::Character, Direction::Backward).unwrap();

        assert_eq!(editor.children(), &[Node::paragraph("abcd")]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 2))));
    }

    #[test]
    fn test_delete_backward_after_void_removes_void() {
        let mut editor = editor_with(
            vec![Node::paragraph("ab"), Node::void("image"), Node::paragraph("cd")],
            Range::collapsed(at(&[2, 0], 0)),
        );
        editor.delete_unit(Unit::Character, Direction::Backward).unwrap();

        assert_eq!(strings(&editor), vec!["ab", "cd"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[1, 0], 0))));
    }

    #[test]
    fn test_delete_inside_void_removes_it() {
        let mut editor = editor_with(
            vec![Node::paragraph("ab"), Node::void("image")],
            Range::collapsed(at(&[1, 0], 0)),
        );
        editor.delete_unit(Unit::Character, Direction::Forward).unwrap();

        assert_eq!(strings(&editor), vec!["ab"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 2))));
    }

    #[test]
    fn test_deleting_only_void_leaves_empty_paragraph() {
        let mut editor = editor_with(vec![Node::void("image")], Range::collapsed(at(&[0, 0], 0)));
        editor.delete_unit(Unit::Character, Direction::Backward).unwrap();

        assert_eq!(editor.children(), &[Node::paragraph("")]);
    }

    #[test]
    fn test_insert_break_splits_block() {
        let mut editor = editor_with(vec![Node::paragraph("abcd")], Range::collapsed(at(&[0, 0], 2)));
        editor.insert_break().unwrap();

        assert_eq!(strings(&editor), vec!["ab", "cd"]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[1, 0], 0))));
    }

    #[test]
    fn test_insert_break_at_end_adds_empty_block() {
        let mut editor = editor_with(vec![Node::paragraph("ab")], Range::collapsed(at(&[0, 0], 2)));
        editor.insert_break().unwrap();

        assert_eq!(editor.children(), &[Node::paragraph("ab"), Node::paragraph("")]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[1, 0], 0))));
    }

    #[test]
    fn test_insert_break_in_void_adds_paragraph_after() {
        let mut editor = editor_with(vec![Node::void("image")], Range::collapsed(at(&[0, 0], 0)));
        editor.insert_break().unwrap();

        assert_eq!(editor.children(), &[Node::void("image"), Node::paragraph("")]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[1, 0], 0))));
    }

    #[test]
    fn test_insert_fragment_single_block_joins_inline() {
        let mut editor = editor_with(vec![Node::paragraph("ad")], Range::collapsed(at(&[0, 0], 1)));
        editor.insert_fragment(&[Node::paragraph("bc")]).unwrap();

        assert_eq!(editor.children(), &[Node::paragraph("abcd")]);
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 3))));
    }

    #[test]
    fn test_insert_fragment_multiple_blocks() {
        let mut editor = editor_with(vec![Node::paragraph("az")], Range::collapsed(at(&[0, 0], 1)));
        editor
            .insert_fragment(&[
                Node::paragraph("b"),
                Node::void("image"),
                Node::paragraph("y"),
            ])
            .unwrap();

        assert_eq!(
            editor.children(),
            &[Node::paragraph("ab"), Node::void("image"), Node::paragraph("yz")]
        );
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[2, 0], 1))));
    }

    #[test]
    fn test_toggle_mark_over_partial_leaf() {
        let mut editor = editor_with(vec![Node::paragraph("abcd")], Range::new(at(&[0, 0], 1), at(&[0, 0], 3)));
        editor.toggle_mark("bold").unwrap();

        assert_eq!(
            editor.children(),
            &[Node::element(
                "paragraph",
                vec![Node::text("a"), Node::marked("bc", ["bold"]), Node::text("d")]
            )]
        );
        assert_eq!(
            editor.selection(),
            Some(&Range::new(at(&[0, 1], 0), at(&[0, 1], 2)))
        );

        editor.toggle_mark("bold").unwrap();
        assert_eq!(editor.children(), &[Node::paragraph("abcd")]);
    }

    #[test]
    fn test_move_selection_extends_and_collapses() {
        let mut editor = editor_with(vec![Node::paragraph("hello world")], Range::collapsed(at(&[0, 0], 0)));
        editor.move_selection(Unit::Word, false, true).unwrap();
        assert_eq!(editor.selection(), Some(&Range::new(at(&[0, 0], 0), at(&[0, 0], 5))));

        editor.move_selection(Unit::Character, true, false).unwrap();
        assert_eq!(editor.selection(), Some(&Range::collapsed(at(&[0, 0], 0))));
    }

    #[test]
    fn test_fragment_follows_selection() {
        let editor = editor_with(
            vec![Node::paragraph("one"), Node::paragraph("two")],
            Range::new(at(&[0, 0], 1), at(&[1, 0], 2)),
        );
        assert_eq!(editor.fragment(), vec![Node::paragraph("ne"), Node::paragraph("tw")]);
    }
}

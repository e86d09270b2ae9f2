//! Path, point and range arithmetic.
//!
//! Paths compare like the document they address: an ancestor compares equal
//! to its descendants, otherwise the first differing index decides.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::node::char_len;
use crate::model::operation::Operation;

/// Child indices from the document root to a node
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub path: Path,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Point,
    pub focus: Point,
}

/// Which way a point sticks when an edit lands exactly on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Forward,
    Backward,
}

pub fn compare(path: &[usize], another: &[usize]) -> Ordering {
    path.iter()
        .zip(another)
        .map(|(a, b)| a.cmp(b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub fn parent(path: &[usize]) -> Path {
    path[..path.len().saturating_sub(1)].to_vec()
}

pub fn next(path: &[usize]) -> Path {
    let mut next = path.to_vec();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    next
}

pub fn previous(path: &[usize]) -> Option<Path> {
    let mut previous = path.to_vec();
    let last = previous.last_mut()?;
    *last = last.checked_sub(1)?;
    Some(previous)
}

pub fn is_ancestor(path: &[usize], another: &[usize]) -> bool {
    path.len() < another.len() && another.starts_with(path)
}

/// `path` is an earlier sibling of `another` or of one of its ancestors
pub fn ends_before(path: &[usize], another: &[usize]) -> bool {
    let Some((&last, prefix)) = path.split_last() else {
        return false;
    };
    match another.get(prefix.len()) {
        Some(&other) => another.starts_with(prefix) && last < other,
        None => false,
    }
}

/// Longest shared ancestor path
pub fn common(path: &[usize], another: &[usize]) -> Path {
    path.iter()
        .zip(another)
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| *a)
        .collect()
}

/// Where `path` ends up after `op`; `None` when the op removes it
pub fn transform(path: &[usize], op: &Operation, affinity: Option<Affinity>) -> Option<Path> {
    let mut p = path.to_vec();
    match op {
        Operation::InsertNode { path: op_path, .. } => {
            if op_path.as_slice() == path
                || ends_before(op_path, path)
                || is_ancestor(op_path, path)
            {
                p[op_path.len() - 1] += 1;
            }
        }
        Operation::RemoveNode { path: op_path, .. } => {
            if op_path.as_slice() == path || is_ancestor(op_path, path) {
                return None;
            }
            if ends_before(op_path, path) {
                p[op_path.len() - 1] -= 1;
            }
        }
        Operation::MergeNode {
            path: op_path,
            position,
            ..
        } => {
            if op_path.as_slice() == path || ends_before(op_path, path) {
                p[op_path.len() - 1] -= 1;
            } else if is_ancestor(op_path, path) {
                p[op_path.len() - 1] -= 1;
                p[op_path.len()] += position;
            }
        }
        Operation::SplitNode {
            path: op_path,
            position,
            ..
        } => {
            if op_path.as_slice() == path {
                match affinity {
                    Some(Affinity::Forward) => p[path.len() - 1] += 1,
                    Some(Affinity::Backward) => {}
                    None => return None,
                }
            } else if ends_before(op_path, path) {
                p[op_path.len() - 1] += 1;
            } else if is_ancestor(op_path, path) && path[op_path.len()] >= *position {
                p[op_path.len() - 1] += 1;
                p[op_path.len()] -= position;
            }
        }
        Operation::InsertText { .. }
        | Operation::RemoveText { .. }
        | Operation::SetNode { .. }
        | Operation::SetSelection { .. } => {}
    }
    Some(p)
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Document order of two points; points in ancestor-related paths
    /// fall back to the offset
    pub fn compare(&self, other: &Point) -> Ordering {
        compare(&self.path, &other.path).then(self.offset.cmp(&other.offset))
    }

    pub fn is_before(&self, other: &Point) -> bool {
        self.compare(other).is_lt()
    }

    pub fn is_after(&self, other: &Point) -> bool {
        self.compare(other).is_gt()
    }

    /// Where this point ends up after `op`; `None` when its node is removed
    pub fn transform(&self, op: &Operation, affinity: Affinity) -> Option<Point> {
        let mut point = self.clone();
        match op {
            Operation::InsertText { path, offset, text } => {
                if *path == point.path
                    && (*offset < point.offset
                        || (*offset == point.offset && affinity == Affinity::Forward))
                {
                    point.offset += char_len(text);
                }
            }
            Operation::MergeNode { path, position, .. } => {
                if *path == point.path {
                    point.offset += position;
                }
                point.path = transform(&point.path, op, Some(affinity))?;
            }
            Operation::RemoveText { path, offset, text } => {
                if *path == point.path && *offset <= point.offset {
                    point.offset -= (point.offset - offset).min(char_len(text));
                }
            }
            Operation::RemoveNode { path, .. } => {
                if *path == point.path || is_ancestor(path, &point.path) {
                    return None;
                }
                point.path = transform(&point.path, op, Some(affinity))?;
            }
            Operation::SplitNode { path, position, .. } => {
                if *path == point.path {
                    if *position < point.offset
                        || (*position == point.offset && affinity == Affinity::Forward)
                    {
                        point.offset -= position;
                        point.path = transform(&point.path, op, Some(Affinity::Forward))?;
                    }
                } else {
                    point.path = transform(&point.path, op, Some(affinity))?;
                }
            }
            Operation::InsertNode { .. } => {
                point.path = transform(&point.path, op, Some(affinity))?;
            }
            Operation::SetNode { .. } | Operation::SetSelection { .. } => {}
        }
        Some(point)
    }
}

impl Range {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_expanded(&self) -> bool {
        !self.is_collapsed()
    }

    pub fn is_backward(&self) -> bool {
        self.focus.is_before(&self.anchor)
    }

    /// `(start, end)` in document order
    pub fn edges(&self) -> (Point, Point) {
        if self.is_backward() {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }

    pub fn start(&self) -> Point {
        self.edges().0
    }

    pub fn end(&self) -> Point {
        self.edges().1
    }

    /// Whether `path` lies between the range edges, ancestors included
    pub fn includes_path(&self, path: &[usize]) -> bool {
        let (start, end) = self.edges();
        compare(path, &start.path).is_ge() && compare(path, &end.path).is_le()
    }

    pub fn includes_point(&self, point: &Point) -> bool {
        let (start, end) = self.edges();
        !point.is_before(&start) && !point.is_after(&end)
    }
}

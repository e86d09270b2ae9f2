use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::ModelError;
use crate::model::node::{self, Node, NodeRef, Properties, byte_index, char_len};
use crate::model::path::{self, Path, Range};

/// Primitive, invertible document mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        offset: usize,
        text: String,
    },
    InsertNode {
        path: Path,
        node: NodeRef,
    },
    RemoveNode {
        path: Path,
        node: NodeRef,
    },
    /// Split the node at `path`; the new right half gets `properties`
    SplitNode {
        path: Path,
        position: usize,
        properties: Properties,
    },
    /// Merge the node at `path` into its previous sibling, whose length
    /// before the merge was `position`
    MergeNode {
        path: Path,
        position: usize,
        properties: Properties,
    },
    SetNode {
        path: Path,
        properties: Properties,
        new_properties: Properties,
    },
    SetSelection {
        selection: Option<Range>,
        new_selection: Option<Range>,
    },
}

impl Operation {
    pub fn is_selection(&self) -> bool {
        matches!(self, Operation::SetSelection { .. })
    }

    /// The operation that undoes this one
    pub fn inverse(&self) -> Operation {
        match self.clone() {
            Operation::InsertText { path, offset, text } => {
                Operation::RemoveText { path, offset, text }
            }
            Operation::RemoveText { path, offset, text } => {
                Operation::InsertText { path, offset, text }
            }
            Operation::InsertNode { path, node } => Operation::RemoveNode { path, node },
            Operation::RemoveNode { path, node } => Operation::InsertNode { path, node },
            Operation::SplitNode {
                path,
                position,
                properties,
            } => Operation::MergeNode {
                path: path::next(&path),
                position,
                properties,
            },
            Operation::MergeNode {
                path,
                position,
                properties,
            } => Operation::SplitNode {
                path: path::previous(&path).unwrap_or_default(),
                position,
                properties,
            },
            Operation::SetNode {
                path,
                properties,
                new_properties,
            } => Operation::SetNode {
                path,
                properties: new_properties,
                new_properties: properties,
            },
            Operation::SetSelection {
                selection,
                new_selection,
            } => Operation::SetSelection {
                selection: new_selection,
                new_selection: selection,
            },
        }
    }
}

/// Apply a node-level operation to the tree rooted at `root`.
///
/// Selection operations are handled by the editor and leave the tree alone.
pub(crate) fn apply_to_tree(root: &mut NodeRef, op: &Operation) -> Result<(), ModelError> {
    match op {
        Operation::InsertText { path, offset, text } => {
            let leaf = text_mut(root, path)?;
            if *offset > char_len(&leaf.text) {
                return Err(ModelError::OffsetOutOfBounds {
                    path: path.clone(),
                    offset: *offset,
                });
            }
            let at = byte_index(&leaf.text, *offset);
            leaf.text.insert_str(at, text);
        }
        Operation::RemoveText { path, offset, text } => {
            let leaf = text_mut(root, path)?;
            let end = offset + char_len(text);
            if end > char_len(&leaf.text) {
                return Err(ModelError::OffsetOutOfBounds {
                    path: path.clone(),
                    offset: end,
                });
            }
            let start = byte_index(&leaf.text, *offset);
            let end = byte_index(&leaf.text, end);
            leaf.text.replace_range(start..end, "");
        }
        Operation::InsertNode { path, node } => {
            let (parent, index) = parent_mut(root, path)?;
            if index > parent.len() {
                return Err(ModelError::InvalidPath(path.clone()));
            }
            parent.insert(index, node.clone());
        }
        Operation::RemoveNode { path, .. } => {
            let (parent, index) = parent_mut(root, path)?;
            if index >= parent.len() {
                return Err(ModelError::InvalidPath(path.clone()));
            }
            parent.remove(index);
        }
        Operation::SplitNode {
            path,
            position,
            properties,
        } => {
            let (parent, index) = parent_mut(root, path)?;
            let node = parent
                .get_mut(index)
                .ok_or_else(|| ModelError::InvalidPath(path.clone()))?;
            let mut right = match Rc::make_mut(node) {
                Node::Text(text) => {
                    if *position > char_len(&text.text) {
                        return Err(ModelError::OffsetOutOfBounds {
                            path: path.clone(),
                            offset: *position,
                        });
                    }
                    let at = byte_index(&text.text, *position);
                    let mut right = text.clone();
                    right.text = text.text.split_off(at);
                    Node::Text(right)
                }
                Node::Element(element) => {
                    if *position > element.children.len() {
                        return Err(ModelError::OffsetOutOfBounds {
                            path: path.clone(),
                            offset: *position,
                        });
                    }
                    let mut right = element.clone();
                    right.children = element.children.split_off(*position);
                    Node::Element(right)
                }
            };
            right.apply_properties(properties);
            parent.insert(index + 1, Rc::new(right));
        }
        Operation::MergeNode { path, .. } => {
            let (parent, index) = parent_mut(root, path)?;
            if index == 0 || index >= parent.len() {
                return Err(ModelError::InvalidPath(path.clone()));
            }
            let node = parent.remove(index);
            let previous = Rc::make_mut(&mut parent[index - 1]);
            match (previous, node.as_ref()) {
                (Node::Text(previous), Node::Text(text)) => previous.text.push_str(&text.text),
                (Node::Element(previous), Node::Element(element)) => {
                    previous.children.extend(element.children.iter().cloned())
                }
                _ => return Err(ModelError::MismatchedMerge(path.clone())),
            }
        }
        Operation::SetNode {
            path,
            new_properties,
            ..
        } => {
            let node = node::get_mut(root, path)
                .ok_or_else(|| ModelError::InvalidPath(path.clone()))?;
            node.apply_properties(new_properties);
        }
        Operation::SetSelection { .. } => {}
    }
    Ok(())
}

fn text_mut<'a>(root: &'a mut NodeRef, path: &Path) -> Result<&'a mut node::Text, ModelError> {
    match node::get_mut(root, path) {
        Some(Node::Text(text)) => Ok(text),
        Some(Node::Element(_)) => Err(ModelError::NotText(path.clone())),
        None => Err(ModelError::InvalidPath(path.clone())),
    }
}

fn parent_mut<'a>(
    root: &'a mut NodeRef,
    path: &Path,
) -> Result<(&'a mut Vec<NodeRef>, usize), ModelError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(ModelError::InvalidPath(path.clone()));
    };
    match node::get_mut(root, parent_path) {
        Some(Node::Element(element)) => Ok((&mut element.children, index)),
        _ => Err(ModelError::InvalidPath(path.clone())),
    }
}

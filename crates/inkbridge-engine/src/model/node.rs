use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::path::{self, Path, Point, Range};

/// Shared handle to an immutable node.
///
/// The pointer identity of a `NodeRef` is what the identity registry tracks:
/// edits replace every node on the edited path with a fresh allocation while
/// untouched siblings keep theirs.
pub type NodeRef = Rc<Node>;

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Element(Element),
    Text(Text),
}

/// A branch node with ordered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: String,
    pub children: Vec<NodeRef>,
    /// Atomic node whose content is not directly editable
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub void: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, serde_json::Value>,
}

/// A run of text sharing one set of formatting marks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub marks: BTreeSet<String>,
}

/// The node-level properties carried by split/merge/set operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<BTreeSet<String>>,
}

impl Element {
    pub fn new(kind: impl Into<String>, children: Vec<NodeRef>) -> Self {
        Self {
            kind: kind.into(),
            children,
            void: false,
            inline: false,
            props: BTreeMap::new(),
        }
    }
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: BTreeSet::new(),
        }
    }

    pub fn with_marks<I, S>(text: impl Into<String>, marks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            marks: marks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        char_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Node {
    /// Document root holding the given top-level blocks
    pub fn root(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::Element(Element::new("editor", children)))
    }

    pub fn text(text: impl Into<String>) -> NodeRef {
        Rc::new(Node::Text(Text::new(text)))
    }

    pub fn marked<I, S>(text: impl Into<String>, marks: I) -> NodeRef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rc::new(Node::Text(Text::with_marks(text, marks)))
    }

    pub fn element(kind: impl Into<String>, children: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::Element(Element::new(kind, children)))
    }

    pub fn paragraph(text: impl Into<String>) -> NodeRef {
        Self::element("paragraph", vec![Self::text(text)])
    }

    /// An atomic block with the single empty text child every element needs
    pub fn void(kind: impl Into<String>) -> NodeRef {
        let mut element = Element::new(kind, vec![Self::text("")]);
        element.void = true;
        Rc::new(Node::Element(element))
    }

    /// An atomic node that flows inside text, like a mention
    pub fn inline_void(kind: impl Into<String>) -> NodeRef {
        let mut element = Element::new(kind, vec![Self::text("")]);
        element.void = true;
        element.inline = true;
        Rc::new(Node::Element(element))
    }

    pub fn inline(kind: impl Into<String>, children: Vec<NodeRef>) -> NodeRef {
        let mut element = Element::new(kind, children);
        element.inline = true;
        Rc::new(Node::Element(element))
    }

    pub fn children(&self) -> &[NodeRef] {
        match self {
            Node::Element(element) => &element.children,
            Node::Text(_) => &[],
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Node::Element(element) if element.void)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Node::Element(element) if element.inline)
    }

    /// Block-level element: an element that is not inline
    pub fn is_block(&self) -> bool {
        matches!(self, Node::Element(element) if !element.inline)
    }

    /// Concatenated text of every descendant leaf
    pub fn string(&self) -> String {
        match self {
            Node::Text(text) => text.text.clone(),
            Node::Element(element) => element.children.iter().map(|c| c.string()).collect(),
        }
    }

    pub fn properties(&self) -> Properties {
        match self {
            Node::Element(element) => Properties {
                kind: Some(element.kind.clone()),
                marks: None,
            },
            Node::Text(text) => Properties {
                kind: None,
                marks: Some(text.marks.clone()),
            },
        }
    }

    pub(crate) fn apply_properties(&mut self, properties: &Properties) {
        match self {
            Node::Element(element) => {
                if let Some(kind) = &properties.kind {
                    element.kind = kind.clone();
                }
            }
            Node::Text(text) => {
                if let Some(marks) = &properties.marks {
                    text.marks = marks.clone();
                }
            }
        }
    }
}

/// Descendant at `path`, the node itself for an empty path
pub fn get<'a>(node: &'a NodeRef, path: &[usize]) -> Option<&'a NodeRef> {
    let mut current = node;
    for &index in path {
        current = current.children().get(index)?;
    }
    Some(current)
}

/// Mutable access to the node at `path`, copying every node on the way down
/// so the edited path ends up with fresh identities
pub(crate) fn get_mut<'a>(node: &'a mut NodeRef, path: &[usize]) -> Option<&'a mut Node> {
    let node = Rc::make_mut(node);
    match path.split_first() {
        None => Some(node),
        Some((&index, rest)) => match node {
            Node::Element(element) => element
                .children
                .get_mut(index)
                .and_then(|child| get_mut(child, rest)),
            Node::Text(_) => None,
        },
    }
}

/// Every node below `root` in document order, paired with its path
pub fn descendants(root: &NodeRef) -> Vec<(Path, NodeRef)> {
    let mut out = Vec::new();
    collect_descendants(root, &mut Vec::new(), &mut out);
    out
}

fn collect_descendants(node: &NodeRef, path: &mut Path, out: &mut Vec<(Path, NodeRef)>) {
    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        out.push((path.clone(), child.clone()));
        collect_descendants(child, path, out);
        path.pop();
    }
}

/// Text leaves below `root` in document order
pub fn texts(root: &NodeRef) -> Vec<(Path, NodeRef)> {
    descendants(root)
        .into_iter()
        .filter(|(_, node)| node.is_text())
        .collect()
}

/// First text leaf at or below `path`
pub fn first_text(root: &NodeRef, path: &[usize]) -> Option<Path> {
    let mut current = path.to_vec();
    let mut node = get(root, path)?;
    while let Node::Element(element) = node.as_ref() {
        node = element.children.first()?;
        current.push(0);
    }
    Some(current)
}

/// Last text leaf at or below `path`
pub fn last_text(root: &NodeRef, path: &[usize]) -> Option<Path> {
    let mut current = path.to_vec();
    let mut node = get(root, path)?;
    while let Node::Element(element) = node.as_ref() {
        let index = element.children.len().checked_sub(1)?;
        node = &element.children[index];
        current.push(index);
    }
    Some(current)
}

/// Copy of the nodes covered by `range`, texts trimmed to the range edges.
///
/// Returns the top-level children of the pruned root.
pub fn fragment(root: &NodeRef, range: &Range) -> Vec<NodeRef> {
    let (start, end) = range.edges();
    root.children()
        .iter()
        .enumerate()
        .filter_map(|(index, child)| prune(child, &mut vec![index], &start, &end))
        .collect()
}

fn prune(node: &NodeRef, path: &mut Path, start: &Point, end: &Point) -> Option<NodeRef> {
    if path::compare(path, &start.path).is_lt() || path::compare(path, &end.path).is_gt() {
        return None;
    }
    match node.as_ref() {
        Node::Text(text) => {
            let mut text = text.clone();
            if *path == end.path {
                text.text = slice_chars(&text.text, 0, end.offset);
            }
            if *path == start.path {
                let len = char_len(&text.text);
                text.text = slice_chars(&text.text, start.offset.min(len), len);
            }
            Some(Rc::new(Node::Text(text)))
        }
        Node::Element(element) => {
            let mut element = element.clone();
            element.children = element
                .children
                .iter()
                .enumerate()
                .filter_map(|(index, child)| {
                    path.push(index);
                    let pruned = prune(child, path, start, end);
                    path.pop();
                    pruned
                })
                .collect();
            Some(Rc::new(Node::Element(element)))
        }
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `offset`-th char, clamped to the end of the string
pub fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Char offset of a byte index that lies on a char boundary
pub fn char_offset(text: &str, byte_index: usize) -> usize {
    char_len(&text[..byte_index.min(text.len())])
}

pub fn slice_chars(text: &str, start: usize, end: usize) -> String {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    text[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> NodeRef {
        Node::root(vec![
            Node::paragraph("one"),
            Node::element(
                "paragraph",
                vec![Node::text("tw"), Node::marked("o", ["bold"])],
            ),
            Node::paragraph("three"),
        ])
    }

    #[test]
    fn test_get_resolves_paths() {
        let root = sample();
        let leaf = get(&root, &[1, 1]).unwrap();
        assert_eq!(leaf.as_text().unwrap().text, "o");
        assert!(get(&root, &[1, 2]).is_none());
        assert!(get(&root, &[0, 0, 0]).is_none());
    }

    #[test]
    fn test_texts_in_document_order() {
        let root = sample();
        let paths: Vec<Path> = texts(&root).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![vec![0, 0], vec![1, 0], vec![1, 1], vec![2, 0]]);
    }

    #[test]
    fn test_first_and_last_text() {
        let root = sample();
        assert_eq!(first_text(&root, &[1]), Some(vec![1, 0]));
        assert_eq!(last_text(&root, &[1]), Some(vec![1, 1]));
        assert_eq!(last_text(&root, &[]), Some(vec![2, 0]));
    }

    #[test]
    fn test_get_mut_replaces_edited_path_only() {
        let mut root = sample();
        let untouched = get(&root, &[0]).unwrap().clone();
        let edited_before = get(&root, &[2]).unwrap().clone();

        if let Some(Node::Text(text)) = get_mut(&mut root, &[2, 0]) {
            text.text.push('!');
        }

        assert!(Rc::ptr_eq(get(&root, &[0]).unwrap(), &untouched));
        assert!(!Rc::ptr_eq(get(&root, &[2]).unwrap(), &edited_before));
        assert_eq!(get(&root, &[2]).unwrap().string(), "three!");
    }

    #[test]
    fn test_fragment_trims_edges() {
        let root = sample();
        let range = Range::new(Point::new(vec![0, 0], 1), Point::new(vec![1, 0], 1));
        let fragment = fragment(&root, &range);

        assert_eq!(
            fragment,
            vec![
                Node::paragraph("ne"),
                Node::element("paragraph", vec![Node::text("t")]),
            ]
        );
    }

    #[test]
    fn test_fragment_of_backward_range_matches_forward() {
        let root = sample();
        let forward = Range::new(Point::new(vec![0, 0], 0), Point::new(vec![2, 0], 2));
        let backward = Range::new(forward.focus.clone(), forward.anchor.clone());
        assert_eq!(fragment(&root, &forward), fragment(&root, &backward));
    }

    #[test]
    fn test_char_helpers_count_scalars() {
        let text = "héllo";
        assert_eq!(char_len(text), 5);
        assert_eq!(byte_index(text, 2), 3);
        assert_eq!(byte_index(text, 10), text.len());
        assert_eq!(char_offset(text, 3), 2);
        assert_eq!(slice_chars(text, 1, 3), "él");
    }

    #[test]
    fn test_serde_shape() {
        let node = Node::element("paragraph", vec![Node::marked("hi", ["bold"])]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "paragraph", "children": [{"text": "hi", "marks": ["bold"]}]})
        );
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(&back, node.as_ref());
    }
}

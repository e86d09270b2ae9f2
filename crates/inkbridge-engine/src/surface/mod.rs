/*!
 * # Surface
 *
 * An in-memory stand-in for the editable rendering surface: an arena tree of
 * elements and text nodes with attributes, a native selection, an active
 * (focused) element and HTML/plain-text serialization.
 *
 * Offsets in a [`SurfacePosition`] count chars inside text nodes and child
 * indices inside elements, the same convention native surfaces use.
 */

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Attribute and tag vocabulary shared by the renderer, the mapper and the
/// transfer codec
pub mod attrs {
    pub const NODE: &str = "data-ink-node";
    pub const KEY: &str = "data-ink-key";
    pub const LEAF: &str = "data-ink-leaf";
    pub const STRING: &str = "data-ink-string";
    pub const ZERO_WIDTH: &str = "data-ink-zero-width";
    pub const LENGTH: &str = "data-ink-length";
    pub const VOID: &str = "data-ink-void";
    pub const VOID_CONTENT: &str = "data-ink-void-content";
    pub const INLINE: &str = "data-ink-inline";
    pub const SPACER: &str = "data-ink-spacer";
    pub const EDITOR: &str = "data-ink-editor";
    pub const FRAGMENT: &str = "data-ink-fragment";
    pub const PLACEHOLDER: &str = "data-ink-placeholder";
    pub const TYPE: &str = "data-ink-type";
    pub const CONTENT_EDITABLE: &str = "contenteditable";
}

/// Character rendered inside zero-width runs so the caret has something to
/// sit on
pub const PLACEHOLDER_CHAR: char = '\u{FEFF}';

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceKind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct SurfaceNode {
    kind: SurfaceKind,
    parent: Option<SurfaceId>,
    children: Vec<SurfaceId>,
}

/// A caret position on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfacePosition {
    pub node: SurfaceId,
    pub offset: usize,
}

/// Surface positions in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRange {
    pub start: SurfacePosition,
    pub end: SurfacePosition,
}

/// The surface's own selection, anchor first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSelection {
    pub anchor: SurfacePosition,
    pub focus: SurfacePosition,
}

impl SurfacePosition {
    pub fn new(node: SurfaceId, offset: usize) -> Self {
        Self { node, offset }
    }
}

impl NativeSelection {
    pub fn collapsed(position: SurfacePosition) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug)]
pub struct Surface {
    nodes: Vec<Option<SurfaceNode>>,
    body: SurfaceId,
    selection: Option<NativeSelection>,
    active: Option<SurfaceId>,
    selection_writes: usize,
    scroll_requests: usize,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub fn new() -> Self {
        let mut surface = Self {
            nodes: Vec::new(),
            body: SurfaceId(0),
            selection: None,
            active: None,
            selection_writes: 0,
            scroll_requests: 0,
        };
        surface.body = surface.create_element("body");
        surface
    }

    /// Top of the document every mounted node descends from
    pub fn body(&self) -> SurfaceId {
        self.body
    }

    fn node(&self, id: SurfaceId) -> Option<&SurfaceNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: SurfaceId) -> Option<&mut SurfaceNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn push(&mut self, kind: SurfaceKind) -> SurfaceId {
        let id = SurfaceId(self.nodes.len());
        self.nodes.push(Some(SurfaceNode {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    // ============ Tree construction ============

    /// A detached element
    pub fn create_element(&mut self, tag: &str) -> SurfaceId {
        self.push(SurfaceKind::Element {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
        })
    }

    /// A detached text node
    pub fn create_text(&mut self, text: &str) -> SurfaceId {
        self.push(SurfaceKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: SurfaceId, child: SurfaceId) {
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Create an element under `parent` with the given attributes
    pub fn append_element(&mut self, parent: SurfaceId, tag: &str, attrs: &[(&str, &str)]) -> SurfaceId {
        let element = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(element, name, value);
        }
        self.append_child(parent, element);
        element
    }

    pub fn append_text(&mut self, parent: SurfaceId, text: &str) -> SurfaceId {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    fn detach(&mut self, child: SurfaceId) {
        let Some(parent) = self.node(child).and_then(|node| node.parent) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    /// Detach and free `node` with its subtree, dropping a selection or
    /// focus that pointed inside it
    pub fn remove(&mut self, node: SurfaceId) {
        self.detach(node);
        let mut doomed = vec![node];
        doomed.extend(self.descendants(node));

        if let Some(selection) = self.selection
            && (doomed.contains(&selection.anchor.node) || doomed.contains(&selection.focus.node))
        {
            self.selection = None;
        }
        if self.active.is_some_and(|active| doomed.contains(&active)) {
            self.active = None;
        }
        for id in doomed {
            if let Some(slot) = self.nodes.get_mut(id.0) {
                *slot = None;
            }
        }
    }

    pub fn clear_children(&mut self, parent: SurfaceId) {
        for child in self.children(parent).to_vec() {
            self.remove(child);
        }
    }

    // ============ Accessors ============

    pub fn exists(&self, id: SurfaceId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: SurfaceId) -> Option<&SurfaceKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn tag(&self, id: SurfaceId) -> Option<&str> {
        match self.kind(id)? {
            SurfaceKind::Element { tag, .. } => Some(tag),
            SurfaceKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: SurfaceId) -> bool {
        self.tag(id).is_some()
    }

    pub fn is_text(&self, id: SurfaceId) -> bool {
        matches!(self.kind(id), Some(SurfaceKind::Text(_)))
    }

    pub fn attr(&self, id: SurfaceId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            SurfaceKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            SurfaceKind::Text(_) => None,
        }
    }

    pub fn has_attr(&self, id: SurfaceId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: SurfaceId, name: &str, value: &str) {
        if let Some(SurfaceNode {
            kind: SurfaceKind::Element { attrs, .. },
            ..
        }) = self.node_mut(id)
        {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn text(&self, id: SurfaceId) -> Option<&str> {
        match self.kind(id)? {
            SurfaceKind::Text(text) => Some(text),
            SurfaceKind::Element { .. } => None,
        }
    }

    /// Replace the content of a text node, as native typing does
    pub fn set_text(&mut self, id: SurfaceId, text: &str) {
        if let Some(SurfaceNode {
            kind: SurfaceKind::Text(content),
            ..
        }) = self.node_mut(id)
        {
            *content = text.to_string();
        }
    }

    pub fn parent(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: SurfaceId) -> &[SurfaceId] {
        self.node(id).map_or(&[], |node| &node.children)
    }

    /// Concatenated text of every text node under `id`
    pub fn text_content(&self, id: SurfaceId) -> String {
        match self.kind(id) {
            Some(SurfaceKind::Text(text)) => text.clone(),
            Some(SurfaceKind::Element { .. }) => self
                .children(id)
                .iter()
                .map(|&child| self.text_content(child))
                .collect(),
            None => String::new(),
        }
    }

    /// Every node below `id` in document order
    pub fn descendants(&self, id: SurfaceId) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        let mut stack: Vec<SurfaceId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Nearest inclusive ancestor element carrying `attr`
    pub fn closest(&self, id: SurfaceId, attr: &str) -> Option<SurfaceId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.has_attr(node, attr) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Whether `node` is `ancestor` or lies below it
    pub fn contains(&self, ancestor: SurfaceId, node: SurfaceId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Inside a `contenteditable="false"` subtree below the editor root.
    ///
    /// A read-only editor root does not make its own content non-editable.
    pub fn is_non_editable(&self, id: SurfaceId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.has_attr(node, attrs::EDITOR) {
                return false;
            }
            match self.attr(node, attrs::CONTENT_EDITABLE) {
                Some("false") => return true,
                Some(_) => return false,
                None => current = self.parent(node),
            }
        }
        false
    }

    /// Block-level on the surface: a block tag or an atomic node
    pub fn is_block(&self, id: SurfaceId) -> bool {
        match self.tag(id) {
            Some(tag) => BLOCK_TAGS.contains(&tag) || self.has_attr(id, attrs::VOID),
            None => false,
        }
    }

    fn index_path(&self, id: SurfaceId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let index = self
                .children(parent)
                .iter()
                .position(|&c| c == current)
                .unwrap_or(0);
            path.push(index);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Document order of two positions
    pub fn compare_positions(&self, a: &SurfacePosition, b: &SurfacePosition) -> Ordering {
        let resolve = |position: &SurfacePosition| {
            let mut path = self.index_path(position.node);
            if self.is_element(position.node) {
                path.push(position.offset);
                (path, 0)
            } else {
                (path, position.offset)
            }
        };
        let (path_a, offset_a) = resolve(a);
        let (path_b, offset_b) = resolve(b);
        path_a.cmp(&path_b).then(offset_a.cmp(&offset_b))
    }

    // ============ Selection and focus ============

    pub fn selection(&self) -> Option<NativeSelection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<NativeSelection>) {
        self.selection_writes += 1;
        self.selection = selection;
    }

    /// How many times the selection has been replaced
    pub fn selection_writes(&self) -> usize {
        self.selection_writes
    }

    pub fn is_backward(&self, selection: &NativeSelection) -> bool {
        self.compare_positions(&selection.focus, &selection.anchor).is_lt()
    }

    pub fn active_element(&self) -> Option<SurfaceId> {
        self.active
    }

    pub fn focus(&mut self, id: SurfaceId) {
        self.active = Some(id);
    }

    pub fn blur(&mut self) {
        self.active = None;
    }

    pub fn scroll_into_view(&mut self, position: SurfacePosition) {
        log::trace!("scrolling {position:?} into view");
        self.scroll_requests += 1;
    }

    pub fn scroll_requests(&self) -> usize {
        self.scroll_requests
    }

    // ============ Serialization ============

    /// Outer HTML of `id`
    pub fn to_html(&self, id: SurfaceId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Inner HTML of `id`
    pub fn inner_html(&self, id: SurfaceId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: SurfaceId, out: &mut String) {
        match self.kind(id) {
            Some(SurfaceKind::Text(text)) => out.push_str(&html_escape::encode_text(text)),
            Some(SurfaceKind::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if tag == "br" {
                    return;
                }
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            None => {}
        }
    }

    /// Rendered text of `id`: placeholder runs and non-editable content
    /// contribute nothing, block-level elements end with a line break
    pub fn plain_text(&self, id: SurfaceId) -> String {
        let mut out = String::new();
        self.write_plain_text(id, &mut out);
        out
    }

    fn write_plain_text(&self, id: SurfaceId, out: &mut String) {
        match self.kind(id) {
            Some(SurfaceKind::Text(text)) => out.push_str(text),
            Some(SurfaceKind::Element { .. }) => {
                if self.has_attr(id, attrs::ZERO_WIDTH)
                    || self.has_attr(id, attrs::PLACEHOLDER)
                    || self.attr(id, attrs::CONTENT_EDITABLE) == Some("false")
                {
                    return;
                }
                for &child in self.children(id) {
                    self.write_plain_text(child, out);
                }
                if self.is_block(id) && id != self.body {
                    out.push('\n');
                }
            }
            None => {}
        }
    }
}

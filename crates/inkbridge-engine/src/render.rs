//! Minimal renderer from the document model onto a [`Surface`].
//!
//! Every model node gets one surface element carrying `data-ink-*`
//! attributes, and the renderer reports parent/index links and element
//! bindings to the [`Registry`] as it goes. Text nodes are split into leaves
//! by decorations; empty leaves become zero-width runs so the caret has a
//! character to sit on.

use std::collections::BTreeSet;

use crate::model::{Element, Node, NodeRef, Path, Range, Text};
use crate::registry::{Key, Registry};
use crate::surface::{PLACEHOLDER_CHAR, Surface, SurfaceId, attrs};

/// Render-time overlay on a range of the document
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub range: Range,
    pub marks: BTreeSet<String>,
    pub placeholder: Option<String>,
}

impl Decoration {
    pub fn placeholder(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            marks: BTreeSet::new(),
            placeholder: Some(text.into()),
        }
    }
}

/// A run of a text node sharing marks and placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub text: String,
    pub marks: BTreeSet<String>,
    pub placeholder: Option<String>,
}

/// Split `text` at `path` into leaves along decoration boundaries
pub fn leaves(text: &Text, path: &[usize], decorations: &[Decoration]) -> Vec<Leaf> {
    let len = text.len();
    let spans: Vec<(usize, usize, &Decoration)> = decorations
        .iter()
        .filter(|decoration| decoration.range.includes_path(path))
        .map(|decoration| {
            let (start, end) = decoration.range.edges();
            let from = if start.path.as_slice() == path { start.offset.min(len) } else { 0 };
            let to = if end.path.as_slice() == path { end.offset.min(len) } else { len };
            (from, to, decoration)
        })
        .collect();

    let mut cuts: BTreeSet<usize> = [0, len].into_iter().collect();
    for (from, to, _) in &spans {
        cuts.insert(*from);
        cuts.insert(*to);
    }
    let cuts: Vec<usize> = cuts.into_iter().collect();
    let segments: Vec<(usize, usize)> = if len == 0 {
        vec![(0, 0)]
    } else {
        cuts.windows(2).map(|pair| (pair[0], pair[1])).collect()
    };

    segments
        .into_iter()
        .map(|(from, to)| {
            let mut leaf = Leaf {
                text: crate::model::node::slice_chars(&text.text, from, to),
                marks: text.marks.clone(),
                placeholder: None,
            };
            for (start, end, decoration) in &spans {
                if *start <= from && to <= *end {
                    leaf.marks.extend(decoration.marks.iter().cloned());
                    if decoration.placeholder.is_some() {
                        leaf.placeholder = decoration.placeholder.clone();
                    }
                }
            }
            leaf
        })
        .collect()
}

fn tag_for(element: &Element) -> &'static str {
    if element.inline {
        return match element.kind.as_str() {
            "link" => "a",
            _ => "span",
        };
    }
    match element.kind.as_str() {
        "paragraph" => "p",
        "heading" | "heading-one" => "h1",
        "heading-two" => "h2",
        "heading-three" => "h3",
        "quote" | "block-quote" => "blockquote",
        "list-item" => "li",
        "bulleted-list" => "ul",
        "numbered-list" => "ol",
        "code" | "code-block" => "pre",
        _ => "div",
    }
}

fn mark_tag(mark: &str) -> &'static str {
    match mark {
        "bold" => "strong",
        "italic" => "em",
        "code" => "code",
        "underline" => "u",
        "strikethrough" => "s",
        _ => "span",
    }
}

pub struct Renderer<'a> {
    surface: &'a mut Surface,
    registry: &'a mut Registry,
    decorations: &'a [Decoration],
}

impl<'a> Renderer<'a> {
    pub fn new(surface: &'a mut Surface, registry: &'a mut Registry, decorations: &'a [Decoration]) -> Self {
        Self {
            surface,
            registry,
            decorations,
        }
    }

    /// Replace the content of `container` with a fresh rendering of `root`.
    ///
    /// Keys that no rendered element claims are released afterwards.
    pub fn render_document(&mut self, root: &NodeRef, container: SurfaceId) {
        self.registry.unbind_all();
        self.surface.clear_children(container);

        let root_key = self.registry.key_of(root);
        self.registry.set_root(root_key);
        self.registry.bind_element(root_key, container);
        self.surface.set_attr(container, attrs::KEY, &root_key.to_string());

        let mut path = Vec::new();
        self.render_children(root, root_key, &mut path, container);
        self.registry.release_unmounted();
        log::trace!("rendered {} keyed nodes", self.registry.len());
    }

    fn render_children(&mut self, parent: &NodeRef, parent_key: Key, path: &mut Path, container: SurfaceId) {
        for (index, child) in parent.children().iter().enumerate() {
            let key = self.registry.key_of(child);
            self.registry.record_child(parent_key, index, key);
            path.push(index);
            match child.as_ref() {
                Node::Element(element) => self.render_element(child, element, key, path, container),
                Node::Text(text) => self.render_text(parent, text, key, path, container),
            }
            path.pop();
        }
    }

    fn render_element(&mut self, node: &NodeRef, element: &Element, key: Key, path: &mut Path, container: SurfaceId) {
        let key_attr = key.to_string();
        let mut attributes = vec![
            (attrs::NODE, "element"),
            (attrs::KEY, key_attr.as_str()),
            (attrs::TYPE, element.kind.as_str()),
        ];
        if element.void {
            attributes.push((attrs::VOID, "true"));
        }
        if element.inline {
            attributes.push((attrs::INLINE, "true"));
        }
        let tag = if element.void && !element.inline { "div" } else { tag_for(element) };
        let id = self.surface.append_element(container, tag, &attributes);
        self.registry.bind_element(key, id);

        if element.void {
            let spacer = self.surface.append_element(id, "span", &[(attrs::SPACER, "true")]);
            self.render_children(node, key, path, spacer);

            let companion = self.surface.append_element(
                id,
                if element.inline { "span" } else { "div" },
                &[(attrs::CONTENT_EDITABLE, "false"), (attrs::VOID_CONTENT, "true")],
            );
            let label = element
                .props
                .get("label")
                .and_then(|value| value.as_str())
                .unwrap_or(element.kind.as_str())
                .to_string();
            self.surface.append_text(companion, &label);
        } else {
            self.render_children(node, key, path, id);
        }
    }

    fn render_text(&mut self, parent: &NodeRef, text: &Text, key: Key, path: &Path, container: SurfaceId) {
        let key_attr = key.to_string();
        let id = self
            .surface
            .append_element(container, "span", &[(attrs::NODE, "text"), (attrs::KEY, key_attr.as_str())]);
        self.registry.bind_element(key, id);

        let leaves = leaves(text, path, self.decorations);
        let is_last_child = path
            .last()
            .is_some_and(|&index| index + 1 == parent.children().len());
        let parent_is_empty_block = !parent.is_inline() && parent.string().is_empty();

        for leaf in leaves {
            let leaf_id = self.surface.append_element(id, "span", &[(attrs::LEAF, "true")]);
            if let Some(placeholder) = &leaf.placeholder {
                let span = self.surface.append_element(
                    leaf_id,
                    "span",
                    &[(attrs::PLACEHOLDER, "true"), (attrs::CONTENT_EDITABLE, "false")],
                );
                self.surface.append_text(span, placeholder);
            }

            let mut inner = leaf_id;
            for mark in &leaf.marks {
                let tag = mark_tag(mark);
                inner = if tag == "span" {
                    self.surface.append_element(inner, tag, &[("data-ink-mark", mark.as_str())])
                } else {
                    self.surface.append_element(inner, tag, &[])
                };
            }

            if parent.is_void() {
                let length = char_len_of(parent);
                self.zero_width(inner, length, false);
            } else if leaf.text.is_empty() && is_last_child && parent_is_empty_block {
                self.zero_width(inner, 0, true);
            } else if leaf.text.is_empty() {
                self.zero_width(inner, 0, false);
            } else {
                let string = self.surface.append_element(inner, "span", &[(attrs::STRING, "true")]);
                self.surface.append_text(string, &leaf.text);
            }
        }
    }

    fn zero_width(&mut self, container: SurfaceId, length: usize, line_break: bool) {
        let length = length.to_string();
        let kind = if line_break { "n" } else { "z" };
        let span = self.surface.append_element(
            container,
            "span",
            &[(attrs::ZERO_WIDTH, kind), (attrs::LENGTH, length.as_str())],
        );
        self.surface.append_text(span, &PLACEHOLDER_CHAR.to_string());
        if line_break {
            self.surface.append_element(span, "br", &[]);
        }
    }
}

fn char_len_of(node: &NodeRef) -> usize {
    crate::model::node::char_len(&node.string())
}

/// Render detached `fragment` nodes into a scratch surface.
///
/// Returns the surface and the container holding the rendered blocks.
pub fn render_fragment(fragment: &[NodeRef]) -> (Surface, SurfaceId) {
    let mut surface = Surface::new();
    let body = surface.body();
    let container = surface.append_element(body, "div", &[]);
    let mut registry = Registry::new();
    let root = Node::root(fragment.to_vec());
    Renderer::new(&mut surface, &mut registry, &[]).render_document(&root, container);
    (surface, container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;
    use pretty_assertions::assert_eq;

    fn render(children: Vec<NodeRef>, decorations: &[Decoration]) -> (Surface, SurfaceId, Registry, NodeRef) {
        let mut surface = Surface::new();
        let body = surface.body();
        let container = surface.append_element(body, "div", &[]);
        let mut registry = Registry::new();
        let root = Node::root(children);
        Renderer::new(&mut surface, &mut registry, decorations).render_document(&root, container);
        (surface, container, registry, root)
    }

    #[test]
    fn test_leaves_split_on_decorations() {
        let text = Text::with_marks("hello", ["italic"]);
        let decoration = Decoration {
            range: Range::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 3)),
            marks: ["bold".to_string()].into_iter().collect(),
            placeholder: None,
        };
        let leaves = leaves(&text, &[0, 0], &[decoration]);

        let texts: Vec<&str> = leaves.iter().map(|leaf| leaf.text.as_str()).collect();
        assert_eq!(texts, vec!["h", "el", "lo"]);
        assert!(leaves[1].marks.contains("bold"));
        assert!(leaves[1].marks.contains("italic"));
        assert!(!leaves[2].marks.contains("bold"));
    }

    #[test]
    fn test_render_paragraph_with_marks() {
        let (surface, container, _, _) = render(
            vec![Node::element(
                "paragraph",
                vec![Node::text("a"), Node::marked("b", ["bold"])],
            )],
            &[],
        );
        insta::assert_snapshot!(
            surface.inner_html(container),
            @r#"<p data-ink-key="1" data-ink-node="element" data-ink-type="paragraph"><span data-ink-key="2" data-ink-node="text"><span data-ink-leaf="true"><span data-ink-string="true">a</span></span></span><span data-ink-key="3" data-ink-node="text"><span data-ink-leaf="true"><strong><span data-ink-string="true">b</span></strong></span></span></p>"#
        );
    }

    #[test]
    fn test_empty_block_renders_line_break_run() {
        let (surface, container, _, _) = render(vec![Node::paragraph("")], &[]);
        let runs: Vec<SurfaceId> = surface
            .descendants(container)
            .into_iter()
            .filter(|&id| surface.has_attr(id, attrs::ZERO_WIDTH))
            .collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(surface.attr(runs[0], attrs::ZERO_WIDTH), Some("n"));
        assert_eq!(surface.attr(runs[0], attrs::LENGTH), Some("0"));
    }

    #[test]
    fn test_void_renders_spacer_and_companion() {
        let (surface, container, _, _) = render(vec![Node::void("image")], &[]);
        let void = surface.children(container)[0];
        assert_eq!(surface.attr(void, attrs::VOID), Some("true"));

        let children = surface.children(void);
        assert!(surface.has_attr(children[0], attrs::SPACER));
        assert_eq!(surface.attr(children[1], attrs::CONTENT_EDITABLE), Some("false"));
        assert_eq!(surface.text_content(children[1]), "image");

        let zero_width = surface
            .descendants(children[0])
            .into_iter()
            .find(|&id| surface.has_attr(id, attrs::ZERO_WIDTH));
        assert!(zero_width.is_some_and(|id| surface.attr(id, attrs::ZERO_WIDTH) == Some("z")));
    }

    #[test]
    fn test_render_binds_every_node() {
        let (surface, container, mut registry, root) =
            render(vec![Node::paragraph("a"), Node::void("image")], &[]);

        for (path, node) in crate::model::node::descendants(&root) {
            let key = registry.key_of(&node);
            let element = registry.element_of(key).unwrap();
            assert!(surface.contains(container, element));
            assert_eq!(registry.path_of(key).unwrap(), path);
        }
    }

    #[test]
    fn test_placeholder_leaf() {
        let decoration = Decoration::placeholder(Range::collapsed(Point::new(vec![0, 0], 0)), "Type here");
        let (surface, container, _, _) = render(vec![Node::paragraph("")], &[decoration]);

        let placeholder = surface
            .descendants(container)
            .into_iter()
            .find(|&id| surface.has_attr(id, attrs::PLACEHOLDER))
            .unwrap();
        assert_eq!(surface.text_content(placeholder), "Type here");
        assert!(surface.is_non_editable(placeholder));
        let paragraph = surface.children(container)[0];
        assert_eq!(surface.plain_text(paragraph), "\n");
    }
}

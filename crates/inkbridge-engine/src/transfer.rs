//! Fragment transfer codec for copy, cut, paste and drag.
//!
//! A payload carries three views of the same content. The encoded fragment
//! (JSON in standard base64) round-trips losslessly and always wins on input;
//! the markup view embeds the same encoded fragment in a `data-ink-fragment`
//! attribute so it survives hosts that only keep `text/html`; the plain-text
//! view is the last resort.

use std::sync::OnceLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::TransferError;
use crate::model::{Editor, ModelError, NodeRef};
use crate::render::render_fragment;
use crate::surface::{PLACEHOLDER_CHAR, Surface, SurfaceId, attrs};

pub const FRAGMENT_MIME: &str = "application/x-inkbridge-fragment";
pub const HTML_MIME: &str = "text/html";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPayload {
    pub fragment: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl TransferPayload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Read a slot by MIME type
    pub fn get(&self, mime: &str) -> Option<&str> {
        match mime {
            FRAGMENT_MIME => self.fragment.as_deref(),
            HTML_MIME => self.html.as_deref(),
            TEXT_MIME => self.text.as_deref(),
            _ => None,
        }
    }

    /// Write a slot by MIME type, ignoring types the codec does not carry
    pub fn set(&mut self, mime: &str, value: impl Into<String>) {
        let slot = match mime {
            FRAGMENT_MIME => &mut self.fragment,
            HTML_MIME => &mut self.html,
            TEXT_MIME => &mut self.text,
            _ => {
                log::debug!("dropping unsupported transfer type {mime}");
                return;
            }
        };
        *slot = Some(value.into());
    }
}

pub fn encode_fragment(fragment: &[NodeRef]) -> Result<String, TransferError> {
    let json = serde_json::to_string(fragment)?;
    Ok(STANDARD.encode(json))
}

pub fn decode_fragment(encoded: &str) -> Result<Vec<NodeRef>, TransferError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serialize the editor's selection.
///
/// Returns `None` for a missing selection or a caret outside any void.
pub fn serialize(editor: &Editor) -> Option<TransferPayload> {
    let selection = editor.selection()?;
    if selection.is_collapsed() && editor.void_above(&selection.anchor.path).is_none() {
        return None;
    }

    let fragment = editor.fragment();
    if fragment.is_empty() {
        return None;
    }
    let encoded = match encode_fragment(&fragment) {
        Ok(encoded) => encoded,
        Err(err) => {
            log::warn!("Failed to encode fragment: {err}");
            return None;
        }
    };

    let (mut surface, container) = render_fragment(&fragment);
    let text = fragment_text(&surface, container);

    if let Some(&first) = surface.children(container).first() {
        surface.set_attr(first, attrs::FRAGMENT, &encoded);
    }
    clear_placeholders(&mut surface, container);
    let html = surface.inner_html(container);

    Some(TransferPayload {
        fragment: Some(encoded),
        html: Some(html),
        text: Some(text),
    })
}

/// Plain text of the rendered fragment without the final block's line break
fn fragment_text(surface: &Surface, container: SurfaceId) -> String {
    let mut text: String = surface
        .children(container)
        .iter()
        .map(|&child| surface.plain_text(child))
        .collect();
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

fn clear_placeholders(surface: &mut Surface, container: SurfaceId) {
    let placeholders: Vec<SurfaceId> = surface
        .descendants(container)
        .into_iter()
        .filter(|&id| {
            surface.is_text(id)
                && surface.text(id).is_some_and(|text| text.contains(PLACEHOLDER_CHAR))
                && surface.parent(id).is_some_and(|parent| surface.has_attr(parent, attrs::ZERO_WIDTH))
        })
        .collect();
    for id in placeholders {
        surface.set_text(id, "");
    }
}

/// The encoded fragment from the dedicated slot, or embedded in the markup
fn encoded_fragment(payload: &TransferPayload) -> Option<String> {
    if let Some(fragment) = payload.fragment.as_ref().filter(|fragment| !fragment.is_empty()) {
        return Some(fragment.clone());
    }

    static FRAGMENT_ATTR_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = FRAGMENT_ATTR_REGEX
        .get_or_init(|| Regex::new(r#"data-ink-fragment="([^"]+)""#).expect("Invalid fragment attribute regex"));
    let html = payload.html.as_deref()?;
    let captures = regex.captures(html)?;
    Some(html_escape::decode_html_entities(&captures[1]).into_owned())
}

/// Insert a payload at the editor's selection.
///
/// A decodable fragment is inserted as nodes; otherwise the plain text is
/// inserted line by line with a block break between lines.
pub fn insert_data(editor: &mut Editor, payload: &TransferPayload) -> Result<(), ModelError> {
    if let Some(encoded) = encoded_fragment(payload) {
        match decode_fragment(&encoded) {
            Ok(fragment) if !fragment.is_empty() => return editor.insert_fragment(&fragment),
            Ok(_) => log::warn!("Transferred fragment is empty, falling back to plain text"),
            Err(err) => log::warn!("Failed to decode transferred fragment, falling back to plain text: {err}"),
        }
    }

    let Some(text) = payload.text.as_deref() else {
        return Ok(());
    };

    static LINE_BREAK_REGEX: OnceLock<Regex> = OnceLock::new();
    let line_breaks = LINE_BREAK_REGEX.get_or_init(|| Regex::new(r"\r\n|\r|\n").expect("Invalid line break regex"));

    for (index, line) in line_breaks.split(text).enumerate() {
        if index > 0 {
            editor.insert_break()?;
        }
        editor.insert_text(line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Operation, Point, Range};
    use pretty_assertions::assert_eq;

    fn select(editor: &mut Editor, anchor: Point, focus: Point) {
        editor.select(Range::new(anchor, focus)).unwrap();
        editor.flush();
    }

    #[test]
    fn test_collapsed_caret_outside_void_serializes_nothing() {
        let mut editor = Editor::new(vec![Node::paragraph("hello")]);
        select(&mut editor, Point::new(vec![0, 0], 2), Point::new(vec![0, 0], 2));
        assert_eq!(serialize(&editor), None);
    }

    #[test]
    fn test_collapsed_caret_in_void_serializes_the_void() {
        let mut editor = Editor::new(vec![Node::paragraph("a"), Node::void("image")]);
        select(&mut editor, Point::new(vec![1, 0], 0), Point::new(vec![1, 0], 0));

        let payload = serialize(&editor).unwrap();
        let fragment = decode_fragment(payload.fragment.as_deref().unwrap()).unwrap();
        assert_eq!(fragment, vec![Node::void("image")]);
        assert_eq!(payload.text.as_deref(), Some(""));
    }

    #[test]
    fn test_two_block_views() {
        let mut editor = Editor::new(vec![Node::paragraph("hello"), Node::paragraph("world")]);
        select(&mut editor, Point::new(vec![0, 0], 3), Point::new(vec![1, 0], 2));

        let payload = serialize(&editor).unwrap();
        assert_eq!(payload.text.as_deref(), Some("lo\nwo"));

        let html = payload.html.unwrap();
        assert!(html.starts_with("<p "));
        assert!(html.contains(&format!("data-ink-fragment=\"{}\"", payload.fragment.unwrap())));
        assert!(!html.contains(PLACEHOLDER_CHAR));
    }

    #[test]
    fn test_fragment_recovered_from_markup() {
        let encoded = encode_fragment(&[Node::paragraph("x")]).unwrap();
        let payload = TransferPayload {
            html: Some(format!("<meta charset=\"utf-8\"><p data-ink-fragment=\"{encoded}\">x</p>")),
            text: Some("ignored".to_string()),
            ..TransferPayload::default()
        };

        let mut editor = Editor::new(vec![Node::paragraph("ab")]);
        select(&mut editor, Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 1));
        insert_data(&mut editor, &payload).unwrap();
        assert_eq!(editor.string(&[]), "axb");
    }

    #[test]
    fn test_malformed_fragment_falls_back_to_text() {
        let _ = env_logger::builder().is_test(true).try_init();
        let payload = TransferPayload {
            fragment: Some("%%% not base64 %%%".to_string()),
            text: Some("plain".to_string()),
            ..TransferPayload::default()
        };

        let mut editor = Editor::new(vec![Node::paragraph("")]);
        select(&mut editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 0));
        insert_data(&mut editor, &payload).unwrap();
        assert_eq!(editor.string(&[]), "plain");
    }

    #[test]
    fn test_plain_text_lines_become_blocks() {
        let mut editor = Editor::new(vec![Node::paragraph("")]);
        select(&mut editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 0));
        insert_data(&mut editor, &TransferPayload::plain("a\r\nb\rc")).unwrap();

        assert_eq!(
            editor.children().iter().map(|block| block.string()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        let operations = editor.flush().unwrap();
        assert!(matches!(operations.first(), Some(Operation::InsertText { .. })));
    }

    #[test]
    fn test_payload_slots_by_mime() {
        let mut payload = TransferPayload::default();
        payload.set(TEXT_MIME, "t");
        payload.set("image/png", "ignored");
        assert_eq!(payload.get(TEXT_MIME), Some("t"));
        assert_eq!(payload.get(FRAGMENT_MIME), None);
        assert_eq!(payload, TransferPayload::plain("t"));
    }
}

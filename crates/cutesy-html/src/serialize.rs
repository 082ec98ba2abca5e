use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_dom::NodeKind;

use crate::is_raw_text_tag;
use crate::is_void;

/// Markup for the node itself and everything beneath it.
pub fn outer_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(document, id, &mut out);
    out
}

/// Markup for the children of `id`.
pub fn inner_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_children(document, id, &mut out);
    out
}

fn write_node(document: &Document, id: NodeId, out: &mut String) {
    match document.kind(id) {
        Some(NodeKind::Text(text)) => {
            let raw = document
                .parent(id)
                .and_then(|parent| document.tag_name(parent))
                .is_some_and(is_raw_text_tag);
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Some(NodeKind::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag_name);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
            out.push('>');

            if is_void(&element.tag_name) {
                return;
            }

            write_children(document, id, out);
            out.push_str("</");
            out.push_str(&element.tag_name);
            out.push('>');
        }
        Some(NodeKind::Document) => write_children(document, id, out),
        None => {}
    }
}

fn write_children(document: &Document, id: NodeId, out: &mut String) {
    for child in document.children(id) {
        write_node(document, *child, out);
    }
}

pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attribute(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

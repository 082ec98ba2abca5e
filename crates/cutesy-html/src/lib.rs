//! HTML tokenization, fragment parsing and markup serialization.

mod serialize;

use cutesy_dom::Document;
use cutesy_dom::NodeId;

pub use serialize::escape_attribute;
pub use serialize::escape_text;
pub use serialize::inner_html;
pub use serialize::outer_html;

/// Parses markup into nodes of a [`Document`].
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    /// Parses a whole page; top-level nodes are attached to the document root.
    pub fn parse_document(&self, input: &str) -> Document {
        let mut document = Document::new();
        let root = document.root();
        for node in self.parse_fragment(&mut document, input) {
            document.append_child(root, node);
        }
        document
    }

    /// Parses markup into detached nodes owned by `document`, in source order.
    pub fn parse_fragment(&self, document: &mut Document, input: &str) -> Vec<NodeId> {
        let container = document.create_element("template");
        build_tree(document, container, tokenize(input));

        let nodes = document.children(container).to_vec();
        for node in &nodes {
            document.detach(*node);
        }
        document.remove_subtree(container);
        nodes
    }
}

/// Replaces the children of `parent` with the parsed markup.
pub fn set_inner_html(document: &mut Document, parent: NodeId, markup: &str) {
    let nodes = HtmlParser.parse_fragment(document, markup);
    document.replace_children(parent, &nodes);
}

/// Appends parsed markup after the existing children of `parent`.
pub fn append_html(document: &mut Document, parent: NodeId, markup: &str) {
    for node in HtmlParser.parse_fragment(document, markup) {
        if !document.append_child(parent, node) {
            document.remove_subtree(node);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = source.as_bytes();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if starts_with(bytes, idx, b"<!--") {
            idx = skip_comment(bytes, idx);
            continue;
        }

        if bytes[idx] == b'<' {
            if starts_with(bytes, idx, b"</") {
                if let Some((token, next)) = parse_end_tag(bytes, idx) {
                    out.push(token);
                    idx = next;
                    continue;
                }
            } else if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            } else if let Some((token, next)) = parse_start_tag(bytes, idx) {
                let raw_text_tag = match &token {
                    Token::Start {
                        name, self_closing, ..
                    } if !*self_closing && is_raw_text_tag(name) => Some(name.clone()),
                    _ => None,
                };

                out.push(token);
                idx = next;

                if let Some(tag_name) = raw_text_tag {
                    let (raw_text, after) = read_raw_text_until_end_tag(source, idx, &tag_name);
                    if !raw_text.is_empty() {
                        out.push(Token::Text(raw_text.to_owned()));
                    }
                    out.push(Token::End { name: tag_name });
                    idx = after;
                }
                continue;
            }
        }

        let next = find_byte(bytes, idx.saturating_add(1), b'<').unwrap_or(bytes.len());
        out.push(Token::Text(decode_entities(&source[idx..next])));
        idx = next;
    }

    out
}

fn build_tree(document: &mut Document, container: NodeId, tokens: Vec<Token>) {
    let mut stack = vec![container];

    for token in tokens {
        let current = stack.last().copied().unwrap_or(container);
        match token {
            Token::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                // Adjacent text tokens (e.g. around a stray `<`) merge into one node.
                let last = document.children(current).last().copied();
                if let Some(previous) = last.filter(|node| document.text(*node).is_some()) {
                    let merged = format!("{}{text}", document.text(previous).unwrap_or_default());
                    let replacement = document.create_text(&merged);
                    document.remove_subtree(previous);
                    document.append_child(current, replacement);
                } else {
                    document.append_text(current, &text);
                }
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                let element = document.create_element(&name);
                for (attr, value) in attrs {
                    if document.get_attribute(element, &attr).is_none() {
                        document.set_attribute(element, &attr, &value);
                    }
                }
                document.append_child(current, element);

                if !self_closing && !is_void(&name) {
                    stack.push(element);
                }
            }
            Token::End { name } => {
                let open = stack
                    .iter()
                    .skip(1)
                    .rposition(|node| document.tag_name(*node) == Some(name.as_str()));
                if let Some(position) = open {
                    stack.truncate(position + 1);
                }
            }
        }
    }
}

fn parse_start_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = start.saturating_add(1);
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        if idx >= bytes.len() {
            return None;
        }

        if bytes[idx] == b'>' {
            idx = idx.saturating_add(1);
            break;
        }

        if bytes[idx] == b'/' {
            self_closing = true;
            idx = idx.saturating_add(1);
            continue;
        }
        self_closing = false;

        let attr_start = idx;
        while idx < bytes.len() && !is_attr_name_end(bytes[idx]) {
            idx = idx.saturating_add(1);
        }
        if idx == attr_start {
            idx = idx.saturating_add(1);
            continue;
        }

        let attr_name = String::from_utf8_lossy(&bytes[attr_start..idx]).to_ascii_lowercase();
        idx = skip_spaces(bytes, idx);

        let mut value = String::new();
        if bytes.get(idx).copied() == Some(b'=') {
            idx = skip_spaces(bytes, idx.saturating_add(1));
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    let value_start = idx.saturating_add(1);
                    let value_end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                    value = String::from_utf8_lossy(&bytes[value_start..value_end]).into_owned();
                    idx = value_end.saturating_add(1);
                }
                _ => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx = idx.saturating_add(1);
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).into_owned();
                }
            }
        }

        attrs.push((attr_name, decode_entities(&value)));
    }

    Some((
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        idx,
    ))
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = skip_spaces(bytes, start.saturating_add(2));
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let close = find_byte(bytes, idx, b'>')?;
    Some((Token::End { name }, close.saturating_add(1)))
}

fn read_raw_text_until_end_tag<'a>(input: &'a str, start: usize, tag_name: &str) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
        {
            let after = find_byte(bytes, idx, b'>')
                .map(|close| close.saturating_add(1))
                .unwrap_or(bytes.len());
            return (&input[start..idx], after);
        }
        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

/// Decodes the named and numeric character references used in editor content.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0_usize;

    while let Some(rel_amp) = input[cursor..].find('&') {
        let amp = cursor + rel_amp;
        out.push_str(&input[cursor..amp]);

        let rest = &input[amp + 1..];
        let decoded = rest
            .find(';')
            .filter(|semi| *semi <= 32)
            .and_then(|semi| decode_entity(&rest[..semi]).map(|value| (value, semi)));

        match decoded {
            Some((value, semi)) => {
                out.push(value);
                cursor = amp + 1 + semi + 1;
            }
            None => {
                out.push('&');
                cursor = amp + 1;
            }
        }
    }

    out.push_str(&input[cursor..]);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "nbsp" => Some('\u{a0}'),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let value = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(value)
        }
    }
}

pub(crate) fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

pub(crate) fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_attr_name_end(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/')
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start.saturating_add(4), b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn skip_to_gt(bytes: &[u8], idx: usize) -> usize {
    find_byte(bytes, idx, b'>')
        .map(|close| close.saturating_add(1))
        .unwrap_or(bytes.len())
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end].eq_ignore_ascii_case(pattern)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

use cutesy_core::TRANSFER_FORMAT;
use cutesy_core::attr;
use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_html::HtmlParser;
use cutesy_html::inner_html;

/// Drag payload keyed by format, mirroring a host data-transfer object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransfer {
    entries: Vec<(String, String)>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer carrying `data` under the plain-text format.
    pub fn with_text(data: impl Into<String>) -> Self {
        let mut transfer = Self::new();
        transfer.set_data(TRANSFER_FORMAT, data);
        transfer
    }

    pub fn set_data(&mut self, format: &str, data: impl Into<String>) {
        let format = normalize_format(format);
        let data = data.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == format) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((format, data)),
        }
    }

    pub fn get_data(&self, format: &str) -> Option<&str> {
        let format = normalize_format(format);
        self.entries
            .iter()
            .find(|(existing, _)| *existing == format)
            .map(|(_, data)| data.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.get_data(TRANSFER_FORMAT)
    }

    pub fn clear_data(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses the plain-text payload into `scratch` and returns its first element.
    pub(crate) fn payload_element(&self, scratch: &mut Document) -> Option<NodeId> {
        let markup = self.text()?;
        let root = scratch.root();
        for node in HtmlParser.parse_fragment(scratch, markup) {
            scratch.append_child(root, node);
        }
        scratch.first_element_child(root)
    }
}

fn normalize_format(format: &str) -> String {
    let format = format.trim().to_ascii_lowercase();
    match format.as_str() {
        "text" => TRANSFER_FORMAT.to_owned(),
        "url" => "text/uri-list".to_owned(),
        _ => format,
    }
}

/// Closest ancestor-or-self palette item of `node`.
pub(crate) fn palette_item(document: &Document, node: NodeId) -> Option<NodeId> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if document.has_attribute(current, attr::PALETTE_ITEM) {
            return Some(current);
        }
        cursor = document.parent(current);
    }
    None
}

/// Payload of a palette item: the markup inside its `<template>` child.
pub fn palette_payload(document: &Document, item: NodeId) -> Option<String> {
    let template = document
        .descendants(item)
        .skip(1)
        .find(|node| document.tag_name(*node) == Some("template"))?;
    Some(inner_html(document, template).trim().to_owned())
}

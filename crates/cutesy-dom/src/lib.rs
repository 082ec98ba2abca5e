//! DOM tree data structures.
//!
//! Nodes live in a generational arena owned by [`Document`]. A [`NodeId`] stays valid
//! until its subtree is freed; afterwards it resolves to nothing instead of aliasing a
//! newer node.

mod selector;

use cutesy_css::StyleDeclaration;
use generational_arena::Arena;
use generational_arena::Index;

pub use selector::Selector;

/// ID used to address nodes in the DOM arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

/// Element payload: lower-cased tag name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag_name: String,
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document with a single document root.
#[derive(Debug)]
pub struct Document {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        }));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, the document root included.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.insert(NodeKind::Element(Element {
            tag_name: tag_name.trim().to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.insert(NodeKind::Text(text.to_owned()))
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        NodeId(self.arena.insert(Node {
            kind,
            parent: None,
            children: Vec::new(),
        }))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.arena.get(id.0).map(|node| &node.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.arena.get_mut(id.0).map(|node| &mut node.kind)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_child_nodes(&self, id: NodeId) -> bool {
        !self.children(id).is_empty()
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    pub fn child_element_count(&self, id: NodeId) -> usize {
        self.child_elements(id).count()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.child_elements(id).next()
    }

    /// Appends `child` to `parent`, detaching it from any previous parent first.
    ///
    /// Returns false when either node is gone, when `parent` is a text node, or when the
    /// append would make a node its own ancestor.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.exists(child) || self.text(parent).is_some() || self.contains(child, parent) {
            return false;
        }
        if !self.exists(parent) {
            return false;
        }

        self.detach(child);
        if let Some(node) = self.arena.get_mut(child.0) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.arena.get_mut(parent.0) {
            node.children.push(child);
        }
        true
    }

    /// Unlinks a node from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };

        if let Some(node) = self.arena.get_mut(parent.0) {
            node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.arena.get_mut(id.0) {
            node.parent = None;
        }
    }

    /// Detaches and frees a node together with all of its descendants.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if id == self.root {
            self.clear_children(id);
            return;
        }

        self.detach(id);
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.arena.remove(next.0) {
                pending.extend(node.children);
            }
        }
    }

    /// Frees every child subtree of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove_subtree(child);
        }
    }

    /// Frees the current children of `parent` and appends `children` in order.
    pub fn replace_children(&mut self, parent: NodeId, children: &[NodeId]) {
        let previous = self.children(parent).to_vec();
        for child in previous {
            if !children.contains(&child) {
                self.remove_subtree(child);
            }
        }
        for child in children {
            self.append_child(parent, *child);
        }
    }

    /// Returns true when `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Returns true when the node is attached beneath the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.exists(id) && self.contains(self.root, id)
    }

    /// Pre-order walk of `scope` and everything beneath it.
    pub fn descendants(&self, scope: NodeId) -> Descendants<'_> {
        Descendants {
            document: self,
            stack: if self.exists(scope) {
                vec![scope]
            } else {
                Vec::new()
            },
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        self.element(id)
            .map(|element| element.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return;
        }
        let Some(element) = self.element_mut(id) else {
            return;
        };

        match element.attributes.iter_mut().find(|(attr, _)| *attr == name) {
            Some(entry) => entry.1 = value.to_owned(),
            None => element.attributes.push((name, value.to_owned())),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let element = self.element_mut(id)?;
        let idx = element
            .attributes
            .iter()
            .position(|(attr, _)| attr.eq_ignore_ascii_case(name))?;
        Some(element.attributes.remove(idx).1)
    }

    /// Whitespace-separated `class` tokens, duplicates dropped, source order kept.
    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        let mut classes: Vec<String> = Vec::new();
        for token in self
            .get_attribute(id, "class")
            .unwrap_or_default()
            .split_whitespace()
        {
            if !classes.iter().any(|existing| existing == token) {
                classes.push(token.to_owned());
            }
        }
        classes
    }

    pub fn add_class(&mut self, id: NodeId, class_name: &str) {
        let class_name = class_name.trim();
        if class_name.is_empty() || class_name.contains(char::is_whitespace) {
            return;
        }

        let mut classes = self.class_list(id);
        if classes.iter().any(|existing| existing == class_name) {
            return;
        }
        classes.push(class_name.to_owned());
        self.set_attribute(id, "class", &classes.join(" "));
    }

    pub fn style(&self, id: NodeId) -> StyleDeclaration {
        StyleDeclaration::parse(self.get_attribute(id, "style").unwrap_or_default())
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) {
        if !self.is_element(id) {
            return;
        }

        let mut style = self.style(id);
        style.set_property(name, value);
        if style.is_empty() {
            self.remove_attribute(id, "style");
        } else {
            self.set_attribute(id, "style", &style.to_css_text());
        }
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Visible text: `script`/`style` skipped, whitespace runs collapsed and trimmed.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        collect_visible_text(self, id, &mut out);
        collapse_whitespace(&out)
    }

    /// Appends a text node unless `text` is empty.
    pub fn append_text(&mut self, id: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let node = self.create_text(text);
        if !self.append_child(id, node) {
            self.remove_subtree(node);
        }
    }

    /// First node in pre-order beneath `scope` (excluding `scope`) carrying `name`.
    pub fn find_with_attribute(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(scope)
            .skip(1)
            .find(|node| self.has_attribute(*node, name))
    }

    /// Every node beneath `scope` (excluding `scope`) carrying `name`.
    pub fn all_with_attribute(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .skip(1)
            .filter(|node| self.has_attribute(*node, name))
            .collect()
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .skip(1)
            .find(|node| selector.matches(self, *node))
    }
}

/// Pre-order iterator returned by [`Document::descendants`].
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.document.children(next).iter().rev().copied());
        Some(next)
    }
}

fn collect_visible_text(document: &Document, id: NodeId, out: &mut String) {
    match document.kind(id) {
        Some(NodeKind::Text(text)) => out.push_str(text),
        Some(NodeKind::Element(element))
            if matches!(element.tag_name.as_str(), "script" | "style" | "template") => {}
        Some(NodeKind::Element(element)) => {
            if element.tag_name == "br" {
                out.push('\n');
            }
            for child in document.children(id) {
                collect_visible_text(document, *child, out);
            }
        }
        Some(NodeKind::Document) => {
            for child in document.children(id) {
                collect_visible_text(document, *child, out);
            }
        }
        None => {}
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::Document;
    use super::NodeKind;

    fn sample() -> (Document, super::NodeId, super::NodeId, super::NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("DIV");
        let p = doc.create_element("p");
        let text = doc.create_text("  Hello   world ");
        doc.append_child(doc.root(), div);
        doc.append_child(div, p);
        doc.append_child(p, text);
        (doc, div, p, text)
    }

    #[test]
    fn lowercases_tag_names() {
        let (doc, div, _, _) = sample();
        assert_eq!(doc.tag_name(div), Some("div"));
    }

    #[test]
    fn inner_text_collapses_whitespace() {
        let (doc, div, p, _) = sample();
        assert_eq!(doc.inner_text(p), "Hello world");
        assert_eq!(doc.text_content(div), "  Hello   world ");
    }

    #[test]
    fn append_child_moves_between_parents() {
        let (mut doc, div, p, _) = sample();
        let other = doc.create_element("section");
        doc.append_child(div, other);
        assert!(doc.append_child(other, p));
        assert_eq!(doc.children(div), &[other]);
        assert_eq!(doc.parent(p), Some(other));
    }

    #[test]
    fn refuses_to_create_cycles() {
        let (mut doc, div, p, _) = sample();
        assert!(!doc.append_child(p, div));
        assert_eq!(doc.parent(div), Some(doc.root()));
    }

    #[test]
    fn freed_ids_do_not_resolve() {
        let (mut doc, div, p, text) = sample();
        doc.remove_subtree(p);
        assert!(!doc.exists(p));
        assert!(!doc.exists(text));
        assert!(doc.children(div).is_empty());

        let fresh = doc.create_element("p");
        assert_ne!(fresh, p);
        assert!(doc.kind(p).is_none());
    }

    #[test]
    fn class_list_dedups_and_add_class_appends() {
        let (mut doc, div, _, _) = sample();
        doc.set_attribute(div, "class", "card  wide card");
        assert_eq!(doc.class_list(div), vec!["card", "wide"]);
        doc.add_class(div, "wide");
        doc.add_class(div, "active");
        assert_eq!(doc.get_attribute(div, "class"), Some("card wide active"));
    }

    #[test]
    fn style_properties_rewrite_attribute() {
        let (mut doc, div, _, _) = sample();
        doc.set_style_property(div, "color", "red");
        doc.set_style_property(div, "margin", "0");
        assert_eq!(doc.get_attribute(div, "style"), Some("color: red; margin: 0;"));
        doc.set_style_property(div, "color", "");
        doc.set_style_property(div, "margin", "");
        assert!(!doc.has_attribute(div, "style"));
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let (mut doc, div, _, _) = sample();
        doc.set_attribute(div, "id", "a");
        doc.set_attribute(div, "title", "t");
        doc.set_attribute(div, "ID", "b");
        assert_eq!(
            doc.attributes(div),
            &[
                ("id".to_owned(), "b".to_owned()),
                ("title".to_owned(), "t".to_owned())
            ]
        );
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let (mut doc, div, p, text) = sample();
        let span = doc.create_element("span");
        doc.append_child(div, span);
        let order: Vec<_> = doc.descendants(div).collect();
        assert_eq!(order, vec![div, p, text, span]);
    }

    #[test]
    fn find_with_attribute_skips_scope() {
        let (mut doc, div, p, _) = sample();
        doc.set_attribute(div, "data-flag", "true");
        doc.set_attribute(p, "data-flag", "true");
        assert_eq!(doc.find_with_attribute(div, "data-flag"), Some(p));
    }

    #[test]
    fn replace_children_frees_previous_nodes() {
        let (mut doc, div, p, _) = sample();
        let fresh = doc.create_element("ul");
        doc.replace_children(div, &[fresh]);
        assert!(!doc.exists(p));
        assert_eq!(doc.children(div), &[fresh]);
        assert!(matches!(doc.kind(fresh), Some(NodeKind::Element(_))));
    }
}

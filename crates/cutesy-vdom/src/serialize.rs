use cutesy_core::attr;
use cutesy_css::StyleDeclaration;
use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_dom::NodeKind;
use cutesy_tree::TreeNode;

/// Converts a rendered node into a tree node.
///
/// Whitespace-only text and non-element, non-text nodes yield `None`. Elements without
/// child elements collapse to a leaf whose `content` is their visible text.
pub fn serialize_node(document: &Document, id: NodeId) -> Option<TreeNode> {
    match document.kind(id)? {
        NodeKind::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(TreeNode::text(trimmed))
            }
        }
        NodeKind::Element(element) => {
            let mut node = TreeNode::element(element.tag_name.clone());
            for (name, value) in &element.attributes {
                match name.as_str() {
                    "style" => {
                        for (property, value) in StyleDeclaration::parse(value).iter() {
                            node.styles.insert(property.to_owned(), value.to_owned());
                        }
                    }
                    "class" => {
                        for class_name in value.split_whitespace() {
                            node.class_list.insert(class_name.to_owned());
                        }
                    }
                    _ if attr::is_reserved(name) => {}
                    _ => {
                        node.attributes.insert(name.clone(), value.clone());
                    }
                }
            }

            if document.child_element_count(id) == 0 {
                node.content = document.inner_text(id);
                return Some(node);
            }

            node.children = document
                .children(id)
                .iter()
                .filter_map(|child| serialize_node(document, *child))
                .collect();
            Some(node)
        }
        NodeKind::Document => None,
    }
}

#[cfg(test)]
mod tests {
    use super::serialize_node;
    use cutesy_dom::Document;
    use cutesy_html::HtmlParser;
    use cutesy_tree::TreeNode;
    use pretty_assertions::assert_eq;

    fn first(markup: &str) -> (Document, cutesy_dom::NodeId) {
        let doc = HtmlParser.parse_document(markup);
        let Some(node) = doc.children(doc.root()).first().copied() else {
            unreachable!("markup has a top-level node");
        };
        (doc, node)
    }

    #[test]
    fn expands_style_and_class_attributes() {
        let (doc, node) = first(
            r#"<p id="intro" class="lead wide lead" style="color: red; MARGIN: 0">Hi</p>"#,
        );
        let expected = TreeNode::element("p")
            .with_attribute("id", "intro")
            .with_style("color", "red")
            .with_style("margin", "0")
            .with_class("lead")
            .with_class("wide")
            .with_content("Hi");
        assert_eq!(serialize_node(&doc, node), Some(expected));
    }

    #[test]
    fn skips_reserved_attributes() {
        let (doc, node) = first(
            r#"<div data-cutesy-path="/children/0" data-cutesy-selected="true" data-role="x"></div>"#,
        );
        let Some(tree) = serialize_node(&doc, node) else {
            unreachable!();
        };
        assert_eq!(tree.attributes.len(), 1);
        assert_eq!(tree.attributes.get("data-role").map(String::as_str), Some("x"));
    }

    #[test]
    fn whitespace_text_is_omitted() {
        let (doc, node) = first("   \n\t ");
        assert_eq!(serialize_node(&doc, node), None);
        assert_eq!(serialize_node(&doc, doc.root()), None);
    }

    #[test]
    fn mixed_content_keeps_trimmed_text_children() {
        let (doc, node) = first("<div>\n  lead <b>bold</b>\n  <i> </i>\n</div>");
        let expected = TreeNode::element("div")
            .with_child(TreeNode::text("lead"))
            .with_child(TreeNode::element("b").with_content("bold"))
            .with_child(TreeNode::element("i"));
        assert_eq!(serialize_node(&doc, node), Some(expected));
    }

    #[test]
    fn leaf_content_is_visible_text() {
        let (doc, node) = first("<p>  Hello \n  <!-- note -->  world </p>");
        let Some(tree) = serialize_node(&doc, node) else {
            unreachable!();
        };
        assert_eq!(tree.content, "Hello world");
        assert!(tree.children.is_empty());
    }

    #[test]
    fn serialization_is_idempotent() {
        let (doc, node) = first(r#"<ul class="a"><li>1</li><li style="color: blue">2</li></ul>"#);
        assert_eq!(serialize_node(&doc, node), serialize_node(&doc, node));
    }
}

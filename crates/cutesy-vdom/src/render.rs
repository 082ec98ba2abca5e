use cutesy_core::attr;
use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_html::append_html;
use cutesy_html::escape_text;
use cutesy_tree::NodePath;
use cutesy_tree::TreeNode;
use tracing::debug;
use tracing::trace;

use crate::component::ComponentRegistry;
use crate::component::NodeRef;

/// Builds detached rendered nodes for `data` inside `document`.
///
/// With a `path`, every produced node below the root is marked draggable and tagged with
/// its address, and component renderings record the component name. Without one the
/// output is plain markup suitable for export.
pub fn render_node(
    document: &mut Document,
    data: &TreeNode,
    registry: &ComponentRegistry,
    path: Option<&NodePath>,
) -> NodeId {
    if data.is_text() {
        return document.create_text(&data.content);
    }

    let element = document.create_element(&data.tag_name);
    for (name, value) in &data.attributes {
        document.set_attribute(element, name, value);
    }
    for (property, value) in &data.styles {
        document.set_style_property(element, property, value);
    }
    for class_name in &data.class_list {
        document.add_class(element, class_name);
    }
    document.append_text(element, &data.content);

    for (index, child) in data.children.iter().enumerate() {
        if child.is_text() {
            append_html(document, element, &escape_text(&child.content));
            continue;
        }

        let child_path = path.map(|path| path.child(index));
        let rendered = render_child(document, child, registry, child_path.as_ref());
        if !document.append_child(element, rendered) {
            debug!(index, "rendered child could not be attached");
            document.remove_subtree(rendered);
        }
    }

    if let Some(path) = path.filter(|path| !path.is_root()) {
        mark_tracked(document, element, path);
    }
    element
}

fn render_child(
    document: &mut Document,
    data: &TreeNode,
    registry: &ComponentRegistry,
    path: Option<&NodePath>,
) -> NodeId {
    let default = render_node(document, data, registry, path);
    let Some(component) = registry.identify(data, NodeRef::new(document, default)) else {
        return default;
    };

    let mut recurse =
        |document: &mut Document, node: &TreeNode| render_node(document, node, registry, path);
    let custom = component.render(document, data, default, &mut recurse);
    debug!(component = component.name(), "component rendered node");

    if custom != default
        && document.exists(default)
        && document.parent(default).is_none()
        && !document.contains(custom, default)
    {
        trace!("freeing unused default rendering");
        document.remove_subtree(default);
    }

    if let Some(path) = path {
        if !component.name().is_empty() {
            document.set_attribute(custom, attr::COMPONENT_TYPE, component.name());
        }
        mark_tracked(document, custom, path);
    }
    custom
}

fn mark_tracked(document: &mut Document, node: NodeId, path: &NodePath) {
    document.set_attribute(node, attr::DRAGGABLE, attr::MARKER_VALUE);
    document.set_attribute(node, attr::PATH, &path.to_string());
}

#[cfg(test)]
mod tests {
    use super::render_node;
    use crate::component::Component;
    use crate::component::ComponentRegistry;
    use crate::component::NodeRef;
    use crate::component::RenderChild;
    use crate::serialize::serialize_node;
    use cutesy_core::attr;
    use cutesy_dom::Document;
    use cutesy_dom::NodeId;
    use cutesy_html::HtmlParser;
    use cutesy_html::outer_html;
    use cutesy_tree::NodePath;
    use cutesy_tree::TreeNode;
    use pretty_assertions::assert_eq;

    /// Wraps list items in a `<figure>` and renders their children through the callback.
    struct Framed(&'static str);

    impl Component for Framed {
        fn name(&self) -> &str {
            self.0
        }

        fn identify(&self, data: &TreeNode, _rendered: NodeRef<'_>) -> bool {
            data.tag_name == "li"
        }

        fn render(
            &self,
            document: &mut Document,
            data: &TreeNode,
            _rendered: NodeId,
            render_child: &mut RenderChild<'_>,
        ) -> NodeId {
            let figure = document.create_element("figure");
            document.set_attribute(figure, "data-frame", self.0);
            for child in &data.children {
                let node = render_child(document, child);
                document.append_child(figure, node);
            }
            document.append_text(figure, &data.content);
            figure
        }
    }

    fn sample_tree() -> TreeNode {
        TreeNode::element("div")
            .with_child(
                TreeNode::element("p")
                    .with_attribute("title", "greeting")
                    .with_style("color", "red")
                    .with_class("lead")
                    .with_content("Hello"),
            )
            .with_child(
                TreeNode::element("ul")
                    .with_child(TreeNode::element("li").with_content("one"))
                    .with_child(TreeNode::element("li").with_content("two")),
            )
    }

    #[test]
    fn untracked_render_is_plain_markup() {
        let mut doc = Document::new();
        let node = render_node(&mut doc, &sample_tree(), &ComponentRegistry::new(), None);
        assert_eq!(
            outer_html(&doc, node),
            r#"<div><p title="greeting" style="color: red;" class="lead">Hello</p><ul><li>one</li><li>two</li></ul></div>"#
        );
    }

    #[test]
    fn tracked_render_tags_everything_but_the_root() {
        let mut doc = Document::new();
        let root = render_node(
            &mut doc,
            &sample_tree(),
            &ComponentRegistry::new(),
            Some(&NodePath::root()),
        );
        assert!(!doc.has_attribute(root, attr::PATH));
        assert!(!doc.has_attribute(root, attr::DRAGGABLE));

        let paths: Vec<_> = doc
            .all_with_attribute(root, attr::PATH)
            .into_iter()
            .filter_map(|node| doc.get_attribute(node, attr::PATH).map(str::to_owned))
            .collect();
        assert_eq!(
            paths,
            vec![
                "/children/0",
                "/children/1",
                "/children/1/children/0",
                "/children/1/children/1",
            ]
        );
        for node in doc.all_with_attribute(root, attr::PATH) {
            assert_eq!(doc.get_attribute(node, attr::DRAGGABLE), Some("true"));
        }
    }

    #[test]
    fn round_trips_through_serializer() {
        let source = r#"<section id="s"><h1 class="title">Heading</h1><div style="margin: 0;"><p>a</p>tail<span>b</span></div></section>"#;
        let parsed = HtmlParser.parse_document(source);
        let Some(section) = parsed.first_element_child(parsed.root()) else {
            unreachable!();
        };
        let Some(tree) = serialize_node(&parsed, section) else {
            unreachable!();
        };

        let mut doc = Document::new();
        let rendered = render_node(&mut doc, &tree, &ComponentRegistry::new(), None);
        assert_eq!(outer_html(&doc, rendered), source);
        assert_eq!(serialize_node(&doc, rendered), Some(tree));
    }

    #[test]
    fn first_registered_component_renders() {
        let registry = ComponentRegistry::new()
            .with(Framed("first"))
            .with(Framed("second"));
        let mut doc = Document::new();
        let root = render_node(&mut doc, &sample_tree(), &registry, Some(&NodePath::root()));

        let frames = doc.all_with_attribute(root, "data-frame");
        assert_eq!(frames.len(), 2);
        for (index, frame) in frames.into_iter().enumerate() {
            assert_eq!(doc.get_attribute(frame, "data-frame"), Some("first"));
            assert_eq!(doc.get_attribute(frame, attr::COMPONENT_TYPE), Some("first"));
            let expected = format!("/children/1/children/{index}");
            assert_eq!(doc.get_attribute(frame, attr::PATH), Some(expected.as_str()));
        }
        assert_eq!(doc.all_with_attribute(root, attr::COMPONENT_TYPE).len(), 2);
    }

    #[test]
    fn replaced_default_renderings_are_freed() {
        let registry = ComponentRegistry::new().with(Framed("frame"));
        let mut doc = Document::new();
        let before = doc.node_count();
        let root = render_node(&mut doc, &sample_tree(), &registry, None);

        let live = doc.descendants(root).count();
        assert_eq!(doc.node_count() - before, live);
        assert!(!doc.has_attribute(root, attr::COMPONENT_TYPE));
    }

    #[test]
    fn text_children_stay_text() {
        let tree = TreeNode::element("p")
            .with_child(TreeNode::text("a <b>bold</b> & move"))
            .with_child(TreeNode::element("i").with_content("x"));
        let mut doc = Document::new();
        let node = render_node(&mut doc, &tree, &ComponentRegistry::new(), None);
        assert_eq!(
            outer_html(&doc, node),
            "<p>a &lt;b&gt;bold&lt;/b&gt; &amp; move<i>x</i></p>"
        );
        assert_eq!(doc.child_element_count(node), 1);
    }

    #[test]
    fn escaped_text_round_trips() {
        for source in [
            "<div>&lt;i&gt;x<p>y</p></div>",
            "<div>fish &amp; chips<p>y</p></div>",
        ] {
            let parsed = HtmlParser.parse_document(source);
            let Some(div) = parsed.first_element_child(parsed.root()) else {
                unreachable!();
            };
            let Some(tree) = serialize_node(&parsed, div) else {
                unreachable!();
            };

            let mut doc = Document::new();
            let rendered = render_node(&mut doc, &tree, &ComponentRegistry::new(), None);
            assert_eq!(outer_html(&doc, rendered), source);
            assert_eq!(serialize_node(&doc, rendered), Some(tree));
        }
    }

    #[test]
    fn rendering_does_not_touch_input() {
        let tree = sample_tree();
        let snapshot = tree.clone();
        let mut doc = Document::new();
        render_node(&mut doc, &tree, &ComponentRegistry::new(), Some(&NodePath::root()));
        assert_eq!(tree, snapshot);
    }
}

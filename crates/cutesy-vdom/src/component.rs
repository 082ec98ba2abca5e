use std::fmt;
use std::rc::Rc;

use cutesy_core::attr;
use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_tree::TreeNode;
use futures::future::LocalBoxFuture;

/// Deferred yes/no answer from an optional component hook.
pub type HookFuture = LocalBoxFuture<'static, bool>;

/// Callback rendering a descendant through the same registry at the child's path.
pub type RenderChild<'a> = dyn FnMut(&mut Document, &TreeNode) -> NodeId + 'a;

/// Wraps an immediate hook answer.
pub fn ready(answer: bool) -> HookFuture {
    Box::pin(futures::future::ready(answer))
}

/// Read-only handle to one node of a document.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub document: &'a Document,
    pub id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn new(document: &'a Document, id: NodeId) -> Self {
        Self { document, id }
    }

    pub fn tag_name(&self) -> Option<&'a str> {
        self.document.tag_name(self.id)
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.document.get_attribute(self.id, name)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("tag_name", &self.tag_name())
            .finish()
    }
}

/// Pluggable override consulted while rendering a tree.
///
/// `identify` decides applicability and `render` replaces the default rendering. The
/// optional hooks return `None` when the component does not expose that capability.
pub trait Component {
    fn name(&self) -> &str;

    fn identify(&self, data: &TreeNode, rendered: NodeRef<'_>) -> bool;

    /// Produces the node appended in place of `rendered`.
    ///
    /// Returning `rendered` itself (possibly modified) keeps the default rendering.
    fn render(
        &self,
        document: &mut Document,
        data: &TreeNode,
        rendered: NodeId,
        render_child: &mut RenderChild<'_>,
    ) -> NodeId;

    /// Gate for inserting new content this component identifies.
    fn on_create(&self, _data: &TreeNode, _node: NodeRef<'_>) -> Option<HookFuture> {
        None
    }

    /// Gate for selecting a node this component rendered.
    fn on_select(&self, _data: &TreeNode, _node: NodeRef<'_>) -> Option<HookFuture> {
        None
    }

    /// Gate for accepting `source` as a drop onto `target`.
    fn can_drop(&self, _source: NodeRef<'_>, _target: NodeRef<'_>) -> Option<HookFuture> {
        None
    }
}

/// Ordered component list; the first registered match wins.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<Rc<dyn Component>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.components.iter().map(|component| component.name()))
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: impl Component + 'static) {
        self.components.push(Rc::new(component));
    }

    pub fn register_shared(&mut self, component: Rc<dyn Component>) {
        self.components.push(component);
    }

    pub fn with(mut self, component: impl Component + 'static) -> Self {
        self.register(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Component>> {
        self.components.iter()
    }

    /// First component, in registration order, whose `identify` accepts the node.
    pub fn identify(&self, data: &TreeNode, rendered: NodeRef<'_>) -> Option<&Rc<dyn Component>> {
        self.components
            .iter()
            .find(|component| component.identify(data, rendered))
    }

    pub fn by_name(&self, name: &str) -> Option<&Rc<dyn Component>> {
        self.components
            .iter()
            .find(|component| component.name() == name)
    }

    /// Component recorded on the node's component-type marker, if registered.
    pub fn governing(&self, document: &Document, node: NodeId) -> Option<&Rc<dyn Component>> {
        let name = document.get_attribute(node, attr::COMPONENT_TYPE)?;
        self.by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::Component;
    use super::ComponentRegistry;
    use super::HookFuture;
    use super::NodeRef;
    use super::RenderChild;
    use super::ready;
    use cutesy_core::attr;
    use cutesy_dom::Document;
    use cutesy_dom::NodeId;
    use cutesy_tree::TreeNode;
    use futures::executor::block_on;

    struct ByTag(&'static str, &'static str);

    impl Component for ByTag {
        fn name(&self) -> &str {
            self.0
        }

        fn identify(&self, data: &TreeNode, _rendered: NodeRef<'_>) -> bool {
            data.tag_name == self.1
        }

        fn render(
            &self,
            _document: &mut Document,
            _data: &TreeNode,
            rendered: NodeId,
            _render_child: &mut RenderChild<'_>,
        ) -> NodeId {
            rendered
        }

        fn can_drop(&self, _source: NodeRef<'_>, target: NodeRef<'_>) -> Option<HookFuture> {
            Some(ready(target.tag_name() == Some("ul")))
        }
    }

    #[test]
    fn identify_returns_first_registered_match() {
        let registry = ComponentRegistry::new()
            .with(ByTag("first", "p"))
            .with(ByTag("second", "p"));
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let found = registry.identify(&TreeNode::element("p"), NodeRef::new(&doc, p));
        assert_eq!(found.map(|component| component.name()), Some("first"));
        assert!(
            registry
                .identify(&TreeNode::element("div"), NodeRef::new(&doc, p))
                .is_none()
        );
    }

    #[test]
    fn governing_reads_component_type_marker() {
        let registry = ComponentRegistry::new().with(ByTag("list", "ul"));
        let mut doc = Document::new();
        let ul = doc.create_element("ul");
        assert!(registry.governing(&doc, ul).is_none());

        doc.set_attribute(ul, attr::COMPONENT_TYPE, "list");
        let Some(component) = registry.governing(&doc, ul) else {
            unreachable!("marker names a registered component");
        };
        let Some(answer) = component.can_drop(NodeRef::new(&doc, ul), NodeRef::new(&doc, ul))
        else {
            unreachable!("can_drop is exposed");
        };
        assert!(block_on(answer));
        assert!(component.on_select(&TreeNode::element("ul"), NodeRef::new(&doc, ul)).is_none());
    }

    #[test]
    fn debug_lists_component_names() {
        let registry = ComponentRegistry::new()
            .with(ByTag("a", "p"))
            .with(ByTag("b", "ul"));
        assert_eq!(format!("{registry:?}"), r#"["a", "b"]"#);
    }
}

//! Drag/drop tree editor bound to one element of a [`Document`].
//!
//! [`initialize`] serializes the element's content into a tree, stores it in a state
//! container and re-renders the element whenever the stored tree changes. Host events are
//! delivered through [`Editor::dispatch`]; drops compute the next tree value and commit it
//! once, leaving re-rendering to the store notification.

mod options;
mod protocol;
mod throttle;
mod transfer;

use std::cell::RefCell;
use std::cell::RefMut;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use cutesy_core::EditorError;
use cutesy_core::EditorResult;
use cutesy_core::attr;
use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_dom::Selector;
use cutesy_html::outer_html;
use cutesy_store::MemoryStore;
use cutesy_store::StateContainer;
use cutesy_store::Subscriber;
use cutesy_store::SubscriptionId;
use cutesy_tree::NodePath;
use cutesy_tree::TreeNode;
use cutesy_vdom::ComponentRegistry;
use cutesy_vdom::NodeRef;
use cutesy_vdom::render_node;
use cutesy_vdom::serialize_node;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

pub use options::DEFAULT_HOVER_INTERVAL;
pub use options::DEFAULT_STORE_KEY;
pub use options::EditorOptions;
pub use protocol::DragState;
pub use protocol::Rejection;
pub use protocol::plan_insert;
pub use protocol::plan_move;
pub use throttle::Throttle;
pub use transfer::DataTransfer;
pub use transfer::palette_payload;

/// Host event delivered to the editor's delegated listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    DragStart { target: NodeId },
    DragEnter { target: NodeId },
    DragLeave { target: NodeId },
    DragOver { target: NodeId, transfer: DataTransfer },
    Drop { target: NodeId, transfer: DataTransfer },
    Click { target: NodeId },
}

impl EditorEvent {
    pub fn target(&self) -> NodeId {
        match self {
            Self::DragStart { target }
            | Self::DragEnter { target }
            | Self::DragLeave { target }
            | Self::DragOver { target, .. }
            | Self::Drop { target, .. }
            | Self::Click { target } => *target,
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Outside the editor, stale, or nothing to act on.
    Ignored,
    /// Payload the host should carry for the rest of the drag.
    Transfer(DataTransfer),
    Marked,
    Cleared,
    Throttled,
    Rejected(Rejection),
    Committed { path: NodePath },
    Selected,
}

/// Handle returned by [`initialize`].
pub struct Editor<S: StateContainer = MemoryStore> {
    document: Rc<RefCell<Document>>,
    root: NodeId,
    store: Rc<RefCell<S>>,
    registry: ComponentRegistry,
    pointer: String,
    throttle: Throttle,
    state: DragState,
    subscription: Option<SubscriptionId>,
}

impl<S: StateContainer> fmt::Debug for Editor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("root", &self.root)
            .field("pointer", &self.pointer)
            .field("registry", &self.registry)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Binds an editor to the first element matching `selector`, backed by a [`MemoryStore`].
pub fn initialize(
    document: Rc<RefCell<Document>>,
    selector: &str,
    options: EditorOptions,
) -> EditorResult<Editor<MemoryStore>> {
    initialize_with_store(document, selector, options, MemoryStore::default())
}

/// Binds an editor using a caller-provided state container.
#[instrument(level = "debug", skip(document, options, store))]
pub fn initialize_with_store<S: StateContainer>(
    document: Rc<RefCell<Document>>,
    selector: &str,
    options: EditorOptions,
    store: S,
) -> EditorResult<Editor<S>> {
    options.validate()?;
    let parsed = Selector::parse(selector).ok_or_else(|| {
        EditorError::new(
            "editor.selector_invalid",
            format!("unsupported selector `{selector}`"),
        )
    })?;
    let registry = options.custom_components.clone();
    let pointer = options.store_pointer();

    let (root, tree) = {
        let mut doc = document.try_borrow_mut().map_err(|_| {
            EditorError::new("editor.document_busy", "document is borrowed elsewhere")
        })?;
        let root = doc.query_selector(doc.root(), &parsed).ok_or_else(|| {
            EditorError::new(
                "editor.target_missing",
                format!("no element matches `{selector}`"),
            )
        })?;

        wrap_content(&mut doc, root);
        let tree = doc
            .first_element_child(root)
            .and_then(|first| serialize_node(&doc, first))
            .ok_or_else(|| {
                EditorError::new(
                    "editor.content_missing",
                    format!("`{selector}` has no element content to edit"),
                )
            })?;
        mount(&mut doc, root, &tree, &registry);

        let document_root = doc.root();
        for item in doc.all_with_attribute(document_root, attr::PALETTE_ITEM) {
            doc.set_attribute(item, attr::DRAGGABLE, attr::MARKER_VALUE);
        }
        (root, tree)
    };

    let store = Rc::new(RefCell::new(store));
    let subscription = {
        let mut container = store.try_borrow_mut().map_err(|_| {
            EditorError::new("editor.store_busy", "state container is borrowed elsewhere")
        })?;
        container.commit(&pointer, tree.to_value()?)?;
        container.subscribe(
            &pointer,
            rerender_on_change(Rc::clone(&document), root, registry.clone()),
        )?
    };
    debug!(%pointer, components = registry.len(), "editor initialized");

    Ok(Editor {
        document,
        root,
        store,
        registry,
        pointer,
        throttle: Throttle::new(options.hover_interval),
        state: DragState::Idle,
        subscription: Some(subscription),
    })
}

impl<S: StateContainer> Editor<S> {
    /// Current tree exported as plain markup, without drag affordances.
    pub fn value(&self) -> EditorResult<String> {
        let tree = self.tree()?;
        let mut scratch = Document::new();
        let node = render_node(&mut scratch, &tree, &self.registry, None);
        Ok(outer_html(&scratch, node))
    }

    pub fn tree(&self) -> EditorResult<TreeNode> {
        let store = self.store.try_borrow().map_err(|_| {
            EditorError::new("editor.store_busy", "state container is borrowed elsewhere")
        })?;
        let value = store.retrieve(&self.pointer).ok_or_else(|| {
            EditorError::new(
                "editor.value_missing",
                format!("state container holds nothing at `{}`", self.pointer),
            )
        })?;
        TreeNode::from_value(value)
    }

    pub fn store(&self) -> Rc<RefCell<S>> {
        Rc::clone(&self.store)
    }

    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.document)
    }

    /// The element the editor is bound to.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Pointer of the tree inside the state container.
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// Rendered node currently tagged with `path`, if any.
    pub fn node_for_path(&self, path: &NodePath) -> Option<NodeId> {
        let doc = self.document.try_borrow().ok()?;
        if path.is_root() {
            return doc.first_element_child(self.root);
        }
        let wanted = path.to_string();
        doc.descendants(self.root)
            .find(|node| doc.get_attribute(*node, attr::PATH) == Some(wanted.as_str()))
    }

    pub async fn dispatch(&mut self, event: EditorEvent) -> EventOutcome {
        match event {
            EditorEvent::DragStart { target } => self.drag_start(target),
            EditorEvent::DragEnter { target } => self.drag_enter(target),
            EditorEvent::DragLeave { target } => self.drag_leave(target),
            EditorEvent::DragOver { target, transfer } => self.drag_over(target, &transfer).await,
            EditorEvent::Drop { target, transfer } => self.drop_on(target, &transfer).await,
            EditorEvent::Click { target } => self.click(target).await,
        }
    }

    /// Captures the markup of the dragged node, or the template of a palette item.
    #[instrument(level = "debug", skip(self))]
    pub fn drag_start(&mut self, target: NodeId) -> EventOutcome {
        let Some(doc) = borrow_document(&self.document) else {
            return EventOutcome::Ignored;
        };

        let payload = match scoped_target(&doc, self.root, target) {
            Some(element) => Some(outer_html(&doc, element)),
            None => transfer::palette_item(&doc, target)
                .and_then(|item| transfer::palette_payload(&doc, item)),
        };
        let Some(payload) = payload else {
            return EventOutcome::Ignored;
        };

        self.state = DragState::Dragging;
        self.throttle.reset();
        EventOutcome::Transfer(DataTransfer::with_text(payload))
    }

    pub fn drag_enter(&mut self, target: NodeId) -> EventOutcome {
        let Some(mut doc) = borrow_document(&self.document) else {
            return EventOutcome::Ignored;
        };
        let Some(target) = scoped_target(&doc, self.root, target) else {
            return EventOutcome::Ignored;
        };
        doc.set_attribute(target, attr::DRAG, attr::MARKER_VALUE);
        EventOutcome::Marked
    }

    pub fn drag_leave(&mut self, target: NodeId) -> EventOutcome {
        let Some(mut doc) = borrow_document(&self.document) else {
            return EventOutcome::Ignored;
        };
        let Some(target) = scoped_target(&doc, self.root, target) else {
            return EventOutcome::Ignored;
        };
        doc.remove_attribute(target, attr::DRAG);
        EventOutcome::Cleared
    }

    pub async fn drag_over(&mut self, target: NodeId, transfer: &DataTransfer) -> EventOutcome {
        self.drag_over_at(target, transfer, Instant::now()).await
    }

    /// Hover handling with an explicit clock reading for the throttle.
    #[instrument(level = "trace", skip(self, transfer))]
    pub async fn drag_over_at(
        &mut self,
        target: NodeId,
        transfer: &DataTransfer,
        now: Instant,
    ) -> EventOutcome {
        let (target, pending) = {
            let Some(mut doc) = borrow_document(&self.document) else {
                return EventOutcome::Ignored;
            };
            let Some(target) = scoped_target(&doc, self.root, target) else {
                return EventOutcome::Ignored;
            };
            if !self.throttle.admit_at(now) {
                trace!("hover throttled");
                return EventOutcome::Throttled;
            }
            self.state = DragState::Hovering { target };
            clear_marker_except(&mut doc, self.root, attr::DROP_HOVERED, Some(target));

            let Some(component) = self.registry.governing(&doc, target) else {
                doc.set_attribute(target, attr::DROP_HOVERED, attr::MARKER_VALUE);
                return EventOutcome::Marked;
            };

            let mut scratch = Document::new();
            let Some(source) = transfer.payload_element(&mut scratch) else {
                debug!("hover payload carries no element");
                return EventOutcome::Rejected(Rejection::PayloadMissing);
            };
            match component.can_drop(NodeRef::new(&scratch, source), NodeRef::new(&doc, target)) {
                Some(pending) => (target, pending),
                None => {
                    doc.set_attribute(target, attr::DROP_HOVERED, attr::MARKER_VALUE);
                    return EventOutcome::Marked;
                }
            }
        };

        let accepted = pending.await;

        let Some(mut doc) = borrow_document(&self.document) else {
            return EventOutcome::Ignored;
        };
        if scoped_target(&doc, self.root, target) != Some(target) {
            debug!("hover target left the editor while can_drop was pending");
            return EventOutcome::Rejected(Rejection::TargetDetached);
        }
        if !accepted {
            debug!("can_drop declined hover target");
            return EventOutcome::Rejected(Rejection::HookDeclined);
        }
        clear_marker_except(&mut doc, self.root, attr::DROP_HOVERED, Some(target));
        doc.set_attribute(target, attr::DROP_HOVERED, attr::MARKER_VALUE);
        EventOutcome::Marked
    }

    /// Selects the clicked node unless its component's `on_select` declines.
    #[instrument(level = "debug", skip(self))]
    pub async fn click(&mut self, target: NodeId) -> EventOutcome {
        let (target, pending) = {
            let Some(mut doc) = borrow_document(&self.document) else {
                return EventOutcome::Ignored;
            };
            let Some(target) = scoped_target(&doc, self.root, target) else {
                return EventOutcome::Ignored;
            };
            let pending = self.registry.governing(&doc, target).and_then(|component| {
                let data = serialize_node(&doc, target)?;
                component.on_select(&data, NodeRef::new(&doc, target))
            });
            match pending {
                Some(pending) => (target, pending),
                None => {
                    clear_marker_except(&mut doc, self.root, attr::SELECTED, Some(target));
                    doc.set_attribute(target, attr::SELECTED, attr::MARKER_VALUE);
                    return EventOutcome::Selected;
                }
            }
        };

        let accepted = pending.await;

        let Some(mut doc) = borrow_document(&self.document) else {
            return EventOutcome::Ignored;
        };
        if scoped_target(&doc, self.root, target) != Some(target) {
            return EventOutcome::Rejected(Rejection::TargetDetached);
        }
        if !accepted {
            debug!("on_select declined selection");
            return EventOutcome::Rejected(Rejection::HookDeclined);
        }
        clear_marker_except(&mut doc, self.root, attr::SELECTED, Some(target));
        doc.set_attribute(target, attr::SELECTED, attr::MARKER_VALUE);
        EventOutcome::Selected
    }

    /// Moves an existing node or inserts new content, committing the result once.
    #[instrument(level = "debug", skip(self, transfer))]
    pub async fn drop_on(&mut self, target: NodeId, transfer: &DataTransfer) -> EventOutcome {
        self.state = DragState::Dropped;
        let outcome = self.resolve_drop(target, transfer).await;
        self.state = DragState::Idle;
        outcome
    }

    async fn resolve_drop(&mut self, target: NodeId, transfer: &DataTransfer) -> EventOutcome {
        let target_path = {
            let Some(mut doc) = borrow_document(&self.document) else {
                return EventOutcome::Ignored;
            };
            let Some(target) = scoped_target(&doc, self.root, target) else {
                return EventOutcome::Ignored;
            };
            clear_marker_except(&mut doc, self.root, attr::DROP_HOVERED, None);
            clear_marker_except(&mut doc, self.root, attr::DRAG, None);
            doc.get_attribute(target, attr::PATH)
                .filter(|path| !path.is_empty())
                .map(str::to_owned)
        };

        let mut scratch = Document::new();
        let Some(dropped) = transfer.payload_element(&mut scratch) else {
            debug!("drop payload carries no element");
            return EventOutcome::Ignored;
        };

        let source_path = scratch
            .get_attribute(dropped, attr::PATH)
            .filter(|path| !path.is_empty())
            .map(str::to_owned);
        match source_path {
            Some(source) => self.move_node(&source, target_path.as_deref()),
            None => {
                self.insert_content(&scratch, dropped, target_path.as_deref())
                    .await
            }
        }
    }

    fn move_node(&mut self, source: &str, target: Option<&str>) -> EventOutcome {
        let parsed_target = target.map(|raw| raw.parse::<NodePath>()).transpose();
        let (source, target) = match (source.parse::<NodePath>(), parsed_target) {
            (Ok(source), Ok(target)) => (source, target.unwrap_or_default()),
            (Err(error), _) | (_, Err(error)) => {
                debug!(%error, "malformed path on drop");
                return EventOutcome::Rejected(Rejection::MalformedPath);
            }
        };

        let tree = match self.tree_at(&self.pointer) {
            Ok(tree) => tree,
            Err(rejection) => return EventOutcome::Rejected(rejection),
        };
        let (next, path) = match plan_move(&tree, &source, &target) {
            Ok(plan) => plan,
            Err(rejection) => {
                debug!(%source, %target, %rejection, "move rejected");
                return EventOutcome::Rejected(rejection);
            }
        };

        match self.commit_tree(&self.pointer, &next) {
            Ok(()) => {
                debug!(%source, %path, "node moved");
                EventOutcome::Committed { path }
            }
            Err(rejection) => EventOutcome::Rejected(rejection),
        }
    }

    async fn insert_content(
        &mut self,
        scratch: &Document,
        dropped: NodeId,
        target: Option<&str>,
    ) -> EventOutcome {
        let Some(raw) = target else {
            debug!("new content dropped on a target without a path");
            return EventOutcome::Ignored;
        };
        let target = match raw.parse::<NodePath>() {
            Ok(path) => path,
            Err(error) => {
                debug!(%error, "malformed target path on drop");
                return EventOutcome::Rejected(Rejection::MalformedPath);
            }
        };
        let Some(content) = serialize_node(scratch, dropped) else {
            return EventOutcome::Ignored;
        };

        let pending = self
            .registry
            .identify(&content, NodeRef::new(scratch, dropped))
            .and_then(|component| component.on_create(&content, NodeRef::new(scratch, dropped)));
        if let Some(pending) = pending {
            if !pending.await {
                debug!("on_create declined new content");
                return EventOutcome::Rejected(Rejection::HookDeclined);
            }
        }

        let pointer = target.to_pointer(&self.pointer);
        let owner = match self.tree_at(&pointer) {
            Ok(owner) => owner,
            Err(rejection) => return EventOutcome::Rejected(rejection),
        };
        let (next, path) = match plan_insert(owner, &target, content) {
            Ok(plan) => plan,
            Err(rejection) => {
                debug!(%target, %rejection, "insert rejected");
                return EventOutcome::Rejected(rejection);
            }
        };

        match self.commit_tree(&pointer, &next) {
            Ok(()) => {
                debug!(%path, "content inserted");
                EventOutcome::Committed { path }
            }
            Err(rejection) => EventOutcome::Rejected(rejection),
        }
    }

    fn tree_at(&self, pointer: &str) -> Result<TreeNode, Rejection> {
        let Ok(store) = self.store.try_borrow() else {
            warn!("state container is borrowed elsewhere");
            return Err(Rejection::StoreFailed);
        };
        let Some(value) = store.retrieve(pointer) else {
            debug!(pointer, "nothing stored at drop target");
            return Err(Rejection::TargetUnresolved);
        };
        TreeNode::from_value(value).map_err(|error| {
            warn!(pointer, %error, "stored value is not a tree");
            Rejection::StoreFailed
        })
    }

    fn commit_tree(&self, pointer: &str, tree: &TreeNode) -> Result<(), Rejection> {
        let value = tree.to_value().map_err(|error| {
            warn!(%error, "tree could not be encoded");
            Rejection::StoreFailed
        })?;
        let Ok(mut store) = self.store.try_borrow_mut() else {
            warn!("state container is borrowed elsewhere");
            return Err(Rejection::StoreFailed);
        };
        store.commit(pointer, value).map_err(|error| {
            warn!(pointer, %error, "commit failed");
            Rejection::StoreFailed
        })
    }
}

impl<S: StateContainer> Drop for Editor<S> {
    fn drop(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        if let Ok(mut store) = self.store.try_borrow_mut() {
            store.unsubscribe(id);
        }
    }
}

/// Ensures the editor element holds exactly one element child to serve as the tree root.
fn wrap_content(document: &mut Document, root: NodeId) {
    if document.child_element_count(root) == 1 {
        return;
    }
    let wrapper = document.create_element("div");
    for child in document.children(root).to_vec() {
        document.append_child(wrapper, child);
    }
    document.append_child(root, wrapper);
}

/// Replaces the editor content with a tracked rendering of `tree`.
fn mount(document: &mut Document, root: NodeId, tree: &TreeNode, registry: &ComponentRegistry) {
    document.clear_children(root);
    let node = render_node(document, tree, registry, Some(&NodePath::root()));
    if !document.append_child(root, node) {
        warn!("editor element is gone, dropping rendering");
        document.remove_subtree(node);
    }
}

fn rerender_on_change(
    document: Rc<RefCell<Document>>,
    root: NodeId,
    registry: ComponentRegistry,
) -> Subscriber {
    Box::new(move |value: &Value| {
        let tree = match TreeNode::from_value(value.clone()) {
            Ok(tree) => tree,
            Err(error) => {
                warn!(%error, "committed value is not a tree, keeping current rendering");
                return;
            }
        };
        let Ok(mut doc) = document.try_borrow_mut() else {
            warn!("document is borrowed elsewhere, skipping re-render");
            return;
        };
        trace!("re-rendering editor content");
        mount(&mut doc, root, &tree, &registry);
    })
}

fn borrow_document(document: &RefCell<Document>) -> Option<RefMut<'_, Document>> {
    match document.try_borrow_mut() {
        Ok(doc) => Some(doc),
        Err(_) => {
            warn!("document is borrowed elsewhere, event dropped");
            None
        }
    }
}

/// Element an event applies to: text targets resolve to their parent, and the result
/// must sit inside the editor element.
fn scoped_target(document: &Document, root: NodeId, target: NodeId) -> Option<NodeId> {
    let element = if document.text(target).is_some() {
        document.parent(target)?
    } else {
        target
    };
    (document.is_element(element) && document.contains(root, element)).then_some(element)
}

/// Removes `name` from every holder inside the editor except `keep`.
fn clear_marker_except(document: &mut Document, root: NodeId, name: &str, keep: Option<NodeId>) {
    let holders: Vec<NodeId> = document
        .descendants(root)
        .filter(|node| Some(*node) != keep && document.has_attribute(*node, name))
        .collect();
    for holder in holders {
        document.remove_attribute(holder, name);
    }
}

#[cfg(test)]
mod tests {
    use super::EditorEvent;
    use super::scoped_target;
    use super::wrap_content;
    use cutesy_dom::Document;
    use cutesy_html::HtmlParser;
    use cutesy_html::inner_html;

    #[test]
    fn wrap_content_leaves_single_element_alone() {
        let mut doc = HtmlParser.parse_document("<main> <p>a</p> </main>");
        let Some(main) = doc.first_element_child(doc.root()) else {
            unreachable!();
        };
        wrap_content(&mut doc, main);
        assert_eq!(inner_html(&doc, main), " <p>a</p> ");
    }

    #[test]
    fn wrap_content_groups_siblings_and_bare_text() {
        let mut doc = HtmlParser.parse_document("<main><p>a</p><p>b</p></main><nav>text</nav>");
        let Some(main) = doc.first_element_child(doc.root()) else {
            unreachable!();
        };
        wrap_content(&mut doc, main);
        assert_eq!(inner_html(&doc, main), "<div><p>a</p><p>b</p></div>");

        let Some(nav) = doc.child_elements(doc.root()).nth(1) else {
            unreachable!();
        };
        wrap_content(&mut doc, nav);
        assert_eq!(inner_html(&doc, nav), "<div>text</div>");

        let empty = doc.create_element("section");
        wrap_content(&mut doc, empty);
        assert_eq!(inner_html(&doc, empty), "<div></div>");
    }

    #[test]
    fn scoped_target_resolves_text_and_rejects_outsiders() {
        let doc = HtmlParser.parse_document("<main><p>hi</p></main><aside>x</aside>");
        let Some(main) = doc.first_element_child(doc.root()) else {
            unreachable!();
        };
        let Some(p) = doc.first_element_child(main) else {
            unreachable!();
        };
        let text = doc.children(p)[0];
        let Some(aside) = doc.child_elements(doc.root()).nth(1) else {
            unreachable!();
        };

        assert_eq!(scoped_target(&doc, main, text), Some(p));
        assert_eq!(scoped_target(&doc, main, main), Some(main));
        assert_eq!(scoped_target(&doc, main, aside), None);
        assert_eq!(scoped_target(&Document::new(), main, p), None);
    }

    #[test]
    fn event_target_is_uniform() {
        let mut doc = Document::new();
        let node = doc.create_element("p");
        assert_eq!(EditorEvent::Click { target: node }.target(), node);
        assert_eq!(
            EditorEvent::Drop {
                target: node,
                transfer: super::DataTransfer::new()
            }
            .target(),
            node
        );
    }
}

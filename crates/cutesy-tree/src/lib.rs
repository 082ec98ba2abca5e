//! Serializable tree model and path addressing.
//!
//! A [`TreeNode`] is either structural (non-empty `tag_name`) or text (empty `tag_name`,
//! non-empty `content`, no children). Nodes are addressed from the root by [`NodePath`].

mod path;

use cutesy_core::EditorError;
use cutesy_core::EditorResult;
use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

pub use path::NodePath;
pub use path::PathError;

/// Serializable snapshot of one rendered node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub tag_name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub styles: IndexMap<String, String>,
    #[serde(default)]
    pub class_list: IndexSet<String>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
    #[serde(default)]
    pub content: String,
}

impl TreeNode {
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(name.into(), value.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_list.insert(class_name.into());
        self
    }

    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn is_text(&self) -> bool {
        self.tag_name.is_empty()
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&TreeNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, index| node.children.get(*index))
    }

    pub fn node_at_mut(&mut self, path: &NodePath) -> Option<&mut TreeNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, index| node.children.get_mut(*index))
    }

    /// Walks to the owner of `path` and removes the child at its final index.
    ///
    /// The root cannot be removed.
    pub fn remove_at(&mut self, path: &NodePath) -> Option<TreeNode> {
        let (parent, index) = path.parent()?;
        let Some(owner) = self.node_at_mut(&parent) else {
            trace!(%path, "remove target owner does not resolve");
            return None;
        };
        if index >= owner.children.len() {
            trace!(%path, len = owner.children.len(), "remove index out of range");
            return None;
        }
        Some(owner.children.remove(index))
    }

    /// Appends `child` beneath the node at `path` and returns the child's new path.
    ///
    /// Text nodes never receive children.
    pub fn append_at(&mut self, path: &NodePath, child: TreeNode) -> Option<NodePath> {
        let Some(owner) = self.node_at_mut(path) else {
            trace!(%path, "append target does not resolve");
            return None;
        };
        if owner.is_text() {
            trace!(%path, "append target is a text node");
            return None;
        }
        Some(path.child(owner.push_child(child)))
    }

    /// Pushes `child` and returns its index.
    ///
    /// Leaf `content` is first moved into a leading text child, so a node never carries
    /// both content and children.
    pub fn push_child(&mut self, child: TreeNode) -> usize {
        if !self.content.is_empty() {
            let content = std::mem::take(&mut self.content);
            self.children.insert(0, TreeNode::text(content));
        }
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn to_value(&self) -> EditorResult<Value> {
        serde_json::to_value(self)
            .map_err(|err| EditorError::new("tree.encode_failed", err.to_string()))
    }

    pub fn from_value(value: Value) -> EditorResult<Self> {
        serde_json::from_value(value)
            .map_err(|err| EditorError::new("tree.decode_failed", err.to_string()))
    }
}

//! Drag state machine and tree edits computed for a drop.
//!
//! Nothing here touches rendered nodes; every function returns the next tree value and
//! the address the dropped node ends up at.

use std::fmt;

use cutesy_dom::NodeId;
use cutesy_tree::NodePath;
use cutesy_tree::TreeNode;

/// Where an in-flight drag currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
    Hovering {
        target: NodeId,
    },
    Dropped,
}

impl DragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Why an interaction ended without changing the tree or the markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Target is the dragged node or lies beneath it.
    SelfDrop,
    /// A path string did not parse.
    MalformedPath,
    SourceUnresolved,
    TargetUnresolved,
    /// Text nodes cannot own children.
    TargetIsText,
    /// The payload carries no element to drop or evaluate.
    PayloadMissing,
    /// A component hook answered `false`.
    HookDeclined,
    /// The target left the editor while a hook was pending.
    TargetDetached,
    /// The store is busy, rejected the commit or holds a value that is not a tree.
    StoreFailed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::SelfDrop => "drop target is inside the dragged node",
            Self::MalformedPath => "path attribute is malformed",
            Self::SourceUnresolved => "dragged node no longer resolves",
            Self::TargetUnresolved => "drop target no longer resolves",
            Self::TargetIsText => "drop target is a text node",
            Self::PayloadMissing => "payload carries no element",
            Self::HookDeclined => "component hook declined",
            Self::TargetDetached => "target left the editor",
            Self::StoreFailed => "state container failed",
        };
        f.write_str(reason)
    }
}

/// Moves the node at `source` beneath the node at `target`.
///
/// `target` is interpreted against the tree before the removal and rebased afterwards, so
/// it keeps designating the same node when it is a later sibling of `source` (or lies
/// beneath one).
pub fn plan_move(
    tree: &TreeNode,
    source: &NodePath,
    target: &NodePath,
) -> Result<(TreeNode, NodePath), Rejection> {
    if target.starts_with(source) {
        return Err(Rejection::SelfDrop);
    }
    if tree.node_at(target).is_none() {
        return Err(Rejection::TargetUnresolved);
    }

    let mut next = tree.clone();
    let moved = next.remove_at(source).ok_or(Rejection::SourceUnresolved)?;
    let rebased = target
        .rebase_after_removal(source)
        .ok_or(Rejection::SelfDrop)?;
    if next.node_at(&rebased).is_some_and(TreeNode::is_text) {
        return Err(Rejection::TargetIsText);
    }
    let path = next
        .append_at(&rebased, moved)
        .ok_or(Rejection::TargetUnresolved)?;
    Ok((next, path))
}

/// Appends `content` to the children of `owner`, keeping every other field.
pub fn plan_insert(
    mut owner: TreeNode,
    owner_path: &NodePath,
    content: TreeNode,
) -> Result<(TreeNode, NodePath), Rejection> {
    if owner.is_text() {
        return Err(Rejection::TargetIsText);
    }
    let index = owner.push_child(content);
    let path = owner_path.child(index);
    Ok((owner, path))
}

//! Conversion between rendered nodes and tree nodes.
//!
//! [`serialize_node`] reads a rendered subtree into a [`cutesy_tree::TreeNode`];
//! [`render_node`] builds it back, consulting a [`ComponentRegistry`] for overrides.

mod component;
mod render;
mod serialize;

pub use component::Component;
pub use component::ComponentRegistry;
pub use component::HookFuture;
pub use component::NodeRef;
pub use component::RenderChild;
pub use component::ready;
pub use render::render_node;
pub use serialize::serialize_node;

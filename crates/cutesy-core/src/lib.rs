//! Shared primitives used across Cutesy crates.

use thiserror::Error;

/// Result alias used across the workspace.
pub type EditorResult<T> = Result<T, EditorError>;

/// Top-level error type carrying a stable dotted code and a human message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct EditorError {
    pub code: &'static str,
    pub message: String,
}

impl EditorError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Attribute tokens shared between the renderer and the interaction layer.
///
/// These names travel through rendered markup and drag payloads, so they are part of the
/// wire format and must stay byte-identical.
pub mod attr {
    /// Prefix for every internal bookkeeping attribute.
    pub const RESERVED_PREFIX: &str = "data-cutesy-";
    /// Address of a rendered node inside the tree.
    pub const PATH: &str = "data-cutesy-path";
    /// Current drag-over acceptance candidate.
    pub const DROP_HOVERED: &str = "data-cutesy-drop-hovered";
    /// Most recently clicked node.
    pub const SELECTED: &str = "data-cutesy-selected";
    /// Element currently being dragged over.
    pub const DRAG: &str = "data-cutesy-drag";
    /// Registry entry that rendered a node.
    pub const COMPONENT_TYPE: &str = "data-cutesy-type";
    /// Palette item that can be dragged into the editor.
    pub const PALETTE_ITEM: &str = "data-cutesy-draggable";
    /// Native attribute enabling dragging on a rendered node.
    pub const DRAGGABLE: &str = "draggable";
    /// Value written for every boolean marker.
    pub const MARKER_VALUE: &str = "true";

    pub fn is_reserved(name: &str) -> bool {
        name.starts_with(RESERVED_PREFIX)
    }
}

/// Data-transfer format used for drag payloads.
pub const TRANSFER_FORMAT: &str = "text/plain";

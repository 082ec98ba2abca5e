//! String addresses of nodes inside a tree.
//!
//! A path is a sequence of `children/<index>` pairs rooted at `/`, for example
//! `/children/0/children/2`. The root itself renders as `/` and also parses from the
//! empty string.

use std::fmt;
use std::str::FromStr;

use cutesy_core::EditorError;
use thiserror::Error;

const CHILDREN_MARKER: &str = "children";

/// Reasons a path string fails to parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path `{path}` must start with `/`")]
    MissingLeadingSlash { path: String },

    #[error("expected `children` at segment {position}, found `{segment}`")]
    UnexpectedSegment { segment: String, position: usize },

    #[error("segment `{segment}` is not a child index")]
    InvalidIndex { segment: String },

    #[error("path `{path}` ends without a child index")]
    MissingIndex { path: String },
}

impl From<PathError> for EditorError {
    fn from(error: PathError) -> Self {
        EditorError::new("tree.path_invalid", error.to_string())
    }
}

/// Position of a node relative to the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    indices: Vec<usize>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn is_root(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.indices.len() + 1);
        indices.extend_from_slice(&self.indices);
        indices.push(index);
        Self { indices }
    }

    /// Owning parent path and this node's index in the parent's children.
    pub fn parent(&self) -> Option<(Self, usize)> {
        let (last, rest) = self.indices.split_last()?;
        Some((Self::from_indices(rest), *last))
    }

    pub fn last_index(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// Segment-wise prefix test: true when `self` is `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &NodePath) -> bool {
        self.indices.starts_with(&ancestor.indices)
    }

    /// Re-addresses `self` after the node at `removed` was taken out of the tree.
    ///
    /// Later siblings of the removed node (and their descendants) move one slot left.
    /// Returns `None` when `self` pointed into the removed subtree.
    pub fn rebase_after_removal(&self, removed: &NodePath) -> Option<Self> {
        let Some((parent, removed_idx)) = removed.parent() else {
            return None;
        };
        if self.starts_with(removed) {
            return None;
        }

        let depth = parent.depth();
        let mut indices = self.indices.clone();
        if self.starts_with(&parent) && indices.len() > depth && indices[depth] > removed_idx {
            indices[depth] -= 1;
        }
        Some(Self { indices })
    }

    /// JSON pointer for a tree stored under `prefix`, e.g. `/dom/children/0`.
    pub fn to_pointer(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if self.is_root() {
            if prefix.is_empty() {
                "/".to_owned()
            } else {
                prefix.to_owned()
            }
        } else {
            format!("{prefix}{self}")
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.indices.is_empty() {
            return f.write_str("/");
        }
        for index in &self.indices {
            write!(f, "/{CHILDREN_MARKER}/{index}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::root());
        }

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(PathError::MissingLeadingSlash {
                path: trimmed.to_owned(),
            });
        };

        let segments: Vec<&str> = rest.split('/').collect();
        let mut indices = Vec::with_capacity(segments.len() / 2);
        for (position, pair) in segments.chunks(2).enumerate() {
            let marker = pair[0];
            if marker != CHILDREN_MARKER {
                return Err(PathError::UnexpectedSegment {
                    segment: marker.to_owned(),
                    position: position * 2,
                });
            }

            let Some(raw_index) = pair.get(1) else {
                return Err(PathError::MissingIndex {
                    path: trimmed.to_owned(),
                });
            };
            let index = raw_index
                .parse::<usize>()
                .map_err(|_| PathError::InvalidIndex {
                    segment: (*raw_index).to_owned(),
                })?;
            indices.push(index);
        }

        Ok(Self { indices })
    }
}

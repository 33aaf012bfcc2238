//! # Structural Paths
//!
//! A path addresses a block by position rather than id: `"1/0/2"` is the
//! third child of the first child of the second root block. Paths go stale
//! as soon as siblings are added or removed, so they are always derived
//! from the live tree and never cached across mutations.

use crate::id_generator::BlockId;
use crate::mutations::MutationError;
use crate::tree::{BlockTree, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-empty sequence of child indices from the root list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockPath(Vec<usize>);

impl BlockPath {
    pub fn new(segments: Vec<usize>) -> Option<Self> {
        (!segments.is_empty()).then_some(Self(segments))
    }

    /// Path of the `index`th root block
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn segments(&self) -> &[usize] {
        &self.0
    }

    /// Index within the containing list
    pub fn last_index(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Path of the `index`th child of the block at this path
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    /// Strip the last segment; `None` for a root-level path
    pub fn parent(&self) -> Option<Self> {
        Self::new(self.0[..self.0.len() - 1].to_vec())
    }

    pub fn is_ancestor_of(&self, other: &BlockPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments: Vec<String> = self.0.iter().map(usize::to_string).collect();
        f.write_str(&segments.join("/"))
    }
}

impl FromStr for BlockPath {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('/')
            .map(|segment| {
                segment
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| MutationError::InvalidPath(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(segments).ok_or_else(|| MutationError::InvalidPath(s.to_string()))
    }
}

impl TryFrom<String> for BlockPath {
    type Error = MutationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockPath> for String {
    fn from(path: BlockPath) -> Self {
        path.to_string()
    }
}

/// Parent of a path, `None` when the path is root-level
pub fn get_parent_path(path: &BlockPath) -> Option<BlockPath> {
    path.parent()
}

/// Walk the tree from the root list following each index
pub fn get_block_by_path<'a>(tree: &'a BlockTree, path: &BlockPath) -> Option<&'a Node> {
    let mut siblings = tree.roots();
    let mut found = None;

    for &index in path.segments() {
        let node = tree.get(siblings.get(index)?)?;
        siblings = node.children.as_slice();
        found = Some(node);
    }

    found
}

/// Current path of a block
pub fn path_of(tree: &BlockTree, id: &str) -> Option<BlockPath> {
    let mut segments = Vec::new();
    let mut current = tree.get(id)?;

    loop {
        let siblings = tree.children_of(current.parent.as_deref())?;
        segments.push(siblings.iter().position(|sibling| sibling == &current.id)?);

        match &current.parent {
            Some(parent) => current = tree.get(parent)?,
            None => break,
        }
    }

    segments.reverse();
    BlockPath::new(segments)
}

/// Container and index a path inserts at: the block at the parent path
/// (or the root list) and the path's last index
pub fn insertion_point(
    tree: &BlockTree,
    path: &BlockPath,
) -> Result<(Option<BlockId>, usize), MutationError> {
    let container = match path.parent() {
        Some(parent_path) => Some(
            get_block_by_path(tree, &parent_path)
                .ok_or_else(|| MutationError::PathNotFound(parent_path.to_string()))?
                .id
                .clone(),
        ),
        None => None,
    };

    Ok((container, path.last_index()))
}

//! # Block Mutations
//!
//! High-level operations on the block tree.
//!
//! ## Design Principles
//!
//! 1. **Intent-preserving**: Each mutation represents one user action
//! 2. **Validated**: All mutations check structural constraints first
//! 3. **Atomic**: A rejected mutation leaves the tree untouched
//!
//! ## Mutation Semantics
//!
//! ### Add
//! - With a path: spliced at the path's last index in its parent's list
//! - Without: appended to the parent (or root list)
//! - Fails if the addressed container does not exist
//!
//! ### Move
//! - Target path is resolved after the block has been taken out
//! - Fails if it would create a cycle
//!
//! ### Update
//! - Shallow merge of fields, last write wins
//! - Type and id never change
//!
//! ### Remove
//! - Removes the block and all descendants

use crate::block::Block;
use crate::id_generator::{BlockId, IdGenerator};
use crate::path::{get_block_by_path, insertion_point, BlockPath};
use crate::tree::BlockTree;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Semantic mutations of the block tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Insert a new block (ids are stamped on insert)
    AddBlock {
        block: Block,
        parent_id: Option<BlockId>,
        path: Option<BlockPath>,
    },

    /// Remove a block and its subtree
    RemoveBlock { block_id: BlockId },

    /// Shallow-merge fields into a block
    UpdateBlock {
        block_id: BlockId,
        patch: Map<String, Value>,
    },

    /// Clone a block with fresh ids right after itself
    DuplicateBlock { block_id: BlockId },

    /// Move the block at one path to another
    MoveBlock { from: BlockPath, to: BlockPath },

    /// Move a block under a new parent at index
    MoveBlockInto {
        block_id: BlockId,
        new_parent_id: Option<BlockId>,
        index: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("No block at path: {0}")]
    PathNotFound(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Would create cycle")]
    CycleDetected,

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Duplicate block id: {0}")]
    DuplicateId(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// What an applied mutation did
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Added(BlockId),
    Removed(Block),
    Updated(BlockId),
    Duplicated(BlockId),
    Moved(BlockId),
}

/// Result of applying a mutation through a document
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Document revision after the mutation
    pub version: u64,

    pub outcome: MutationOutcome,
}

impl Mutation {
    /// Apply mutation to the tree with validation
    pub fn apply(&self, tree: &mut BlockTree, ids: &mut IdGenerator) -> Result<MutationOutcome, MutationError> {
        self.validate(tree)?;

        match self {
            Mutation::AddBlock { block, parent_id, path } => {
                let id = match path {
                    Some(path) => tree.insert_at_path(block.clone(), path, ids)?,
                    None => tree.insert(block.clone(), parent_id.as_deref(), None, ids)?,
                };
                Ok(MutationOutcome::Added(id))
            }

            Mutation::RemoveBlock { block_id } => tree.remove(block_id).map(MutationOutcome::Removed),

            Mutation::UpdateBlock { block_id, patch } => {
                tree.update(block_id, patch, ids)?;
                Ok(MutationOutcome::Updated(block_id.clone()))
            }

            Mutation::DuplicateBlock { block_id } => {
                tree.duplicate(block_id, ids).map(MutationOutcome::Duplicated)
            }

            Mutation::MoveBlock { from, to } => tree.move_path(from, to).map(MutationOutcome::Moved),

            Mutation::MoveBlockInto {
                block_id,
                new_parent_id,
                index,
            } => {
                tree.move_into(block_id, new_parent_id.as_deref(), *index)?;
                Ok(MutationOutcome::Moved(block_id.clone()))
            }
        }
    }

    /// Validate without applying.
    ///
    /// `MoveBlock` targets depend on the tree after removal and are only
    /// fully checked by `apply`.
    pub fn validate(&self, tree: &BlockTree) -> Result<(), MutationError> {
        match self {
            Mutation::AddBlock { parent_id, path, .. } => match path {
                Some(path) => insertion_point(tree, path).map(|_| ()),
                None => match parent_id {
                    Some(parent_id) if !tree.contains(parent_id) => {
                        Err(MutationError::ParentNotFound(parent_id.clone()))
                    }
                    _ => Ok(()),
                },
            },

            Mutation::RemoveBlock { block_id }
            | Mutation::UpdateBlock { block_id, .. }
            | Mutation::DuplicateBlock { block_id } => {
                if tree.contains(block_id) {
                    Ok(())
                } else {
                    Err(MutationError::NodeNotFound(block_id.clone()))
                }
            }

            Mutation::MoveBlock { from, .. } => get_block_by_path(tree, from)
                .map(|_| ())
                .ok_or_else(|| MutationError::PathNotFound(from.to_string())),

            Mutation::MoveBlockInto {
                block_id,
                new_parent_id,
                ..
            } => tree.validate_move_into(block_id, new_parent_id.as_deref()),
        }
    }

    /// Discrete user-visible actions get their own undo entry right away;
    /// field edits are coalesced. An update carrying `blocks` replaces the
    /// children and counts as structural.
    pub fn is_structural(&self) -> bool {
        match self {
            Mutation::UpdateBlock { patch, .. } => patch.contains_key("blocks"),
            _ => true,
        }
    }

    /// Get a debug name for this mutation
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddBlock { .. } => "AddBlock",
            Mutation::RemoveBlock { .. } => "RemoveBlock",
            Mutation::UpdateBlock { .. } => "UpdateBlock",
            Mutation::DuplicateBlock { .. } => "DuplicateBlock",
            Mutation::MoveBlock { .. } => "MoveBlock",
            Mutation::MoveBlockInto { .. } => "MoveBlockInto",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;
    use serde_json::json;

    #[test]
    fn test_mutation_serialization() {
        let mutation = Mutation::MoveBlock {
            from: "0/1".parse().unwrap(),
            to: "2".parse().unwrap(),
        };

        let json = serde_json::to_string(&mutation).unwrap();
        let deserialized: Mutation = serde_json::from_str(&json).unwrap();

        assert_eq!(mutation, deserialized);
        assert!(json.contains("\"0/1\""));
    }

    #[test]
    fn test_validation_rejects_missing_ids() {
        let tree = BlockTree::new();

        let mutation = Mutation::RemoveBlock {
            block_id: "".to_string(),
        };

        assert!(mutation.validate(&tree).is_err());
    }

    #[test]
    fn test_add_to_empty_tree() {
        let mut tree = BlockTree::new();
        let mut ids = IdGenerator::from_seed("m");

        let outcome = Mutation::AddBlock {
            block: Block::of_type(BlockType::Image),
            parent_id: None,
            path: None,
        }
        .apply(&mut tree, &mut ids)
        .unwrap();

        assert_eq!(outcome, MutationOutcome::Added("m-1".to_string()));
        assert_eq!(tree.roots(), &["m-1".to_string()]);
        assert_eq!(tree.get("m-1").unwrap().data.block_type(), BlockType::Image);
    }

    #[test]
    fn test_rejected_update_leaves_tree_untouched() {
        let mut tree = BlockTree::from_blocks(vec![Block::of_type(BlockType::Text).with_id("a")]).unwrap();
        let mut ids = IdGenerator::from_seed("m");
        let before = tree.clone();

        let mut patch = Map::new();
        patch.insert("level".to_string(), json!("not a number"));

        let result = Mutation::UpdateBlock {
            block_id: "a".to_string(),
            patch,
        }
        .apply(&mut tree, &mut ids);

        assert!(matches!(result, Err(MutationError::InvalidPatch(_))));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_structural_classification() {
        assert!(Mutation::DuplicateBlock {
            block_id: "a".to_string()
        }
        .is_structural());
        assert!(!Mutation::UpdateBlock {
            block_id: "a".to_string(),
            patch: Map::new()
        }
        .is_structural());
        assert!(Mutation::UpdateBlock {
            block_id: "a".to_string(),
            patch: json!({ "blocks": [] }).as_object().unwrap().clone()
        }
        .is_structural());
    }
}

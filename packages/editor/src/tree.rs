//! # Block Tree
//!
//! Arena representation of the document: every node is stored once, keyed
//! by id, with its parent id and ordered child id list. Structural edits only
//! touch the affected node and its immediate neighbours; whole-tree copies
//! happen only when the undo stack takes a snapshot.
//!
//! ## Invariants
//!
//! - Every id is unique (the map key *is* the id)
//! - `parent` of a node always names the node whose `children` lists it,
//!   and is `None` exactly for entries of the root list
//! - The tree is acyclic
//! - Nodes removed from the tree are dropped from the arena
//!
//! Insertions never fail on id collisions: colliding or empty ids are
//! re-stamped from the caller's [`IdGenerator`].

use crate::block::{Block, BlockData};
use crate::id_generator::{BlockId, IdGenerator};
use crate::mutations::MutationError;
use crate::path::{get_block_by_path, insertion_point, BlockPath};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// A block in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: BlockId,
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
    pub data: BlockData,
}

/// Ordered forest of blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockTree {
    nodes: HashMap<BlockId, Node>,
    roots: Vec<BlockId>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from nested blocks, rejecting duplicate or missing ids.
    /// `parentId` fields are rewritten from actual containment.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, MutationError> {
        let mut tree = Self::new();
        for block in blocks {
            let id = tree.adopt_strict(block, None)?;
            tree.roots.push(id);
        }
        Ok(tree)
    }

    fn adopt_strict(&mut self, block: Block, parent: Option<BlockId>) -> Result<BlockId, MutationError> {
        if block.id.is_empty() {
            return Err(MutationError::InvalidStructure(
                "block without id".to_string(),
            ));
        }
        if self.nodes.contains_key(&block.id) {
            return Err(MutationError::DuplicateId(block.id));
        }

        let id = block.id;
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                parent,
                children: Vec::new(),
                data: block.data,
            },
        );

        let mut children = Vec::with_capacity(block.blocks.len());
        for child in block.blocks {
            children.push(self.adopt_strict(child, Some(id.clone()))?);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }

        Ok(id)
    }

    /// Nested form of the whole tree
    pub fn to_blocks(&self) -> Vec<Block> {
        self.roots.iter().filter_map(|id| self.subtree(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    /// Find a block by id
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Child list of a container, or the root list for `None`
    pub fn children_of(&self, parent: Option<&str>) -> Option<&[BlockId]> {
        match parent {
            Some(id) => self.nodes.get(id).map(|node| node.children.as_slice()),
            None => Some(&self.roots),
        }
    }

    /// Containing block and index within its list
    pub fn location(&self, id: &str) -> Option<(Option<BlockId>, usize)> {
        let node = self.nodes.get(id)?;
        let siblings = self.children_of(node.parent.as_deref())?;
        let index = siblings.iter().position(|sibling| sibling == id)?;
        Some((node.parent.clone(), index))
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.nodes.get(id).and_then(|node| node.parent.as_deref());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|node| node.parent.as_deref());
        }
        false
    }

    /// Ids in document order (pre-order, depth first)
    pub fn ids(&self) -> Vec<BlockId> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&BlockId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            ids.push(id.clone());
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        ids
    }

    /// Mutable access to every block payload
    pub fn data_mut(&mut self) -> impl Iterator<Item = (&BlockId, &mut BlockData)> {
        self.nodes.iter_mut().map(|(id, node)| (id, &mut node.data))
    }

    pub(crate) fn data_of_mut(&mut self, id: &str) -> Option<&mut BlockData> {
        self.nodes.get_mut(id).map(|node| &mut node.data)
    }

    /// Deep value copy of a block and its descendants, ids kept
    pub fn subtree(&self, id: &str) -> Option<Block> {
        let node = self.nodes.get(id)?;
        Some(Block {
            id: node.id.clone(),
            parent_id: node.parent.clone(),
            data: node.data.clone(),
            blocks: node
                .children
                .iter()
                .filter_map(|child| self.subtree(child))
                .collect(),
        })
    }

    /// Insert a block (with its subtree) into `parent`'s children, or the
    /// root list. `index` is clamped to the list length; `None` appends.
    pub fn insert(
        &mut self,
        block: Block,
        parent: Option<&str>,
        index: Option<usize>,
        ids: &mut IdGenerator,
    ) -> Result<BlockId, MutationError> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(MutationError::ParentNotFound(parent_id.to_string()));
            }
        }

        let id = self.adopt(block, parent.map(str::to_string), ids);
        self.attach(&id, parent, index);
        Ok(id)
    }

    /// Insert at a structural path: into the list addressed by the path's
    /// parent, at its last index
    pub fn insert_at_path(
        &mut self,
        block: Block,
        path: &BlockPath,
        ids: &mut IdGenerator,
    ) -> Result<BlockId, MutationError> {
        let (container, index) = insertion_point(self, path)?;
        self.insert(block, container.as_deref(), Some(index), ids)
    }

    fn adopt(&mut self, block: Block, parent: Option<BlockId>, ids: &mut IdGenerator) -> BlockId {
        let id = if block.id.is_empty() || self.nodes.contains_key(&block.id) {
            ids.new_id_where(|candidate| self.nodes.contains_key(candidate))
        } else {
            block.id
        };

        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                parent,
                children: Vec::new(),
                data: block.data,
            },
        );

        let children: Vec<BlockId> = block
            .blocks
            .into_iter()
            .map(|child| self.adopt(child, Some(id.clone()), ids))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }

        id
    }

    fn attach(&mut self, id: &str, parent: Option<&str>, index: Option<usize>) {
        let siblings = match parent {
            Some(parent_id) => match self.nodes.get_mut(parent_id) {
                Some(node) => &mut node.children,
                None => return,
            },
            None => &mut self.roots,
        };

        let index = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, id.to_string());

        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = parent.map(str::to_string);
        }
    }

    /// Unlink a node from its list, keeping it (and its subtree) in the
    /// arena. Returns where it was.
    fn detach(&mut self, id: &str) -> Result<(Option<BlockId>, usize), MutationError> {
        let (parent, index) = self
            .location(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;

        match &parent {
            Some(parent_id) => {
                if let Some(node) = self.nodes.get_mut(parent_id) {
                    node.children.remove(index);
                }
            }
            None => {
                self.roots.remove(index);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = None;
        }

        Ok((parent, index))
    }

    fn drop_subtree(&mut self, id: &str) {
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }

    /// Remove a block and its entire subtree, returning it
    pub fn remove(&mut self, id: &str) -> Result<Block, MutationError> {
        let block = self
            .subtree(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;

        self.detach(id)?;
        self.drop_subtree(id);

        Ok(block)
    }

    /// Shallow-merge a JSON object into a block.
    ///
    /// Keys replace the block's own fields one level deep. `parentId` is
    /// ignored; `id` and `type` must match the block if given. A `blocks`
    /// key replaces the children wholesale. On error nothing changes.
    pub fn update(
        &mut self,
        id: &str,
        patch: &Map<String, Value>,
        ids: &mut IdGenerator,
    ) -> Result<(), MutationError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;

        let mut fields = match serde_json::to_value(&node.data) {
            Ok(Value::Object(fields)) => fields,
            _ => return Err(MutationError::InvalidPatch("block is not an object".to_string())),
        };

        let mut children = None;
        for (key, value) in patch {
            match key.as_str() {
                "parentId" => {}
                "id" => {
                    if value.as_str() != Some(id) {
                        return Err(MutationError::InvalidPatch("id is immutable".to_string()));
                    }
                }
                "type" => {
                    if fields.get("type") != Some(value) {
                        return Err(MutationError::InvalidPatch(
                            "block type cannot change".to_string(),
                        ));
                    }
                }
                "blocks" => {
                    let blocks: Vec<Block> = serde_json::from_value(value.clone())
                        .map_err(|e| MutationError::InvalidPatch(e.to_string()))?;
                    children = Some(blocks);
                }
                _ => {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        let data: BlockData = serde_json::from_value(Value::Object(fields))
            .map_err(|e| MutationError::InvalidPatch(e.to_string()))?;

        if let Some(blocks) = children {
            self.replace_children(id, blocks, ids);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.data = data;
        }

        Ok(())
    }

    fn replace_children(&mut self, id: &str, blocks: Vec<Block>, ids: &mut IdGenerator) {
        let old = self
            .nodes
            .get_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in old {
            self.drop_subtree(&child);
        }

        for block in blocks {
            let child = self.adopt(block, Some(id.to_string()), ids);
            self.attach(&child, Some(id), None);
        }
    }

    /// Deep-clone a block with fresh ids and insert the copy right after
    /// the original. `formId` references are copied as-is.
    pub fn duplicate(&mut self, id: &str, ids: &mut IdGenerator) -> Result<BlockId, MutationError> {
        let (parent, index) = self
            .location(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let copy = self
            .subtree(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?
            .without_ids();

        self.insert(copy, parent.as_deref(), Some(index + 1), ids)
    }

    /// Move the block at `from` to `to`. `to` is resolved against the tree
    /// after the block has been taken out, so later siblings have already
    /// shifted. On failure the block is put back where it was.
    pub fn move_path(&mut self, from: &BlockPath, to: &BlockPath) -> Result<BlockId, MutationError> {
        let id = get_block_by_path(self, from)
            .ok_or_else(|| MutationError::PathNotFound(from.to_string()))?
            .id
            .clone();

        let (old_parent, old_index) = self.detach(&id)?;

        let target = insertion_point(self, to).and_then(|(container, index)| {
            match &container {
                Some(container_id) if container_id == &id || self.is_ancestor(&id, container_id) => {
                    Err(MutationError::CycleDetected)
                }
                _ => Ok((container, index)),
            }
        });

        match target {
            Ok((container, index)) => {
                self.attach(&id, container.as_deref(), Some(index));
                Ok(id)
            }
            Err(e) => {
                self.attach(&id, old_parent.as_deref(), Some(old_index));
                Err(e)
            }
        }
    }

    /// Move a block under `new_parent` (or to the root list) at `index`,
    /// counted after the block has been taken out
    pub fn move_into(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        index: usize,
    ) -> Result<(), MutationError> {
        self.validate_move_into(id, new_parent)?;
        self.detach(id)?;
        self.attach(id, new_parent, Some(index));
        Ok(())
    }

    pub(crate) fn validate_move_into(&self, id: &str, new_parent: Option<&str>) -> Result<(), MutationError> {
        if !self.nodes.contains_key(id) {
            return Err(MutationError::NodeNotFound(id.to_string()));
        }
        if let Some(parent_id) = new_parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(MutationError::ParentNotFound(parent_id.to_string()));
            }
            if parent_id == id || self.is_ancestor(id, parent_id) {
                return Err(MutationError::CycleDetected);
            }
        }
        Ok(())
    }

    /// Check every structural invariant, reporting the first violation
    pub fn check_invariants(&self) -> Result<(), MutationError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<(Option<&BlockId>, &BlockId)> =
            self.roots.iter().map(|id| (None, id)).collect();

        while let Some((container, id)) = stack.pop() {
            if !seen.insert(id) {
                return Err(MutationError::DuplicateId(id.clone()));
            }
            let node = self.nodes.get(id).ok_or_else(|| {
                MutationError::InvalidStructure(format!("dangling child reference {}", id))
            })?;
            if node.parent.as_ref() != container {
                return Err(MutationError::InvalidStructure(format!(
                    "parent of {} does not match its container",
                    id
                )));
            }
            stack.extend(node.children.iter().map(|child| (Some(id), child)));
        }

        if seen.len() != self.nodes.len() {
            return Err(MutationError::InvalidStructure(format!(
                "{} blocks unreachable from the root list",
                self.nodes.len() - seen.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, BlockType};
    use serde_json::json;

    fn text(id: &str, content: &str) -> Block {
        Block::new(BlockKind::Text {
            content: content.to_string(),
        })
        .with_id(id)
    }

    fn container(id: &str, children: Vec<Block>) -> Block {
        let mut block = Block::of_type(BlockType::Container).with_id(id);
        block.blocks = children;
        block
    }

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn test_from_blocks_rewrites_parent_ids() {
        let mut child = text("b", "hi");
        child.parent_id = Some("elsewhere".to_string());
        let tree = BlockTree::from_blocks(vec![container("a", vec![child])]).unwrap();

        assert_eq!(tree.get("b").unwrap().parent.as_deref(), Some("a"));
        assert_eq!(tree.to_blocks()[0].blocks[0].parent_id.as_deref(), Some("a"));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_from_blocks_rejects_duplicates() {
        let result = BlockTree::from_blocks(vec![text("a", "1"), container("b", vec![text("a", "2")])]);
        assert_eq!(result, Err(MutationError::DuplicateId("a".to_string())));
    }

    #[test]
    fn test_insert_appends_and_splices() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![container("a", vec![text("b", "1")])]).unwrap();

        let last = tree.insert(text("", "2"), Some("a"), None, &mut ids).unwrap();
        let first = tree.insert(text("", "0"), Some("a"), Some(0), &mut ids).unwrap();

        assert_eq!(tree.get("a").unwrap().children, vec![first.clone(), "b".to_string(), last]);
        assert_eq!(tree.get(&first).unwrap().parent.as_deref(), Some("a"));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_restamps_colliding_ids() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![text("a", "1")]).unwrap();

        let id = tree.insert(container("a", vec![text("a", "x")]), None, None, &mut ids).unwrap();

        assert_ne!(id, "a");
        assert_eq!(tree.len(), 3);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_into_missing_parent_is_rejected() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::new();

        let result = tree.insert(text("", "x"), Some("ghost"), None, &mut ids);
        assert_eq!(result, Err(MutationError::ParentNotFound("ghost".to_string())));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut tree =
            BlockTree::from_blocks(vec![container("a", vec![container("b", vec![text("c", "")])]), text("d", "")])
                .unwrap();

        let removed = tree.remove("b").unwrap();

        assert_eq!(removed.ids(), vec!["b", "c"]);
        assert!(!tree.contains("b"));
        assert!(!tree.contains("c"));
        assert!(tree.get("a").unwrap().children.is_empty());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_update_merges_fields() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![text("a", "old")]).unwrap();

        tree.update("a", &patch(json!({ "content": "new", "level": 2 })), &mut ids)
            .unwrap();

        let node = tree.get("a").unwrap();
        assert_eq!(node.data.kind.content(), Some("new"));
        assert_eq!(node.data.level, 2);
    }

    #[test]
    fn test_update_rejects_type_change() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![text("a", "old")]).unwrap();

        let result = tree.update("a", &patch(json!({ "type": "image", "content": "x" })), &mut ids);

        assert!(matches!(result, Err(MutationError::InvalidPatch(_))));
        assert_eq!(tree.get("a").unwrap().data.kind.content(), Some("old"));
    }

    #[test]
    fn test_update_replaces_children_when_given() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![container("a", vec![text("b", "1")])]).unwrap();

        tree.update(
            "a",
            &patch(json!({ "blocks": [{ "type": "divider" }, { "id": "b", "type": "text" }] })),
            &mut ids,
        )
        .unwrap();

        let children = &tree.get("a").unwrap().children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[1], "b");
        assert_eq!(tree.get("b").unwrap().data.kind.content(), Some(""));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_inserts_after_original() {
        let mut ids = IdGenerator::from_seed("t");
        let mut tree = BlockTree::from_blocks(vec![
            container("a", vec![text("b", "hi")]),
            text("z", ""),
        ])
        .unwrap();

        let copy = tree.duplicate("a", &mut ids).unwrap();

        assert_eq!(tree.roots(), &["a".to_string(), copy.clone(), "z".to_string()]);
        assert_eq!(
            tree.subtree(&copy).unwrap().without_ids(),
            tree.subtree("a").unwrap().without_ids()
        );
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_path_resolves_target_after_removal() {
        let mut tree = BlockTree::from_blocks(vec![container("a", vec![text("b", "hi")])]).unwrap();

        let moved = tree
            .move_path(&"0/0".parse().unwrap(), &"1".parse().unwrap())
            .unwrap();

        assert_eq!(moved, "b");
        assert_eq!(tree.roots(), &["a".to_string(), "b".to_string()]);
        assert_eq!(tree.get("b").unwrap().parent, None);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_path_restores_on_bad_target() {
        let mut tree =
            BlockTree::from_blocks(vec![text("a", ""), container("b", vec![]), text("c", "")]).unwrap();
        let before = tree.clone();

        let result = tree.move_path(&"0".parse().unwrap(), &"7/0".parse().unwrap());

        assert!(matches!(result, Err(MutationError::PathNotFound(_))));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_move_into_rejects_cycles() {
        let mut tree =
            BlockTree::from_blocks(vec![container("a", vec![container("b", vec![])])]).unwrap();

        assert_eq!(tree.move_into("a", Some("b"), 0), Err(MutationError::CycleDetected));
        assert_eq!(tree.move_into("a", Some("a"), 0), Err(MutationError::CycleDetected));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_ids_in_document_order() {
        let tree = BlockTree::from_blocks(vec![
            container("a", vec![text("b", ""), text("c", "")]),
            text("d", ""),
        ])
        .unwrap();

        assert_eq!(tree.ids(), vec!["a", "b", "c", "d"]);
    }
}

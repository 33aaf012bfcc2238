pub mod init;
pub mod styles;
pub mod tree;
pub mod validate;

pub use init::{init, InitArgs};
pub use styles::{styles, StylesArgs};
pub use tree::{tree, TreeArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::{Context, Result};
use blockframe_editor::{BlockTree, PersistedDocument};
use std::fs;
use std::path::Path;

/// Read a persisted document from disk
pub fn read_document(path: &Path) -> Result<PersistedDocument> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document = serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(document)
}

/// Read a document and build its block tree
pub fn read_tree(path: &Path) -> Result<(PersistedDocument, BlockTree)> {
    let document = read_document(path)?;
    let tree = BlockTree::from_blocks(document.content.blocks.clone())
        .with_context(|| format!("Invalid block tree in {}", path.display()))?;
    Ok((document, tree))
}

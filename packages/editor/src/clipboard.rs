//! # Clipboard
//!
//! Copy/cut/paste of single block subtrees.
//!
//! Two tiers:
//!
//! 1. **Same session**: the id of the copied (or cut) block is remembered. As
//!    long as that block is still in the tree, paste clones it directly and
//!    never touches the system clipboard.
//! 2. **Text transport**: copy also writes the block to the clipboard
//!    backend as JSON. Paste falls back to reading it, which also accepts
//!    blocks authored elsewhere.
//!
//! Clipboard text is a versioned envelope:
//!
//! ```json
//! { "schemaVersion": 1, "block": { "type": "text", "content": "hi" } }
//! ```
//!
//! A bare block object is accepted too. Anything malformed, from another
//! schema version, or containing a block type outside the allow-list is
//! rejected.

use crate::block::{Block, BlockType};
use crate::id_generator::BlockId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Mutex;
use thiserror::Error;

pub const CLIPBOARD_SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Clipboard is empty")]
    Empty,

    #[error("Malformed clipboard payload: {0}")]
    Malformed(String),

    #[error("Unsupported clipboard schema version: {0}")]
    UnsupportedVersion(u64),

    #[error("Block type not pasteable: {0}")]
    DisallowedType(String),
}

/// Plain-text clipboard transport
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    async fn read_text(&self) -> Result<String, ClipboardError>;

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// In-process clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard pre-filled with text, as if copied from another app
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.text.lock().ok().and_then(|text| text.clone())
    }
}

#[async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn read_text(&self) -> Result<String, ClipboardError> {
        let text = self
            .text
            .lock()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        text.clone().ok_or(ClipboardError::Empty)
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut slot = self
            .text
            .lock()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        *slot = Some(text.to_string());
        Ok(())
    }
}

/// The operating system clipboard
#[cfg(feature = "system-clipboard")]
#[derive(Debug, Default)]
pub struct SystemClipboard;

#[cfg(feature = "system-clipboard")]
#[async_trait]
impl ClipboardBackend for SystemClipboard {
    async fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .get_text()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }
}

/// Block types that may arrive through the text clipboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasteAllowList(BTreeSet<BlockType>);

impl PasteAllowList {
    pub fn new(types: impl IntoIterator<Item = BlockType>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn allows(&self, block_type: BlockType) -> bool {
        self.0.contains(&block_type)
    }
}

impl Default for PasteAllowList {
    fn default() -> Self {
        Self::new(BlockType::ALL)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadRef<'a> {
    schema_version: u32,
    block: &'a Block,
}

/// Serialize a block subtree for the text clipboard
pub fn encode_payload(block: &Block) -> Result<String, ClipboardError> {
    serde_json::to_string(&PayloadRef {
        schema_version: CLIPBOARD_SCHEMA_VERSION,
        block,
    })
    .map_err(|e| ClipboardError::Malformed(e.to_string()))
}

/// Parse clipboard text into a block, checking every type in the subtree
/// against `allow`
pub fn decode_payload(text: &str, allow: &PasteAllowList) -> Result<Block, ClipboardError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ClipboardError::Malformed(e.to_string()))?;

    let block_value = match value {
        Value::Object(mut envelope) if envelope.contains_key("schemaVersion") => {
            let version = envelope
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .ok_or_else(|| ClipboardError::Malformed("schemaVersion is not a number".to_string()))?;
            if version != u64::from(CLIPBOARD_SCHEMA_VERSION) {
                return Err(ClipboardError::UnsupportedVersion(version));
            }
            envelope
                .remove("block")
                .ok_or_else(|| ClipboardError::Malformed("missing block".to_string()))?
        }
        other => other,
    };

    check_types(&block_value, allow)?;

    serde_json::from_value(block_value).map_err(|e| ClipboardError::Malformed(e.to_string()))
}

fn check_types(value: &Value, allow: &PasteAllowList) -> Result<(), ClipboardError> {
    let type_tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClipboardError::Malformed("missing type".to_string()))?;

    match type_tag.parse::<BlockType>() {
        Ok(block_type) if allow.allows(block_type) => {}
        _ => return Err(ClipboardError::DisallowedType(type_tag.to_string())),
    }

    if let Some(children) = value.get("blocks").and_then(Value::as_array) {
        for child in children {
            check_types(child, allow)?;
        }
    }

    Ok(())
}

/// Which remembered block a paste would use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardSource {
    Copied(BlockId),
    Cut(BlockId),
}

impl ClipboardSource {
    pub fn block_id(&self) -> &str {
        match self {
            ClipboardSource::Copied(id) | ClipboardSource::Cut(id) => id,
        }
    }
}

/// Remembered copy/cut ids; setting one clears the other
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardState {
    source: Option<ClipboardSource>,
}

impl ClipboardState {
    pub fn set_copied(&mut self, id: impl Into<BlockId>) {
        self.source = Some(ClipboardSource::Copied(id.into()));
    }

    pub fn set_cut(&mut self, id: impl Into<BlockId>) {
        self.source = Some(ClipboardSource::Cut(id.into()));
    }

    pub fn copied_block_id(&self) -> Option<&str> {
        match &self.source {
            Some(ClipboardSource::Copied(id)) => Some(id),
            _ => None,
        }
    }

    pub fn cut_block_id(&self) -> Option<&str> {
        match &self.source {
            Some(ClipboardSource::Cut(id)) => Some(id),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&ClipboardSource> {
        self.source.as_ref()
    }

    pub fn clear(&mut self) {
        self.source = None;
    }
}

//! # Blockframe Editor
//!
//! Block-tree editing engine for page and article authoring.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: DocumentStore                     │
//! │  - Selection, tab and breakpoint            │
//! │  - Dirty tracking and autosave              │
//! │  - Copy/cut/paste                           │
//! └─────────────────────────────────────────────┘
//!           ↓                        ↓
//! ┌────────────────────────┐ ┌──────────────────┐
//! │ mutations → tree       │ │ undo_stack       │
//! │  path, styles, ids     │ │  debounce, clock │
//! └────────────────────────┘ └──────────────────┘
//!           ↓
//! ┌─────────────────────────────────────────────┐
//! │ clipboard / persistence: async transports   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **One owner**: the store owns the live tree; everything else borrows
//!    it for one call
//! 2. **Arena tree**: blocks are stored flat by id, nested only at the edges
//! 3. **Quiet failures**: UI operations on missing targets are no-ops
//! 4. **Everything undoable**: every tree change lands in history
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockframe_editor::{Block, BlockType, DocumentStore, EditorConfig};
//!
//! let mut store = DocumentStore::new(EditorConfig::default());
//!
//! let id = store.add_block(Block::of_type(BlockType::Image), None, None).unwrap();
//! store.copy(&id).await;
//! store.paste().await;
//!
//! store.undo();
//! store.save(&service, true).await?;
//! ```

mod block;
mod clipboard;
mod config;
mod debounce;
mod document;
mod errors;
mod id_generator;
mod mutations;
mod path;
mod persistence;
mod session;
mod styles;
mod tree;
mod undo_stack;

pub use block::{Block, BlockData, BlockKind, BlockType, ButtonType, FormField, FormItem};
pub use clipboard::{
    decode_payload, encode_payload, ClipboardBackend, ClipboardError, ClipboardSource, ClipboardState,
    MemoryClipboard, PasteAllowList, CLIPBOARD_SCHEMA_VERSION,
};
pub use config::{ConfigError, EditorConfig, DEFAULT_CONFIG_NAME};
pub use debounce::{Clock, Debouncer, ManualClock, SystemClock};
pub use document::{DocumentState, DocumentStore, InsertionContext, PasteRequest};
pub use errors::EditorError;
pub use id_generator::{BlockId, IdGenerator};
pub use mutations::{Mutation, MutationError, MutationOutcome, MutationResult};
pub use path::{get_block_by_path, get_parent_path, insertion_point, path_of, BlockPath};
pub use persistence::{
    AutosaveState, AutosaveStatus, DocumentContent, FilePersistence, MemoryPersistence, PersistedDocument,
    PersistenceError, PersistenceService, SaveRequest, DEFAULT_AUTOSAVE_MAX_RETRIES,
};
pub use session::{EditSession, EditorTab};
pub use styles::{Breakpoint, ResponsiveStyle, StyleProperties, Styles};
pub use tree::{BlockTree, Node};
pub use undo_stack::{HistorySnapshot, UndoStack, DEFAULT_DEBOUNCE, DEFAULT_MAX_ENTRIES};

#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;

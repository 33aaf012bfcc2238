//! # Edit Session
//!
//! View state of one editor: which block is selected, which side panel
//! is open and which breakpoint the canvas previews. None of it is part of
//! the document or its history.

use crate::id_generator::BlockId;
use crate::styles::Breakpoint;
use crate::tree::BlockTree;
use serde::{Deserialize, Serialize};

/// Side panel shown next to the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorTab {
    /// Block palette
    #[default]
    Blocks,
    /// Style editor for the selection
    Styles,
    /// Document settings
    Settings,
    Forms,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditSession {
    selected_block_id: Option<BlockId>,

    pub active_tab: EditorTab,

    pub breakpoint: Breakpoint,
}

impl EditSession {
    pub fn new(breakpoint: Breakpoint) -> Self {
        Self {
            selected_block_id: None,
            active_tab: EditorTab::default(),
            breakpoint,
        }
    }

    pub fn selected_block_id(&self) -> Option<&str> {
        self.selected_block_id.as_deref()
    }

    /// Update selection
    pub fn set_selection(&mut self, id: Option<BlockId>) {
        self.selected_block_id = id;
    }

    /// Drop the selection if its block is gone. Returns whether it was
    /// cleared.
    pub fn retain_selection(&mut self, tree: &BlockTree) -> bool {
        match &self.selected_block_id {
            Some(id) if !tree.contains(id) => {
                tracing::debug!("Clearing selection of removed block {}", id);
                self.selected_block_id = None;
                true
            }
            _ => false,
        }
    }
}

//! # Document Store
//!
//! The single owner of an open document and everything the editor tracks
//! about it.
//!
//! ## Lifecycle
//!
//! ```text
//! load → edit (mutations, clipboard, undo/redo) → save / autosave
//!          ↓
//!   history: structural edits recorded now, field edits debounced
//! ```
//!
//! UI-facing methods never fail loudly: a missing block, a bad path or a
//! rejected paste returns `None`/`false` and is logged at debug level.
//! [`DocumentStore::apply`] is the strict entry point that reports why.
//!
//! Clipboard and persistence calls are async. Each has a split
//! `begin_*`/`finish_*` form so a caller can release the store while the
//! call is in flight; the plain async forms just run both halves.

use crate::block::{Block, BlockType, FormItem};
use crate::clipboard::{
    decode_payload, encode_payload, ClipboardBackend, ClipboardError, ClipboardSource, ClipboardState,
    MemoryClipboard,
};
use crate::config::EditorConfig;
use crate::debounce::{Clock, SystemClock};
use crate::errors::EditorError;
use crate::id_generator::{BlockId, IdGenerator};
use crate::mutations::{Mutation, MutationError, MutationOutcome, MutationResult};
use crate::path::{get_block_by_path, insertion_point, path_of, BlockPath};
use crate::persistence::{
    AutosaveState, AutosaveStatus, CreateState, DocumentContent, PersistedDocument, PersistenceError,
    PersistenceService, SaveRequest, SaveTarget,
};
use crate::session::{EditSession, EditorTab};
use crate::styles::{Breakpoint, StyleProperties};
use crate::tree::{BlockTree, Node};
use crate::undo_stack::UndoStack;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Where new blocks go: a container (or the root list) and an index in it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertionContext {
    pub parent_id: Option<BlockId>,

    /// `None` appends
    pub index: Option<usize>,
}

/// State captured when a paste starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteRequest {
    pub context: InsertionContext,

    pub source: Option<ClipboardSource>,

    needs_clipboard: bool,
}

impl PasteRequest {
    /// Whether the remembered block is gone and the clipboard text has to
    /// be read
    pub fn needs_clipboard(&self) -> bool {
        self.needs_clipboard
    }
}

/// The undoable part of a document: blocks and the forms they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    pub tree: BlockTree,

    pub forms: Vec<FormItem>,
}

/// Editable block document
pub struct DocumentStore {
    state: DocumentState,

    /// Title, slug, ... as handed over by the host
    settings: Map<String, Value>,

    /// Assigned by the persistence service on first save
    document_id: Option<String>,

    is_draft: bool,

    session: EditSession,

    /// Increments on every change
    revision: u64,

    /// Revision covered by the last successful save
    saved_revision: u64,

    clipboard: ClipboardState,

    clipboard_backend: Arc<dyn ClipboardBackend>,

    history: UndoStack<DocumentState>,

    ids: IdGenerator,

    clock: Arc<dyn Clock>,

    autosave: AutosaveState,

    /// Ticket and outcome of the first create while it runs
    pending_create: Option<(u64, watch::Receiver<CreateState>)>,

    config: EditorConfig,
}

impl DocumentStore {
    /// Empty document with an in-memory clipboard and the wall clock
    pub fn new(config: EditorConfig) -> Self {
        let state = DocumentState::default();
        let history = UndoStack::with_options(&state, config.max_history_entries, config.history_debounce());

        Self {
            state,
            settings: Map::new(),
            document_id: None,
            is_draft: true,
            session: EditSession::new(config.default_breakpoint),
            revision: 0,
            saved_revision: 0,
            clipboard: ClipboardState::default(),
            clipboard_backend: Arc::new(MemoryClipboard::new()),
            history,
            ids: IdGenerator::new(),
            clock: Arc::new(SystemClock),
            autosave: AutosaveState::new(config.autosave_max_retries),
            pending_create: None,
            config,
        }
    }

    /// Store configured from the config file in `dir`, or defaults when
    /// there is none
    pub fn from_config_dir(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        Ok(Self::new(EditorConfig::load(dir)?))
    }

    pub fn with_clipboard(mut self, backend: Arc<dyn ClipboardBackend>) -> Self {
        self.clipboard_backend = backend;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the open document wholesale. History, selection and
    /// clipboard memory start over.
    pub fn load(&mut self, document_id: Option<String>, document: PersistedDocument) -> Result<(), EditorError> {
        let tree = BlockTree::from_blocks(document.content.blocks)?;

        self.state.tree = tree;
        self.state.forms = document.content.forms;
        self.settings = document.settings;
        self.is_draft = document.is_draft;
        self.document_id = document_id;

        self.history.reset(&self.state);
        self.session.set_selection(None);
        self.clipboard.clear();
        self.autosave = AutosaveState::new(self.config.autosave_max_retries);
        self.pending_create = None;
        self.revision += 1;
        self.saved_revision = self.revision;

        tracing::info!(
            "Loaded document {} ({} blocks, {} forms)",
            self.document_id.as_deref().unwrap_or("<new>"),
            self.state.tree.len(),
            self.state.forms.len()
        );
        Ok(())
    }

    /// Fetch a stored document and load it
    pub async fn open(&mut self, service: &dyn PersistenceService, id: &str) -> Result<(), EditorError> {
        let document = service.load(id).await?;
        self.load(Some(id.to_string()), document)
    }

    pub fn tree(&self) -> &BlockTree {
        &self.state.tree
    }

    /// Nested form of the whole document
    pub fn blocks(&self) -> Vec<Block> {
        self.state.tree.to_blocks()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check if document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn history(&self) -> &UndoStack<DocumentState> {
        &self.history
    }

    pub fn clipboard(&self) -> &ClipboardState {
        &self.clipboard
    }

    pub fn clipboard_backend(&self) -> Arc<dyn ClipboardBackend> {
        Arc::clone(&self.clipboard_backend)
    }

    pub fn autosave_state(&self) -> &AutosaveState {
        &self.autosave
    }

    // Session

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn selected_block_id(&self) -> Option<&str> {
        self.session.selected_block_id()
    }

    /// Select a block, or clear the selection with `None`. Unknown ids are
    /// ignored.
    pub fn select_block(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) if !self.state.tree.contains(id) => {
                tracing::debug!("Cannot select missing block {}", id);
                false
            }
            _ => {
                self.session.set_selection(id.map(str::to_string));
                true
            }
        }
    }

    pub fn active_tab(&self) -> EditorTab {
        self.session.active_tab
    }

    pub fn set_active_tab(&mut self, tab: EditorTab) {
        self.session.active_tab = tab;
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.session.breakpoint
    }

    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.session.breakpoint = breakpoint;
    }

    // Reads

    pub fn find_block(&self, id: &str) -> Option<&Node> {
        self.state.tree.get(id)
    }

    /// Deep copy of a block and its subtree, ids kept
    pub fn clone_block(&self, id: &str) -> Option<Block> {
        self.state.tree.subtree(id)
    }

    pub fn block_by_path(&self, path: &BlockPath) -> Option<&Node> {
        get_block_by_path(&self.state.tree, path)
    }

    pub fn path_of(&self, id: &str) -> Option<BlockPath> {
        path_of(&self.state.tree, id)
    }

    /// Styles of a block as they apply at the active breakpoint
    pub fn resolved_styles(&self, id: &str) -> Option<BTreeMap<String, StyleProperties>> {
        self.resolved_styles_at(id, self.session.breakpoint)
    }

    pub fn resolved_styles_at(
        &self,
        id: &str,
        breakpoint: Breakpoint,
    ) -> Option<BTreeMap<String, StyleProperties>> {
        self.state.tree
            .get(id)
            .map(|node| node.data.styles.resolve_all(breakpoint))
    }

    // Mutations

    /// Apply a mutation, recording history and bumping the revision
    pub fn apply(&mut self, mutation: Mutation) -> Result<MutationResult, EditorError> {
        let structural = mutation.is_structural();
        if structural {
            self.history.commit_pending(&self.state);
        }

        let outcome = mutation.apply(&mut self.state.tree, &mut self.ids)?;
        self.record_change(mutation.name(), structural);

        Ok(MutationResult {
            version: self.revision,
            outcome,
        })
    }

    fn try_apply(&mut self, mutation: Mutation) -> Option<MutationOutcome> {
        let name = mutation.name();
        match self.apply(mutation) {
            Ok(result) => Some(result.outcome),
            Err(e) => {
                tracing::debug!("{} rejected: {}", name, e);
                None
            }
        }
    }

    /// Apply several mutations as one undo entry; all or nothing
    fn apply_batch(
        &mut self,
        mutations: &[Mutation],
        description: &str,
    ) -> Result<Vec<MutationOutcome>, MutationError> {
        self.history.commit_pending(&self.state);

        let mut tree = self.state.tree.clone();
        let outcomes = mutations
            .iter()
            .map(|mutation| mutation.apply(&mut tree, &mut self.ids))
            .collect::<Result<Vec<_>, _>>()?;

        self.state.tree = tree;
        self.record_change(description, true);
        Ok(outcomes)
    }

    fn record_change(&mut self, description: &str, structural: bool) {
        self.revision += 1;
        if structural {
            self.history.record(&self.state, description);
        } else {
            self.history.schedule(self.clock.now(), description);
        }
        self.session.retain_selection(&self.state.tree);
    }

    /// Container styles and depth for a block about to be created inside it
    fn inherit_from(&self, mut block: Block, container: Option<&str>) -> Block {
        if let Some(parent) = container.and_then(|id| self.state.tree.get(id)) {
            block.data.styles = block.data.styles.merged_with(&parent.data.children_base_styles);
            block.data.level = parent.data.level + 1;
        }
        block
    }

    /// Add a new block: at `path` if given, else appended to `parent_id`
    /// (or the root list)
    pub fn add_block(&mut self, block: Block, parent_id: Option<&str>, path: Option<BlockPath>) -> Option<BlockId> {
        let container = match &path {
            Some(path) => match insertion_point(&self.state.tree, path) {
                Ok((container, _)) => container,
                Err(e) => {
                    tracing::debug!("AddBlock rejected: {}", e);
                    return None;
                }
            },
            None => parent_id.map(str::to_string),
        };

        let block = self.inherit_from(block, container.as_deref());
        match self.try_apply(Mutation::AddBlock {
            block,
            parent_id: parent_id.map(str::to_string),
            path,
        })? {
            MutationOutcome::Added(id) => Some(id),
            _ => None,
        }
    }

    /// Where "insert at selection" lands: inside the selection if it
    /// allows nesting, otherwise right after it. Without a selection,
    /// appended to the root list.
    pub fn insertion_context(&self) -> InsertionContext {
        let Some(selected) = self
            .session
            .selected_block_id()
            .and_then(|id| self.state.tree.get(id))
        else {
            return InsertionContext::default();
        };

        if selected.data.allow_nesting {
            InsertionContext {
                parent_id: Some(selected.id.clone()),
                index: None,
            }
        } else {
            InsertionContext {
                parent_id: selected.parent.clone(),
                index: self.state.tree.location(&selected.id).map(|(_, index)| index + 1),
            }
        }
    }

    fn add_mutation(&self, block: Block, context: &InsertionContext) -> Result<Mutation, MutationError> {
        let path = match (&context.parent_id, context.index) {
            (_, None) => None,
            (None, Some(index)) => Some(BlockPath::root(index)),
            (Some(parent), Some(index)) => Some(
                path_of(&self.state.tree, parent)
                    .ok_or_else(|| MutationError::ParentNotFound(parent.clone()))?
                    .child(index),
            ),
        };

        Ok(Mutation::AddBlock {
            block,
            parent_id: context.parent_id.clone(),
            path,
        })
    }

    fn add_in_context(&mut self, block: Block, context: &InsertionContext) -> Option<BlockId> {
        let mutation = match self.add_mutation(block, context) {
            Ok(mutation) => mutation,
            Err(e) => {
                tracing::debug!("AddBlock rejected: {}", e);
                return None;
            }
        };

        match self.try_apply(mutation)? {
            MutationOutcome::Added(id) => {
                self.session.set_selection(Some(id.clone()));
                Some(id)
            }
            _ => None,
        }
    }

    /// Add a block relative to the selection and select it
    pub fn add_block_at_selection(&mut self, block: Block) -> Option<BlockId> {
        let context = self.insertion_context();
        let block = self.inherit_from(block, context.parent_id.as_deref());
        self.add_in_context(block, &context)
    }

    /// Add an empty block of the given type at the selection
    pub fn add_item(&mut self, block_type: BlockType) -> Option<BlockId> {
        self.add_block_at_selection(Block::of_type(block_type))
    }

    /// Delete a block with its subtree, returning what was removed
    pub fn delete_block(&mut self, id: &str) -> Option<Block> {
        match self.try_apply(Mutation::RemoveBlock {
            block_id: id.to_string(),
        })? {
            MutationOutcome::Removed(block) => Some(block),
            _ => None,
        }
    }

    /// Shallow-merge fields into a block (debounced history)
    pub fn update_block(&mut self, id: &str, patch: Map<String, Value>) -> bool {
        self.try_apply(Mutation::UpdateBlock {
            block_id: id.to_string(),
            patch,
        })
        .is_some()
    }

    /// Replace the text of a block that has any
    pub fn set_content(&mut self, id: &str, text: impl Into<String>) -> bool {
        let changed = self
            .state
            .tree
            .data_of_mut(id)
            .is_some_and(|data| data.kind.set_content(text));

        if !changed {
            tracing::debug!("SetContent rejected: {} is missing or has no content", id);
            return false;
        }

        self.record_change("SetContent", false);
        true
    }

    /// Set one style property at the active breakpoint. `Value::Null`
    /// removes it.
    pub fn set_style(&mut self, id: &str, category: &str, property: &str, value: Value) -> bool {
        let breakpoint = self.session.breakpoint;
        let Some(data) = self.state.tree.data_of_mut(id) else {
            tracing::debug!("SetStyle rejected: block {} not found", id);
            return false;
        };

        if value.is_null() {
            data.styles.remove(category, breakpoint, property);
        } else {
            data.styles.set(category, breakpoint, property, value);
        }

        self.record_change("SetStyle", false);
        true
    }

    /// Clone a block right after itself; returns the clone's id
    pub fn duplicate_block(&mut self, id: &str) -> Option<BlockId> {
        match self.try_apply(Mutation::DuplicateBlock {
            block_id: id.to_string(),
        })? {
            MutationOutcome::Duplicated(id) => Some(id),
            _ => None,
        }
    }

    /// Drag-and-drop move between structural paths
    pub fn move_block(&mut self, from: &BlockPath, to: &BlockPath) -> Option<BlockId> {
        match self.try_apply(Mutation::MoveBlock {
            from: from.clone(),
            to: to.clone(),
        })? {
            MutationOutcome::Moved(id) => Some(id),
            _ => None,
        }
    }

    pub fn move_block_into(&mut self, id: &str, new_parent_id: Option<&str>, index: usize) -> bool {
        self.try_apply(Mutation::MoveBlockInto {
            block_id: id.to_string(),
            new_parent_id: new_parent_id.map(str::to_string),
            index,
        })
        .is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.history.is_pending()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.state) {
            Some(tree) => {
                self.restore(tree);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.state) {
            Some(tree) => {
                self.restore(tree);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, state: DocumentState) {
        self.state = state;
        self.revision += 1;
        self.session.retain_selection(&self.state.tree);
    }

    /// Commit a debounced history entry whose quiet period has passed
    pub fn tick(&mut self) -> bool {
        self.history.commit_due(self.clock.now(), &self.state)
    }

    // Clipboard

    /// Remember a block for paste and put its JSON on the clipboard
    pub async fn copy(&mut self, id: &str) -> bool {
        let Some(block) = self.state.tree.subtree(id) else {
            tracing::debug!("Copy rejected: block {} not found", id);
            return false;
        };

        self.clipboard.set_copied(id);
        self.write_clipboard(&block).await;
        true
    }

    /// Like copy; the block is removed when the paste happens
    pub async fn cut(&mut self, id: &str) -> bool {
        let Some(block) = self.state.tree.subtree(id) else {
            tracing::debug!("Cut rejected: block {} not found", id);
            return false;
        };

        self.clipboard.set_cut(id);
        self.write_clipboard(&block).await;
        true
    }

    async fn write_clipboard(&self, block: &Block) {
        let result = match encode_payload(block) {
            Ok(text) => self.clipboard_backend.write_text(&text).await,
            Err(e) => Err(e),
        };

        // The remembered id still works without the system clipboard
        if let Err(e) = result {
            tracing::warn!("Failed to write clipboard: {}", e);
        }
    }

    pub async fn paste(&mut self) -> Option<BlockId> {
        let request = self.begin_paste();
        let text = if request.needs_clipboard() {
            Some(self.clipboard_backend.read_text().await)
        } else {
            None
        };
        self.finish_paste(request, text)
    }

    /// Capture where a paste lands and which remembered block it uses
    pub fn begin_paste(&self) -> PasteRequest {
        let source = self.clipboard.source().cloned();
        let needs_clipboard = source
            .as_ref()
            .map_or(true, |source| !self.state.tree.contains(source.block_id()));

        PasteRequest {
            context: self.insertion_context(),
            source,
            needs_clipboard,
        }
    }

    /// Complete a paste with the clipboard text, if it was read
    pub fn finish_paste(
        &mut self,
        request: PasteRequest,
        clipboard_text: Option<Result<String, ClipboardError>>,
    ) -> Option<BlockId> {
        if let Some(source) = request
            .source
            .as_ref()
            .filter(|source| self.state.tree.contains(source.block_id()))
        {
            return self.paste_remembered(source, &request.context);
        }

        let text = match clipboard_text {
            Some(Ok(text)) => text,
            Some(Err(ClipboardError::Empty)) | None => {
                tracing::debug!("Nothing to paste");
                return None;
            }
            Some(Err(e)) => {
                tracing::warn!("Failed to read clipboard: {}", e);
                return None;
            }
        };

        let block = match decode_payload(&text, &self.config.paste_allow_list) {
            Ok(block) => block,
            Err(e) => {
                tracing::debug!("Paste rejected: {}", e);
                return None;
            }
        };

        self.add_in_context(block.without_ids(), &request.context)
    }

    fn paste_remembered(&mut self, source: &ClipboardSource, context: &InsertionContext) -> Option<BlockId> {
        let source_id = source.block_id();
        let copy = self.state.tree.subtree(source_id)?.without_ids();

        match source {
            ClipboardSource::Copied(_) => self.add_in_context(copy, context),
            ClipboardSource::Cut(_) => {
                if let Some(parent) = &context.parent_id {
                    if parent == source_id || self.state.tree.is_ancestor(source_id, parent) {
                        tracing::debug!("Paste rejected: cannot paste {} inside itself", source_id);
                        return None;
                    }
                }

                let mutations = match self.add_mutation(copy, context) {
                    Ok(add) => [
                        add,
                        Mutation::RemoveBlock {
                            block_id: source_id.to_string(),
                        },
                    ],
                    Err(e) => {
                        tracing::debug!("Paste rejected: {}", e);
                        return None;
                    }
                };

                match self.apply_batch(&mutations, "CutPaste") {
                    Ok(outcomes) => {
                        self.clipboard.clear();
                        match outcomes.into_iter().next() {
                            Some(MutationOutcome::Added(id)) => {
                                self.session.set_selection(Some(id.clone()));
                                Some(id)
                            }
                            _ => None,
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Paste rejected: {}", e);
                        None
                    }
                }
            }
        }
    }

    // Forms

    pub fn forms(&self) -> &[FormItem] {
        &self.state.forms
    }

    pub fn form(&self, id: &str) -> Option<&FormItem> {
        self.state.forms.iter().find(|form| form.id == id)
    }

    /// Add a form, stamping a fresh id if it has none or a taken one
    pub fn add_form(&mut self, mut form: FormItem) -> String {
        if form.id.is_empty() || self.form(&form.id).is_some() {
            let forms = &self.state.forms;
            form.id = self
                .ids
                .new_id_where(|candidate| forms.iter().any(|existing| existing.id == candidate));
        }

        self.history.commit_pending(&self.state);
        let id = form.id.clone();
        self.state.forms.push(form);
        self.record_change("AddForm", true);
        id
    }

    /// Replace the form with the same id
    pub fn update_form(&mut self, form: FormItem) -> bool {
        let Some(index) = self.state.forms.iter().position(|existing| existing.id == form.id) else {
            tracing::debug!("UpdateForm rejected: form {} not found", form.id);
            return false;
        };

        self.history.commit_pending(&self.state);
        self.state.forms[index] = form;
        self.record_change("UpdateForm", true);
        true
    }

    /// Remove a form and clear every block reference to it, as one undo
    /// step
    pub fn remove_form(&mut self, id: &str) -> Option<FormItem> {
        let index = self.state.forms.iter().position(|form| form.id == id)?;

        self.history.commit_pending(&self.state);
        let form = self.state.forms.remove(index);
        let mut cleared = 0;
        for (_, data) in self.state.tree.data_mut() {
            if data.kind.clear_form_ref(id) {
                cleared += 1;
            }
        }

        tracing::debug!("Removed form {} and {} references to it", id, cleared);
        self.record_change("RemoveForm", true);
        Some(form)
    }

    // Settings

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
        self.revision += 1;
    }

    // Persistence

    pub fn to_persisted(&self) -> PersistedDocument {
        PersistedDocument {
            settings: self.settings.clone(),
            content: DocumentContent {
                blocks: self.state.tree.to_blocks(),
                forms: self.state.forms.clone(),
            },
            is_draft: self.is_draft,
        }
    }

    fn save_request(&mut self, explicit: bool) -> SaveRequest {
        let ticket = self.autosave.begin(explicit);

        let target = if let Some(id) = &self.document_id {
            SaveTarget::Update(id.clone())
        } else if let Some((_, assigned)) = &self.pending_create {
            SaveTarget::AfterCreate(assigned.clone())
        } else {
            let (sender, assigned) = watch::channel(CreateState::Pending);
            self.pending_create = Some((ticket, assigned));
            SaveTarget::Create(sender)
        };

        SaveRequest::new(self.to_persisted(), self.revision, explicit, ticket, target)
    }

    /// Start a user-triggered save. Always runs, and resumes a paused
    /// autosave. While the first create is still running the request
    /// waits for it and updates the new document.
    pub fn begin_save(&mut self, is_draft: bool) -> SaveRequest {
        self.is_draft = is_draft;
        self.save_request(true)
    }

    /// Start an autosave if there is anything to save and autosave is
    /// neither paused nor already running
    pub fn begin_autosave(&mut self) -> Option<SaveRequest> {
        if !self.is_dirty() || self.autosave.is_paused() || self.autosave.is_in_flight() {
            return None;
        }
        Some(self.save_request(false))
    }

    /// Record how a save went. Edits made while it was in flight keep the
    /// document dirty.
    pub fn finish_save(&mut self, request: &SaveRequest, result: &Result<String, PersistenceError>) -> AutosaveStatus {
        if self
            .pending_create
            .as_ref()
            .is_some_and(|(ticket, _)| *ticket == request.ticket())
        {
            self.pending_create = None;
        }

        match result {
            Ok(id) => {
                if self.document_id.is_none() {
                    tracing::info!("Document created with id {}", id);
                    self.document_id = Some(id.clone());
                }
                self.saved_revision = self.saved_revision.max(request.revision);
                tracing::info!("Saved document {} at revision {}", id, request.revision);
                self.autosave.record_success(request.ticket())
            }
            Err(e) => {
                tracing::warn!("Failed to save document: {}", e);
                let status = self.autosave.record_failure(request.ticket());
                if status == AutosaveStatus::Paused {
                    tracing::warn!(
                        "Autosave paused after {} consecutive failures",
                        self.autosave.failures()
                    );
                }
                status
            }
        }
    }

    /// Explicit save; returns the stored document id
    pub async fn save(
        &mut self,
        service: &dyn PersistenceService,
        is_draft: bool,
    ) -> Result<String, PersistenceError> {
        let request = self.begin_save(is_draft);
        let result = request.execute(service).await;
        self.finish_save(&request, &result);
        result
    }

    /// Save if dirty, unless autosave is paused
    pub async fn autosave(&mut self, service: &dyn PersistenceService) -> AutosaveStatus {
        let Some(request) = self.begin_autosave() else {
            return if self.autosave.is_paused() {
                AutosaveStatus::Paused
            } else {
                AutosaveStatus::Idle
            };
        };

        let result = request.execute(service).await;
        self.finish_save(&request, &result)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::debounce::ManualClock;
    use crate::styles::Styles;
    use serde_json::json;
    use std::time::Duration;

    fn store() -> (DocumentStore, ManualClock) {
        let clock = ManualClock::new();
        let store = DocumentStore::default()
            .with_clock(Arc::new(clock.clone()))
            .with_id_generator(IdGenerator::from_seed("d"));
        (store, clock)
    }

    fn text(content: &str) -> Block {
        Block::new(BlockKind::Text {
            content: content.to_string(),
        })
    }

    #[test]
    fn test_add_image_to_empty_document() {
        let (mut store, _) = store();

        let id = store.add_block(Block::of_type(BlockType::Image), None, None).unwrap();

        assert_eq!(store.tree().roots(), &[id.clone()]);
        assert_eq!(store.find_block(&id).unwrap().data.block_type(), BlockType::Image);
        assert!(store.is_dirty());
        assert!(store.can_undo());
    }

    #[test]
    fn test_add_inside_container_inherits_base_styles() {
        let (mut store, _) = store();
        let base = Styles::new()
            .with("typography", Breakpoint::Desktop, "color", json!("red"))
            .with("spacing", Breakpoint::Desktop, "margin", json!(4));
        let container = store
            .add_block(
                Block::of_type(BlockType::Container).with_children_base_styles(base),
                None,
                None,
            )
            .unwrap();

        let own = Styles::new().with("typography", Breakpoint::Desktop, "color", json!("blue"));
        let child = store
            .add_block(text("hi").with_styles(own), Some(&container), None)
            .unwrap();

        let node = store.find_block(&child).unwrap();
        assert_eq!(node.data.level, 1);
        let resolved = store.resolved_styles(&child).unwrap();
        assert_eq!(resolved["typography"]["color"], json!("blue"));
        assert_eq!(resolved["spacing"]["margin"], json!(4));
    }

    #[test]
    fn test_add_at_selection_respects_allow_nesting() {
        let (mut store, _) = store();
        let container = store.add_item(BlockType::Container).unwrap();
        let inner = store.add_item(BlockType::Text).unwrap();

        assert_eq!(store.find_block(&inner).unwrap().parent.as_deref(), Some(container.as_str()));
        assert_eq!(store.selected_block_id(), Some(inner.as_str()));

        // Text does not nest: the next block lands beside it
        let sibling = store.add_item(BlockType::Divider).unwrap();
        assert_eq!(
            store.find_block(&container).unwrap().children,
            vec![inner.clone(), sibling.clone()]
        );

        store.select_block(Some(&inner));
        let between = store.add_item(BlockType::Quote).unwrap();
        assert_eq!(
            store.find_block(&container).unwrap().children,
            vec![inner, between, sibling]
        );
    }

    #[test]
    fn test_deleting_selected_ancestor_clears_selection() {
        let (mut store, _) = store();
        let container = store.add_item(BlockType::Container).unwrap();
        let inner = store.add_item(BlockType::Text).unwrap();
        assert_eq!(store.selected_block_id(), Some(inner.as_str()));

        let removed = store.delete_block(&container).unwrap();

        assert_eq!(removed.ids(), vec![container, inner]);
        assert_eq!(store.selected_block_id(), None);
        assert!(store.tree().is_empty());
    }

    #[test]
    fn test_missing_targets_are_noops() {
        let (mut store, _) = store();
        let revision = store.revision();

        assert_eq!(store.delete_block("ghost"), None);
        assert_eq!(store.duplicate_block("ghost"), None);
        assert!(!store.set_content("ghost", "x"));
        assert!(!store.select_block(Some("ghost")));
        assert_eq!(store.move_block(&"0".parse().unwrap(), &"1".parse().unwrap()), None);
        assert_eq!(store.add_block(text("x"), Some("ghost"), None), None);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_content_edits_are_debounced() {
        let (mut store, clock) = store();
        let id = store.add_block(text(""), None, None).unwrap();
        let levels = store.history().undo_levels();

        for word in ["h", "he", "hel", "hello"] {
            assert!(store.set_content(&id, word));
            clock.advance(Duration::from_millis(100));
            assert!(!store.tick());
        }

        clock.advance(Duration::from_millis(500));
        assert!(store.tick());
        assert_eq!(store.history().undo_levels(), levels + 1);

        assert!(store.undo());
        assert_eq!(store.find_block(&id).unwrap().data.kind.content(), Some(""));
    }

    #[test]
    fn test_structural_op_commits_pending_edit() {
        let (mut store, _) = store();
        let id = store.add_block(text("a"), None, None).unwrap();

        store.set_content(&id, "b");
        store.add_block(text("c"), None, None);
        assert!(store.undo());

        assert_eq!(store.tree().len(), 1);
        assert_eq!(store.find_block(&id).unwrap().data.kind.content(), Some("b"));
    }

    #[test]
    fn test_set_style_uses_active_breakpoint() {
        let (mut store, _) = store();
        let id = store.add_block(text("x"), None, None).unwrap();

        store.set_style(&id, "layout", "width", json!("100%"));
        store.set_breakpoint(Breakpoint::Mobile);
        store.set_style(&id, "layout", "padding", json!(2));

        let desktop = store.resolved_styles_at(&id, Breakpoint::Desktop).unwrap();
        let mobile = store.resolved_styles(&id).unwrap();
        assert!(!desktop["layout"].contains_key("padding"));
        assert_eq!(mobile["layout"]["width"], json!("100%"));
        assert_eq!(mobile["layout"]["padding"], json!(2));

        store.set_style(&id, "layout", "padding", Value::Null);
        assert!(!store.resolved_styles(&id).unwrap()["layout"].contains_key("padding"));
    }

    #[test]
    fn test_remove_form_clears_references() {
        let (mut store, _) = store();
        let form_id = store.add_form(FormItem {
            id: String::new(),
            name: "Signup".to_string(),
            fields: vec![],
        });
        let block = store
            .add_block(
                Block::new(BlockKind::Form {
                    form_id: Some(form_id.clone()),
                }),
                None,
                None,
            )
            .unwrap();

        let removed = store.remove_form(&form_id).unwrap();

        assert_eq!(removed.name, "Signup");
        assert!(store.forms().is_empty());
        assert!(store.find_block(&block).is_some());
        assert_eq!(store.find_block(&block).unwrap().data.kind.form_id(), None);
    }

    #[test]
    fn test_load_resets_session() {
        let (mut store, _) = store();
        store.add_item(BlockType::Text);

        let document: PersistedDocument = serde_json::from_value(json!({
            "title": "Home",
            "content": { "blocks": [{ "id": "x", "type": "divider" }], "forms": [] },
            "isDraft": false
        }))
        .unwrap();
        store.load(Some("doc-1".to_string()), document).unwrap();

        assert_eq!(store.document_id(), Some("doc-1"));
        assert_eq!(store.tree().roots(), &["x".to_string()]);
        assert_eq!(store.selected_block_id(), None);
        assert!(!store.is_dirty());
        assert!(!store.can_undo());
        assert_eq!(store.settings()["title"], json!("Home"));
    }

    #[test]
    fn test_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::config::DEFAULT_CONFIG_NAME),
            r#"{ "defaultBreakpoint": "tablet", "maxHistoryEntries": 7 }"#,
        )
        .unwrap();

        let store = DocumentStore::from_config_dir(dir.path()).unwrap();
        assert_eq!(store.breakpoint(), Breakpoint::Tablet);
        assert_eq!(store.config().max_history_entries, 7);

        std::fs::write(dir.path().join(crate::config::DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(matches!(
            DocumentStore::from_config_dir(dir.path()),
            Err(EditorError::Config(_))
        ));
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let (mut store, _) = store();
        let document: PersistedDocument = serde_json::from_value(json!({
            "content": { "blocks": [{ "id": "x", "type": "text" }, { "id": "x", "type": "text" }] }
        }))
        .unwrap();

        assert!(matches!(
            store.load(None, document),
            Err(EditorError::Mutation(MutationError::DuplicateId(_)))
        ));
    }
}

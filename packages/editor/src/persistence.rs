//! # Persistence
//!
//! The editor hands finished documents to an external service and never
//! reads them back on its own. The wire shape is:
//!
//! ```json
//! { "title": "...", "slug": "...", "content": { "blocks": [], "forms": [] }, "isDraft": true }
//! ```
//!
//! Settings fields are free-form and flattened next to `content`.
//!
//! Autosave failures are counted; after `max_retries` consecutive failures
//! autosave pauses until the next explicit save.
//!
//! A document is created once. Saves started while its first create is
//! still running wait for the assigned id and update it.

use crate::block::{Block, FormItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

pub const DEFAULT_AUTOSAVE_MAX_RETRIES: u32 = 3;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Save rejected: {0}")]
    Rejected(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Blocks and forms of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    #[serde(default)]
    pub blocks: Vec<Block>,

    #[serde(default)]
    pub forms: Vec<FormItem>,
}

/// Document as sent to the persistence service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    /// Title, slug, description, ... as given by the host application
    #[serde(flatten)]
    pub settings: Map<String, Value>,

    #[serde(default)]
    pub content: DocumentContent,

    #[serde(default)]
    pub is_draft: bool,
}

impl PersistedDocument {
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Create/update endpoint for documents
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Store a new document, returning its assigned id
    async fn create(&self, document: &PersistedDocument) -> Result<String, PersistenceError>;

    async fn update(&self, id: &str, document: &PersistedDocument) -> Result<(), PersistenceError>;

    async fn load(&self, id: &str) -> Result<PersistedDocument, PersistenceError>;
}

/// Outcome of a document's first create, as seen by saves waiting on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CreateState {
    Pending,
    Created(String),
    Failed,
}

/// Where a save goes
#[derive(Debug)]
pub(crate) enum SaveTarget {
    Update(String),

    /// First save of the document; publishes the assigned id
    Create(watch::Sender<CreateState>),

    /// Started while the first create was running
    AfterCreate(watch::Receiver<CreateState>),
}

/// Everything needed to run one save without holding the document store
#[derive(Debug)]
pub struct SaveRequest {
    pub document: PersistedDocument,

    /// Document revision captured with the payload
    pub revision: u64,

    /// User-triggered rather than autosave
    pub explicit: bool,

    ticket: u64,

    target: SaveTarget,
}

impl SaveRequest {
    pub(crate) fn new(
        document: PersistedDocument,
        revision: u64,
        explicit: bool,
        ticket: u64,
        target: SaveTarget,
    ) -> Self {
        Self {
            document,
            revision,
            explicit,
            ticket,
            target,
        }
    }

    /// Identifies this request among the saves in flight
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Id the document is known under when the request was made
    pub fn document_id(&self) -> Option<&str> {
        match &self.target {
            SaveTarget::Update(id) => Some(id),
            SaveTarget::Create(_) | SaveTarget::AfterCreate(_) => None,
        }
    }

    /// Whether this request creates the document
    pub fn is_create(&self) -> bool {
        matches!(self.target, SaveTarget::Create(_))
    }

    /// Create or update the document. Returns the id it is stored under.
    ///
    /// A request started while the first create was in flight waits for
    /// that create and then updates the assigned id. If the create failed
    /// it creates the document itself.
    pub async fn execute(&self, service: &dyn PersistenceService) -> Result<String, PersistenceError> {
        match &self.target {
            SaveTarget::Update(id) => {
                service.update(id, &self.document).await?;
                Ok(id.clone())
            }
            SaveTarget::Create(assigned) => match service.create(&self.document).await {
                Ok(id) => {
                    assigned.send_replace(CreateState::Created(id.clone()));
                    Ok(id)
                }
                Err(e) => {
                    assigned.send_replace(CreateState::Failed);
                    Err(e)
                }
            },
            SaveTarget::AfterCreate(assigned) => {
                let mut assigned = assigned.clone();
                let state = assigned
                    .wait_for(|state| *state != CreateState::Pending)
                    .await
                    .map(|state| state.clone())
                    .unwrap_or(CreateState::Failed);

                match state {
                    CreateState::Created(id) => {
                        service.update(&id, &self.document).await?;
                        Ok(id)
                    }
                    CreateState::Pending | CreateState::Failed => {
                        tracing::debug!("First create did not finish, creating instead");
                        service.create(&self.document).await
                    }
                }
            }
        }
    }
}

/// Where autosave stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveStatus {
    /// Nothing to do
    Idle,
    Saved,
    /// Failed, will retry on the next trigger
    Failed { attempts: u32 },
    /// Too many failures; waiting for an explicit save
    Paused,
}

/// Retry bookkeeping for autosave
#[derive(Debug, Clone)]
pub struct AutosaveState {
    failures: u32,
    max_retries: u32,
    paused: bool,
    /// Tickets of saves not finished yet
    in_flight: BTreeSet<u64>,
    next_ticket: u64,
    last_saved_at: Option<DateTime<Utc>>,
}

impl AutosaveState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            failures: 0,
            max_retries,
            paused: false,
            in_flight: BTreeSet::new(),
            next_ticket: 0,
            last_saved_at: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether any save is still running
    pub fn is_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Register a save and hand out its ticket
    pub(crate) fn begin(&mut self, explicit: bool) -> u64 {
        if explicit {
            self.failures = 0;
            self.paused = false;
        }
        self.next_ticket += 1;
        self.in_flight.insert(self.next_ticket);
        self.next_ticket
    }

    pub(crate) fn record_success(&mut self, ticket: u64) -> AutosaveStatus {
        self.in_flight.remove(&ticket);
        self.failures = 0;
        self.paused = false;
        self.last_saved_at = Some(Utc::now());
        AutosaveStatus::Saved
    }

    pub(crate) fn record_failure(&mut self, ticket: u64) -> AutosaveStatus {
        self.in_flight.remove(&ticket);
        self.failures += 1;
        if self.failures >= self.max_retries {
            self.paused = true;
            AutosaveStatus::Paused
        } else {
            AutosaveStatus::Failed {
                attempts: self.failures,
            }
        }
    }
}

impl Default for AutosaveState {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_MAX_RETRIES)
    }
}

/// In-memory service with failure injection
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    documents: Mutex<HashMap<String, PersistedDocument>>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Number of create/update calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &str) -> Option<PersistedDocument> {
        self.documents.lock().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            Err(PersistenceError::Rejected("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn store(&self, id: String, document: &PersistedDocument) -> Result<(), PersistenceError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        documents.insert(id, document.clone());
        Ok(())
    }
}

#[async_trait]
impl PersistenceService for MemoryPersistence {
    async fn create(&self, document: &PersistedDocument) -> Result<String, PersistenceError> {
        self.check_failure()?;
        let id = Uuid::new_v4().to_string();
        self.store(id.clone(), document)?;
        Ok(id)
    }

    async fn update(&self, id: &str, document: &PersistedDocument) -> Result<(), PersistenceError> {
        self.check_failure()?;
        if self.get(id).is_none() {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        self.store(id.to_string(), document)
    }

    async fn load(&self, id: &str) -> Result<PersistedDocument, PersistenceError> {
        self.get(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }
}

/// Stores each document as `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::Rejected(format!("invalid document id: {:?}", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn write(&self, id: &str, document: &PersistedDocument) -> Result<(), PersistenceError> {
        let path = self.document_path(id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, document.to_json_pretty()?).await?;
        tracing::debug!("Wrote document {} to {}", id, path.display());
        Ok(())
    }
}

#[async_trait]
impl PersistenceService for FilePersistence {
    async fn create(&self, document: &PersistedDocument) -> Result<String, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        self.write(&id, document).await?;
        Ok(id)
    }

    async fn update(&self, id: &str, document: &PersistedDocument) -> Result<(), PersistenceError> {
        let path = self.document_path(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        self.write(id, document).await
    }

    async fn load(&self, id: &str) -> Result<PersistedDocument, PersistenceError> {
        let path = self.document_path(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        PersistedDocument::from_json(&json)
    }
}

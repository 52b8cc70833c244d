//! Storage collaborator interfaces
//!
//! Object storage and the relational store are external collaborators
//! reached through narrow capability traits, so any concrete provider can
//! be substituted. The pipeline reads a handful of fields and appends
//! immutable history facts; it has no undo logic of its own.

use crate::error::{MaskGuardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Object storage capability: write-once blob uploads returning a URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under `bucket/filename`.
    ///
    /// Uploads are never overwritten; a name collision is an error.
    ///
    /// # Errors
    /// Returns `MaskGuardError::Upload` when the store rejects the write
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}

/// New generated-image record written to the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImageRecord {
    /// Storage URL of the uploaded image
    pub url: String,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// Action type recorded on history rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    /// Mask-guided inpaint of selected regions
    MaskedEdit,
    /// Whole-segment restyle
    Restyle,
    /// Independent whole-page section generation
    SectionGenerate,
}

/// Immutable history row enabling external undo tooling to reconstruct
/// prior states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    /// Image previously attached to the section, if any
    pub previous_image_id: Option<String>,
    /// Image now attached to the section
    pub new_image_id: String,
    /// What kind of edit produced the new image
    pub action: EditAction,
    /// Instruction text that drove the edit
    pub prompt: String,
}

/// Relational store capability: the few reads and writes the pipeline needs
#[async_trait]
pub trait EditLedger: Send + Sync {
    /// Insert a new generated-image record, returning its id
    ///
    /// # Errors
    /// Returns `MaskGuardError::Internal` on store failures
    async fn record_generated_image(&self, record: GeneratedImageRecord) -> Result<String>;

    /// Point the owning section record at a new image id
    ///
    /// # Errors
    /// Returns `MaskGuardError::Internal` on store failures
    async fn update_section_pointer(&self, section_id: &str, image_id: &str) -> Result<()>;

    /// Append an immutable history row
    ///
    /// # Errors
    /// Returns `MaskGuardError::Internal` on store failures
    async fn append_history(&self, entry: EditHistoryEntry) -> Result<()>;
}

/// Upload filename for one segment of a restyle run:
/// `restyle-<timestamp>-seg-<index>.png`
#[must_use]
pub fn restyle_filename(timestamp: DateTime<Utc>, index: usize) -> String {
    format!("restyle-{}-seg-{index}.png", timestamp.timestamp_millis())
}

/// Upload filename for an independently generated section:
/// `section-<timestamp>-<section_id>.png`
#[must_use]
pub fn section_filename(timestamp: DateTime<Utc>, section_id: &str) -> String {
    format!("section-{}-{section_id}.png", timestamp.timestamp_millis())
}

/// In-memory blob store for tests and offline runs
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob lock poisoned").len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch stored bytes by full key `bucket/filename`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("blob lock poisoned")
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let key = format!("{bucket}/{filename}");
        let mut blobs = self.blobs.lock().expect("blob lock poisoned");
        if blobs.contains_key(&key) {
            return Err(MaskGuardError::upload(format!(
                "object '{key}' already exists and uploads are write-once"
            )));
        }
        blobs.insert(key.clone(), (bytes, content_type.to_string()));
        Ok(format!("memory://{key}"))
    }
}

/// In-memory ledger for tests and offline runs
#[derive(Default)]
pub struct MemoryEditLedger {
    state: Mutex<MemoryLedgerState>,
}

#[derive(Default)]
struct MemoryLedgerState {
    next_id: u64,
    images: Vec<(String, GeneratedImageRecord)>,
    pointers: HashMap<String, String>,
    history: Vec<EditHistoryEntry>,
}

impl MemoryEditLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Section pointer, if one was written
    #[must_use]
    pub fn section_pointer(&self, section_id: &str) -> Option<String> {
        self.state
            .lock()
            .expect("ledger lock poisoned")
            .pointers
            .get(section_id)
            .cloned()
    }

    /// Copy of the append-only history
    #[must_use]
    pub fn history(&self) -> Vec<EditHistoryEntry> {
        self.state
            .lock()
            .expect("ledger lock poisoned")
            .history
            .clone()
    }

    /// Number of image records written
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.state.lock().expect("ledger lock poisoned").images.len()
    }
}

#[async_trait]
impl EditLedger for MemoryEditLedger {
    async fn record_generated_image(&self, record: GeneratedImageRecord) -> Result<String> {
        let mut state = self.state.lock().expect("ledger lock poisoned");
        state.next_id += 1;
        let id = format!("img-{}", state.next_id);
        state.images.push((id.clone(), record));
        Ok(id)
    }

    async fn update_section_pointer(&self, section_id: &str, image_id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("ledger lock poisoned");
        state
            .pointers
            .insert(section_id.to_string(), image_id.to_string());
        Ok(())
    }

    async fn append_history(&self, entry: EditHistoryEntry) -> Result<()> {
        let mut state = self.state.lock().expect("ledger lock poisoned");
        state.history.push(entry);
        Ok(())
    }
}

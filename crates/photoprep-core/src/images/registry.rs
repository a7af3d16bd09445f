//! In-memory registry of images known to this client session.
//!
//! Entries keep insertion order; a status change never moves an entry.
//! Status transitions are crate-private so only the processing
//! coordinator can drive them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Client-side identifier of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocalId(u64);

impl LocalId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Server-issued image identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing lifecycle of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Uploaded, not yet processed. The server calls this `pending`.
    #[serde(alias = "pending")]
    Uploaded,
    Processing,
    Completed,
    /// Only reported by the server's history. Local failed attempts return
    /// to `Uploaded` with the reason kept as `last_error`.
    Failed,
}

impl ImageStatus {
    /// True when a processing request may be issued from this status.
    pub fn is_processable(self) -> bool {
        matches!(self, ImageStatus::Uploaded | ImageStatus::Failed)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStatus::Uploaded => write!(f, "uploaded"),
            ImageStatus::Processing => write!(f, "processing"),
            ImageStatus::Completed => write!(f, "completed"),
            ImageStatus::Failed => write!(f, "failed"),
        }
    }
}

// The result URL lives inside `Completed`, so "has a result" and
// "is completed" cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Uploaded,
    Processing,
    Completed { result_url: String },
}

impl Stage {
    fn status(&self) -> ImageStatus {
        match self {
            Stage::Uploaded => ImageStatus::Uploaded,
            Stage::Processing => ImageStatus::Processing,
            Stage::Completed { .. } => ImageStatus::Completed,
        }
    }
}

/// An image tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedImage {
    local_id: LocalId,
    remote_id: RemoteId,
    file_name: String,
    source: Bytes,
    preview_url: String,
    stage: Stage,
    last_error: Option<String>,
}

impl ManagedImage {
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn remote_id(&self) -> &RemoteId {
        &self.remote_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Original bytes as uploaded.
    pub fn source(&self) -> &Bytes {
        &self.source
    }

    /// URL of the original ("before") image.
    pub fn preview_url(&self) -> &str {
        &self.preview_url
    }

    pub fn status(&self) -> ImageStatus {
        self.stage.status()
    }

    /// URL of the processed ("after") image; `Some` iff completed.
    pub fn result_url(&self) -> Option<&str> {
        match &self.stage {
            Stage::Completed { result_url } => Some(result_url),
            _ => None,
        }
    }

    /// Reason of the most recent failed processing attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Vec<ManagedImage>,
    selected: Option<LocalId>,
    next_id: u64,
}

impl RegistryInner {
    fn entry_mut(&mut self, id: LocalId) -> Option<&mut ManagedImage> {
        self.entries.iter_mut().find(|e| e.local_id == id)
    }

    fn remove_where(&mut self, pred: impl Fn(&ManagedImage) -> bool) -> Option<ManagedImage> {
        let index = self.entries.iter().position(pred)?;
        let removed = self.entries.remove(index);
        if self.selected == Some(removed.local_id) {
            self.selected = None;
        }
        Some(removed)
    }
}

/// Insertion-ordered collection of [`ManagedImage`]s.
#[derive(Debug, Clone, Default)]
pub struct ImageRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly uploaded image in status `uploaded`.
    pub fn register(
        &self,
        remote_id: RemoteId,
        file_name: impl Into<String>,
        source: Bytes,
        preview_url: impl Into<String>,
    ) -> ManagedImage {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let image = ManagedImage {
            local_id: LocalId(inner.next_id),
            remote_id,
            file_name: file_name.into(),
            source,
            preview_url: preview_url.into(),
            stage: Stage::Uploaded,
            last_error: None,
        };
        inner.entries.push(image.clone());
        image
    }

    pub fn get(&self, id: LocalId) -> Option<ManagedImage> {
        self.inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.local_id == id)
            .cloned()
    }

    pub fn find_by_remote(&self, remote_id: &RemoteId) -> Option<ManagedImage> {
        self.inner
            .borrow()
            .entries
            .iter()
            .find(|e| &e.remote_id == remote_id)
            .cloned()
    }

    pub fn contains(&self, id: LocalId) -> bool {
        self.inner.borrow().entries.iter().any(|e| e.local_id == id)
    }

    /// All entries in insertion order.
    pub fn list(&self) -> Vec<ManagedImage> {
        self.inner.borrow().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Removes an entry locally; clears the comparison selection if it
    /// pointed at it. No server-side deletion.
    pub fn remove(&self, id: LocalId) -> Option<ManagedImage> {
        self.inner.borrow_mut().remove_where(|e| e.local_id == id)
    }

    pub fn remove_by_remote(&self, remote_id: &RemoteId) -> Option<ManagedImage> {
        self.inner
            .borrow_mut()
            .remove_where(|e| &e.remote_id == remote_id)
    }

    /// Selects an entry for comparison. Returns false for unknown ids.
    pub fn select(&self, id: LocalId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let known = inner.entries.iter().any(|e| e.local_id == id);
        if known {
            inner.selected = Some(id);
        }
        known
    }

    pub fn clear_selection(&self) {
        self.inner.borrow_mut().selected = None;
    }

    pub fn selected(&self) -> Option<ManagedImage> {
        let inner = self.inner.borrow();
        let id = inner.selected?;
        inner.entries.iter().find(|e| e.local_id == id).cloned()
    }

    /// Drops every entry (session teardown).
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.selected = None;
    }

    /// `uploaded -> processing`. Returns false if the entry is missing or
    /// not in a processable status.
    pub(crate) fn begin_processing(&self, id: LocalId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };
        if !entry.status().is_processable() {
            return false;
        }
        entry.stage = Stage::Processing;
        true
    }

    /// `processing -> completed`. Returns false if the entry is gone.
    pub(crate) fn complete(&self, id: LocalId, result_url: String) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };
        entry.stage = Stage::Completed { result_url };
        entry.last_error = None;
        true
    }

    /// `processing -> uploaded`, recording the reason. Entries in any other
    /// status are left alone. Returns false if nothing was reverted.
    pub(crate) fn revert(&self, id: LocalId, reason: String) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };
        if entry.stage != Stage::Processing {
            return false;
        }
        entry.stage = Stage::Uploaded;
        entry.last_error = Some(reason);
        true
    }
}

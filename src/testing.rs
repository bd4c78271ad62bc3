//! In-process fakes shared by unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::{
    connectivity::Connectivity,
    domain::{Book, Highlight, HighlightEdit, Position, Progress, SyncStatus},
    remote_client::{CreateHighlightRequest, RemoteAuthority, RemoteHighlight},
    storage::OfflineStore,
};

/// Remote authority that records every call as `kind:detail`.
#[derive(Default)]
pub struct RecordingRemote {
    calls: Mutex<Vec<String>>,
    fail_creates: bool,
    pub fail_all: AtomicBool,
    /// When set, the next `create_highlight` waits for a notification before answering.
    gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingRemote {
    pub fn failing_creates() -> Self {
        Self {
            fail_creates: true,
            ..Default::default()
        }
    }

    /// Holds the first create until `gate` is notified; later creates answer at once.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Mutex::new(Some(gate)),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> anyhow::Result<usize> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("remote unavailable");
        }
        Ok(calls.len())
    }
}

#[async_trait::async_trait]
impl RemoteAuthority for RecordingRemote {
    async fn create_highlight(
        &self,
        request: &CreateHighlightRequest,
    ) -> anyhow::Result<RemoteHighlight> {
        let n = self.record(format!("create:{}", request.text))?;
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_creates {
            anyhow::bail!("network down");
        }
        Ok(RemoteHighlight {
            id: format!("srv-{}", n),
            text: request.text.clone(),
            color: Some(request.color.clone()),
            start_cfi: request.start_cfi.clone(),
            end_cfi: None,
            page_number: request.page_number,
        })
    }

    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()> {
        self.record(format!("delete:{}", id)).map(|_| ())
    }

    async fn save_progress(
        &self,
        book_id: &str,
        _position: &Position,
        fraction: f64,
    ) -> anyhow::Result<()> {
        self.record(format!("progress:{}:{}", book_id, fraction))
            .map(|_| ())
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("remote unavailable");
        }
        Ok(())
    }
}

pub struct FixedConnectivity(pub AtomicBool);

impl FixedConnectivity {
    pub fn new(online: bool) -> Self {
        Self(AtomicBool::new(online))
    }
}

impl Connectivity for FixedConnectivity {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store that never suspends, so paused-clock tests are deterministic.
#[derive(Default)]
pub struct MemoryStore {
    books: Mutex<HashMap<String, Book>>,
    highlights: Mutex<HashMap<String, Highlight>>,
    progress: Mutex<HashMap<(String, String), Progress>>,
}

#[async_trait::async_trait]
impl OfflineStore for MemoryStore {
    async fn get_book(&self, id: &str) -> anyhow::Result<Option<Book>> {
        Ok(self.books.lock().unwrap().get(id).cloned())
    }

    async fn put_book(&self, book: &Book) -> anyhow::Result<()> {
        self.books
            .lock()
            .unwrap()
            .insert(book.id.clone(), book.clone());
        Ok(())
    }

    async fn list_books(&self, user_id: &str) -> anyhow::Result<Vec<Book>> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_highlight(&self, id: &str) -> anyhow::Result<Option<Highlight>> {
        Ok(self.highlights.lock().unwrap().get(id).cloned())
    }

    async fn get_highlights_for_book(&self, book_id: &str) -> anyhow::Result<Vec<Highlight>> {
        Ok(self
            .highlights
            .lock()
            .unwrap()
            .values()
            .filter(|h| h.book_id == book_id && h.sync_status != SyncStatus::PendingDelete)
            .cloned()
            .collect())
    }

    async fn get_highlights_by_status(
        &self,
        status: SyncStatus,
    ) -> anyhow::Result<Vec<Highlight>> {
        Ok(self
            .highlights
            .lock()
            .unwrap()
            .values()
            .filter(|h| h.sync_status == status)
            .cloned()
            .collect())
    }

    async fn put_highlight(&self, highlight: &Highlight) -> anyhow::Result<()> {
        anyhow::ensure!(highlight.has_consistent_identity(), "inconsistent identity");
        self.highlights
            .lock()
            .unwrap()
            .insert(highlight.id.clone(), highlight.clone());
        Ok(())
    }

    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()> {
        self.highlights.lock().unwrap().remove(id);
        Ok(())
    }

    async fn promote_highlight(&self, temp_id: &str, remote_id: &str) -> anyhow::Result<bool> {
        let mut highlights = self.highlights.lock().unwrap();
        match highlights.get(temp_id) {
            Some(h) if h.sync_status == SyncStatus::PendingCreate => {}
            _ => return Ok(false),
        }
        let Some(mut h) = highlights.remove(temp_id) else {
            return Ok(false);
        };
        h.id = remote_id.to_string();
        h.sync_status = SyncStatus::Synced;
        h.temp_id = None;
        highlights.insert(h.id.clone(), h);
        Ok(true)
    }

    async fn edit_highlight(
        &self,
        user_id: &str,
        id: &str,
        edit: &HighlightEdit,
    ) -> anyhow::Result<Option<Highlight>> {
        let mut highlights = self.highlights.lock().unwrap();
        let Some(h) = highlights
            .get_mut(id)
            .filter(|h| h.user_id == user_id && h.sync_status.is_visible())
        else {
            return Ok(None);
        };
        if let Some(note) = &edit.note {
            h.note = note.clone();
        }
        if let Some(color) = &edit.color {
            h.color = color.clone();
        }
        Ok(Some(h.clone()))
    }

    async fn get_progress(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> anyhow::Result<Option<Progress>> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), book_id.to_string()))
            .cloned())
    }

    async fn put_progress(&self, progress: &Progress) -> anyhow::Result<()> {
        self.progress.lock().unwrap().insert(
            (progress.user_id.clone(), progress.book_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    async fn get_unsynced_progress(&self) -> anyhow::Result<Vec<Progress>> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .values()
            .filter(|p| !p.synced)
            .cloned()
            .collect())
    }

    async fn mark_progress_synced(
        &self,
        user_id: &str,
        book_id: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut progress = self.progress.lock().unwrap();
        match progress.get_mut(&(user_id.to_string(), book_id.to_string())) {
            Some(p) if p.updated_at == updated_at => {
                p.synced = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_user_data(&self, user_id: &str) -> anyhow::Result<()> {
        self.highlights
            .lock()
            .unwrap()
            .retain(|_, h| h.user_id != user_id);
        self.progress
            .lock()
            .unwrap()
            .retain(|(u, _), _| u != user_id);
        Ok(())
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

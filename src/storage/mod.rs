//! Persistence for the offline store. Every operation is independently atomic;
//! callers must tolerate partial completion across records.

pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::domain::{Book, Highlight, HighlightEdit, Progress, SyncStatus};

pub use sqlite::SqliteStore;

#[async_trait::async_trait]
pub trait OfflineStore: Send + Sync {
    async fn get_book(&self, id: &str) -> anyhow::Result<Option<Book>>;
    /// Idempotent upsert keyed by book id.
    async fn put_book(&self, book: &Book) -> anyhow::Result<()>;
    async fn list_books(&self, user_id: &str) -> anyhow::Result<Vec<Book>>;

    async fn get_highlight(&self, id: &str) -> anyhow::Result<Option<Highlight>>;
    /// Highlights of a book, newest first, without `pending_delete` tombstones.
    async fn get_highlights_for_book(&self, book_id: &str) -> anyhow::Result<Vec<Highlight>>;
    async fn get_highlights_by_status(&self, status: SyncStatus)
    -> anyhow::Result<Vec<Highlight>>;
    /// Idempotent upsert keyed by highlight id.
    async fn put_highlight(&self, highlight: &Highlight) -> anyhow::Result<()>;
    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()>;
    /// Rewrite the identity of the record stored under `temp_id` in place: its id
    /// becomes `remote_id`, it turns `synced` and loses its temp id. Content,
    /// including edits made while the remote create was in flight, is kept.
    /// Returns `false` (and changes nothing) when no record exists under `temp_id`.
    async fn promote_highlight(&self, temp_id: &str, remote_id: &str) -> anyhow::Result<bool>;
    /// Apply `edit` to the user's visible highlight `id`. Touches nothing and
    /// returns `None` when no such record exists (any more).
    async fn edit_highlight(
        &self,
        user_id: &str,
        id: &str,
        edit: &HighlightEdit,
    ) -> anyhow::Result<Option<Highlight>>;

    async fn get_progress(&self, user_id: &str, book_id: &str)
    -> anyhow::Result<Option<Progress>>;
    async fn put_progress(&self, progress: &Progress) -> anyhow::Result<()>;
    async fn get_unsynced_progress(&self) -> anyhow::Result<Vec<Progress>>;
    /// Set `synced = true` only if the record was not rewritten since `updated_at`.
    async fn mark_progress_synced(
        &self,
        user_id: &str,
        book_id: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    /// Remove the user's highlights and progress. Cached books are kept.
    async fn clear_user_data(&self, user_id: &str) -> anyhow::Result<()>;
}

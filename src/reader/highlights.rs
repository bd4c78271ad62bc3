use std::sync::Arc;

use chrono::Utc;

use super::kick_sync;
use crate::{
    domain::{Highlight, HighlightDraft, HighlightEdit},
    sync::{
        ReconciliationEngine, SyncContext,
        status::{DeleteTransition, request_delete},
    },
};

/// Offline-first highlight mutations. Every write lands in the store first;
/// the remote authority only ever hears about it through reconciliation.
pub struct HighlightEditor {
    ctx: SyncContext,
    engine: Arc<ReconciliationEngine>,
}

impl HighlightEditor {
    pub fn new(ctx: SyncContext, engine: Arc<ReconciliationEngine>) -> Self {
        Self { ctx, engine }
    }

    pub async fn list(&self, user_id: &str, book_id: &str) -> anyhow::Result<Vec<Highlight>> {
        Ok(self
            .ctx
            .store
            .get_highlights_for_book(book_id)
            .await?
            .into_iter()
            .filter(|h| h.user_id == user_id)
            .collect())
    }

    #[tracing::instrument(level = "debug", skip(self, draft), fields(book_id = %draft.book_id))]
    pub async fn create(&self, draft: HighlightDraft) -> anyhow::Result<Highlight> {
        let highlight = Highlight::pending(draft, Utc::now());
        self.ctx.store.put_highlight(&highlight).await?;
        tracing::debug!(temp_id = %highlight.id, "highlight stored as pending_create");
        kick_sync(&self.engine, &self.ctx.connectivity, &highlight.user_id);
        Ok(highlight)
    }

    /// Returns `false` when the user has no such highlight.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let Some(highlight) = self.owned(user_id, id).await? else {
            return Ok(false);
        };
        match request_delete(highlight) {
            DeleteTransition::RemoveLocally => self.ctx.store.delete_highlight(id).await?,
            DeleteTransition::MarkPendingDelete(tombstone) => {
                self.ctx.store.put_highlight(&tombstone).await?;
                kick_sync(&self.engine, &self.ctx.connectivity, user_id);
            }
        }
        Ok(true)
    }

    /// Edit note or color in place. The sync status is left untouched, so the
    /// change stays local. A record that was promoted or deleted in the
    /// meantime is not recreated.
    #[tracing::instrument(level = "debug", skip(self, edit))]
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        edit: HighlightEdit,
    ) -> anyhow::Result<Option<Highlight>> {
        self.ctx.store.edit_highlight(user_id, id, &edit).await
    }

    /// Visible highlight `id` if it belongs to `user_id`. Tombstones are hidden.
    async fn owned(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Highlight>> {
        Ok(self
            .ctx
            .store
            .get_highlight(id)
            .await?
            .filter(|h| h.user_id == user_id && h.sync_status.is_visible()))
    }
}

use anyhow::Context;
use chrono::{DateTime, Utc};
use entities::{book, highlight, reading_progress};
use migration::MigratorTrait;
use sea_orm::{
    ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

use super::OfflineStore;
use crate::domain::{
    Book, Highlight, HighlightEdit, Progress, SyncStatus, is_temp_id,
    mapping::{
        book_from_model, book_to_active, highlight_from_model, highlight_to_active,
        progress_from_model, progress_to_active,
    },
};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (creating if missing) the database and bring its schema up to date.
    pub async fn connect(connection_string: &str) -> anyhow::Result<Self> {
        let mut opts = ConnectOptions::new(connection_string.to_string());
        opts.sqlx_logging(false);
        if connection_string.contains(":memory:") {
            // every pooled connection would otherwise see its own empty database
            opts.max_connections(1).min_connections(1);
        }
        let db = Database::connect(opts)
            .await
            .with_context(|| "Failed to connect to database")?;
        migration::Migrator::up(&db, None)
            .await
            .with_context(|| "Failed to run database migrations")?;
        tracing::debug!("offline store ready");
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn highlight_upsert() -> OnConflict {
    OnConflict::column(highlight::Column::Id)
        .update_columns([
            highlight::Column::BookId,
            highlight::Column::UserId,
            highlight::Column::Text,
            highlight::Column::Color,
            highlight::Column::StartCfi,
            highlight::Column::EndCfi,
            highlight::Column::PageNumber,
            highlight::Column::AiAction,
            highlight::Column::AiResponse,
            highlight::Column::Note,
            highlight::Column::CreatedAt,
            highlight::Column::SyncStatus,
            highlight::Column::TempId,
        ])
        .to_owned()
}

#[async_trait::async_trait]
impl OfflineStore for SqliteStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_book(&self, id: &str) -> anyhow::Result<Option<Book>> {
        book::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(book_from_model)
            .transpose()
    }

    #[tracing::instrument(level = "debug", skip(self, book), fields(book_id = %book.id))]
    async fn put_book(&self, book: &Book) -> anyhow::Result<()> {
        book::Entity::insert(book_to_active(book))
            .on_conflict(
                OnConflict::column(book::Column::Id)
                    .update_columns([
                        book::Column::UserId,
                        book::Column::Title,
                        book::Column::FileUrl,
                        book::Column::FileType,
                        book::Column::CoverUrl,
                        book::Column::TotalPages,
                        book::Column::CachedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .with_context(|| format!("Failed to store book {}", book.id))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_books(&self, user_id: &str) -> anyhow::Result<Vec<Book>> {
        book::Entity::find()
            .filter(book::Column::UserId.eq(user_id))
            .order_by_desc(book::Column::CachedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(book_from_model)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_highlight(&self, id: &str) -> anyhow::Result<Option<Highlight>> {
        highlight::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(highlight_from_model)
            .transpose()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_highlights_for_book(&self, book_id: &str) -> anyhow::Result<Vec<Highlight>> {
        highlight::Entity::find()
            .filter(highlight::Column::BookId.eq(book_id))
            .filter(highlight::Column::SyncStatus.ne(SyncStatus::PendingDelete.as_str()))
            .order_by_desc(highlight::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(highlight_from_model)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_highlights_by_status(
        &self,
        status: SyncStatus,
    ) -> anyhow::Result<Vec<Highlight>> {
        highlight::Entity::find()
            .filter(highlight::Column::SyncStatus.eq(status.as_str()))
            .order_by_asc(highlight::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(highlight_from_model)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self, highlight), fields(highlight_id = %highlight.id))]
    async fn put_highlight(&self, highlight: &Highlight) -> anyhow::Result<()> {
        anyhow::ensure!(
            highlight.has_consistent_identity(),
            "highlight {} has inconsistent sync identity ({})",
            highlight.id,
            highlight.sync_status
        );
        highlight::Entity::insert(highlight_to_active(highlight))
            .on_conflict(highlight_upsert())
            .exec_without_returning(&self.db)
            .await
            .with_context(|| format!("Failed to store highlight {}", highlight.id))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()> {
        highlight::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to delete highlight {}", id))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn promote_highlight(&self, temp_id: &str, remote_id: &str) -> anyhow::Result<bool> {
        anyhow::ensure!(
            !is_temp_id(remote_id),
            "remote id {} looks like a temp id",
            remote_id
        );
        let res = highlight::Entity::update_many()
            .col_expr(highlight::Column::Id, Expr::value(remote_id))
            .col_expr(
                highlight::Column::SyncStatus,
                Expr::value(SyncStatus::Synced.as_str()),
            )
            .col_expr(highlight::Column::TempId, Expr::value(Option::<String>::None))
            .filter(highlight::Column::Id.eq(temp_id))
            .filter(highlight::Column::SyncStatus.eq(SyncStatus::PendingCreate.as_str()))
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to promote highlight {}", temp_id))?;
        Ok(res.rows_affected > 0)
    }

    #[tracing::instrument(level = "debug", skip(self, edit))]
    async fn edit_highlight(
        &self,
        user_id: &str,
        id: &str,
        edit: &HighlightEdit,
    ) -> anyhow::Result<Option<Highlight>> {
        let visible = || {
            Condition::all()
                .add(highlight::Column::Id.eq(id))
                .add(highlight::Column::UserId.eq(user_id))
                .add(highlight::Column::SyncStatus.ne(SyncStatus::PendingDelete.as_str()))
        };
        let txn = self.db.begin().await?;
        if !edit.is_empty() {
            let mut update = highlight::Entity::update_many().filter(visible());
            if let Some(note) = &edit.note {
                update = update.col_expr(highlight::Column::Note, Expr::value(note.clone()));
            }
            if let Some(color) = &edit.color {
                update = update.col_expr(highlight::Column::Color, Expr::value(color.clone()));
            }
            update
                .exec(&txn)
                .await
                .with_context(|| format!("Failed to edit highlight {}", id))?;
        }
        let found = highlight::Entity::find().filter(visible()).one(&txn).await?;
        txn.commit().await?;
        found.map(highlight_from_model).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_progress(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> anyhow::Result<Option<Progress>> {
        reading_progress::Entity::find_by_id((user_id.to_string(), book_id.to_string()))
            .one(&self.db)
            .await?
            .map(progress_from_model)
            .transpose()
    }

    #[tracing::instrument(level = "debug", skip(self, progress), fields(book_id = %progress.book_id))]
    async fn put_progress(&self, progress: &Progress) -> anyhow::Result<()> {
        reading_progress::Entity::insert(progress_to_active(progress)?)
            .on_conflict(
                OnConflict::columns([
                    reading_progress::Column::UserId,
                    reading_progress::Column::BookId,
                ])
                .update_columns([
                    reading_progress::Column::Position,
                    reading_progress::Column::HighestPosition,
                    reading_progress::Column::UpdatedAt,
                    reading_progress::Column::Synced,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .with_context(|| format!("Failed to store progress for book {}", progress.book_id))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_unsynced_progress(&self) -> anyhow::Result<Vec<Progress>> {
        reading_progress::Entity::find()
            .filter(reading_progress::Column::Synced.eq(false))
            .all(&self.db)
            .await?
            .into_iter()
            .map(progress_from_model)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_progress_synced(
        &self,
        user_id: &str,
        book_id: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let res = reading_progress::Entity::update_many()
            .col_expr(reading_progress::Column::Synced, Expr::value(true))
            .filter(reading_progress::Column::UserId.eq(user_id))
            .filter(reading_progress::Column::BookId.eq(book_id))
            .filter(reading_progress::Column::UpdatedAt.eq(updated_at.timestamp_millis()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn clear_user_data(&self, user_id: &str) -> anyhow::Result<()> {
        let highlights = highlight::Entity::delete_many()
            .filter(highlight::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .with_context(|| "Failed to clear highlights")?;
        let progress = reading_progress::Entity::delete_many()
            .filter(reading_progress::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .with_context(|| "Failed to clear reading progress")?;
        tracing::info!(
            highlights = highlights.rows_affected,
            progress = progress.rows_affected,
            "cleared offline data for user"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::{
        domain::{ContentType, HighlightDraft, Position},
        sync::status::{DeleteTransition, confirm_created, request_delete},
    };

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn book(id: &str, user_id: &str) -> Book {
        Book {
            id: id.into(),
            user_id: user_id.into(),
            title: "Moby-Dick".into(),
            file_url: "https://files.example/moby.epub".into(),
            content_type: ContentType::Epub,
            cover_url: None,
            total_pages: Some(600),
            cached_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        }
    }

    fn pending(book_id: &str, user_id: &str, text: &str) -> Highlight {
        Highlight::pending(
            HighlightDraft {
                book_id: book_id.into(),
                user_id: user_id.into(),
                text: text.into(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn progress(user_id: &str, book_id: &str, f: f64, synced: bool) -> Progress {
        Progress {
            user_id: user_id.into(),
            book_id: book_id.into(),
            position: Position::at_fraction(f),
            highest_position: Position::at_fraction(f),
            updated_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            synced,
        }
    }

    #[tokio::test]
    async fn put_book_is_idempotent_upsert() {
        let s = store().await;
        let mut b = book("b1", "u1");
        s.put_book(&b).await.unwrap();
        s.put_book(&b).await.unwrap();
        b.title = "Moby-Dick; or, The Whale".into();
        s.put_book(&b).await.unwrap();

        let stored = s.get_book("b1").await.unwrap().unwrap();
        assert_eq!(stored, b);
        assert_eq!(s.list_books("u1").await.unwrap().len(), 1);
        assert!(s.get_book("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn book_listing_excludes_pending_delete() {
        let s = store().await;
        let keep = pending("b1", "u1", "keep");
        s.put_highlight(&keep).await.unwrap();

        let synced = confirm_created(pending("b1", "u1", "gone"), "srv-2".into());
        let DeleteTransition::MarkPendingDelete(tombstone) = request_delete(synced) else {
            panic!("synced record should become a tombstone");
        };
        s.put_highlight(&tombstone).await.unwrap();
        s.put_highlight(&pending("b2", "u1", "other book")).await.unwrap();

        let listed = s.get_highlights_for_book("b1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);

        let deletes = s
            .get_highlights_by_status(SyncStatus::PendingDelete)
            .await
            .unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].id, "srv-2");
    }

    #[tokio::test]
    async fn inconsistent_identity_is_refused() {
        let s = store().await;
        let mut h = pending("b1", "u1", "text");
        h.sync_status = SyncStatus::Synced;
        assert!(s.put_highlight(&h).await.is_err());
        assert!(s.get_highlight(&h.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn promote_replaces_temp_record() {
        let s = store().await;
        let h = pending("b1", "u1", "text");
        let temp_id = h.id.clone();
        s.put_highlight(&h).await.unwrap();

        assert!(s.promote_highlight(&temp_id, "srv-1").await.unwrap());

        assert!(s.get_highlight(&temp_id).await.unwrap().is_none());
        let stored = s.get_highlight("srv-1").await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.temp_id, None);
        assert_eq!(stored.text, "text");
    }

    #[tokio::test]
    async fn promote_keeps_edits_made_in_flight() {
        let s = store().await;
        let h = pending("b1", "u1", "text");
        s.put_highlight(&h).await.unwrap();
        let edit = HighlightEdit {
            note: Some(Some("remember".into())),
            color: Some("green".into()),
        };
        s.edit_highlight("u1", &h.id, &edit).await.unwrap().unwrap();

        assert!(s.promote_highlight(&h.id, "srv-1").await.unwrap());

        let stored = s.get_highlight("srv-1").await.unwrap().unwrap();
        assert_eq!(stored.note.as_deref(), Some("remember"));
        assert_eq!(stored.color, "green");
    }

    #[tokio::test]
    async fn edit_after_promotion_does_not_resurrect_temp_record() {
        let s = store().await;
        let h = pending("b1", "u1", "text");
        s.put_highlight(&h).await.unwrap();
        assert!(s.promote_highlight(&h.id, "srv-1").await.unwrap());

        let edit = HighlightEdit {
            note: Some(Some("late".into())),
            ..Default::default()
        };
        assert!(s.edit_highlight("u1", &h.id, &edit).await.unwrap().is_none());
        assert!(s.get_highlight(&h.id).await.unwrap().is_none());
        assert_eq!(
            s.get_highlights_by_status(SyncStatus::PendingCreate)
                .await
                .unwrap()
                .len(),
            0
        );
        assert!(s.get_highlight("srv-1").await.unwrap().unwrap().note.is_none());
    }

    #[tokio::test]
    async fn edit_skips_tombstones_and_other_users() {
        let s = store().await;
        let h = pending("b1", "u1", "text");
        s.put_highlight(&h).await.unwrap();
        let edit = HighlightEdit {
            color: Some("blue".into()),
            ..Default::default()
        };
        assert!(s.edit_highlight("u2", &h.id, &edit).await.unwrap().is_none());

        s.promote_highlight(&h.id, "srv-1").await.unwrap();
        let DeleteTransition::MarkPendingDelete(tombstone) =
            request_delete(s.get_highlight("srv-1").await.unwrap().unwrap())
        else {
            panic!("synced record should become a tombstone");
        };
        s.put_highlight(&tombstone).await.unwrap();
        assert!(s.edit_highlight("u1", "srv-1", &edit).await.unwrap().is_none());
        assert_eq!(s.get_highlight("srv-1").await.unwrap().unwrap().color, "yellow");
    }

    #[tokio::test]
    async fn promote_without_temp_record_changes_nothing() {
        let s = store().await;
        assert!(!s.promote_highlight("temp-missing", "srv-1").await.unwrap());
        assert!(s.get_highlight("srv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_synced_respects_newer_writes() {
        let s = store().await;
        let p = progress("u1", "b1", 0.2, false);
        s.put_progress(&p).await.unwrap();

        let newer = Progress {
            updated_at: p.updated_at + TimeDelta::seconds(2),
            position: Position::at_fraction(0.3),
            ..p.clone()
        };
        s.put_progress(&newer).await.unwrap();

        assert!(!s.mark_progress_synced("u1", "b1", p.updated_at).await.unwrap());
        assert_eq!(s.get_unsynced_progress().await.unwrap().len(), 1);

        assert!(s
            .mark_progress_synced("u1", "b1", newer.updated_at)
            .await
            .unwrap());
        let stored = s.get_progress("u1", "b1").await.unwrap().unwrap();
        assert!(stored.synced);
        assert_eq!(stored.position.fraction(), 0.3);
        assert!(s.get_unsynced_progress().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_user_data_keeps_books_and_other_users() {
        let s = store().await;
        s.put_book(&book("b1", "u1")).await.unwrap();
        s.put_book(&book("b2", "u2")).await.unwrap();
        s.put_highlight(&pending("b1", "u1", "mine")).await.unwrap();
        let theirs = pending("b2", "u2", "theirs");
        s.put_highlight(&theirs).await.unwrap();
        s.put_progress(&progress("u1", "b1", 0.4, false)).await.unwrap();
        s.put_progress(&progress("u2", "b2", 0.6, true)).await.unwrap();

        s.clear_user_data("u1").await.unwrap();

        assert!(s.get_highlights_for_book("b1").await.unwrap().is_empty());
        assert!(s.get_progress("u1", "b1").await.unwrap().is_none());
        assert!(s.get_book("b1").await.unwrap().is_some());
        assert!(s.get_book("b2").await.unwrap().is_some());
        let remaining = s.get_highlights_for_book("b2").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, theirs.id);
        assert!(s.get_progress("u2", "b2").await.unwrap().is_some());
    }
}

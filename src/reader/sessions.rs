use std::{collections::HashMap, time::Duration};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    domain::{Book, Highlight, Position},
    sync::{PositionReporter, SyncContext, resume::ResumeDecision},
};

type SessionKey = (String, String);

/// Everything the reading surface needs when a book is opened.
#[derive(Debug, Clone)]
pub struct OpenedBook {
    pub book: Option<Book>,
    pub current: Option<Position>,
    pub highest: Option<Position>,
    pub resume: ResumeDecision,
    pub highlights: Vec<Highlight>,
}

/// Registry of open (user, book) sessions, each owning one position reporter.
pub struct ReaderSessions {
    ctx: SyncContext,
    quiet_period: Duration,
    sessions: Mutex<HashMap<SessionKey, PositionReporter>>,
}

impl ReaderSessions {
    pub fn new(ctx: SyncContext, quiet_period: Duration) -> Self {
        Self {
            ctx,
            quiet_period,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open `book_id` for `user_id`, caching `book` when given. Re-opening a book
    /// that is already open flushes the previous session first.
    #[tracing::instrument(level = "debug", skip(self, book))]
    pub async fn open_book(
        &self,
        user_id: &str,
        book_id: &str,
        book: Option<Book>,
    ) -> anyhow::Result<OpenedBook> {
        if let Some(mut book) = book {
            book.cached_at = Utc::now();
            self.ctx.store.put_book(&book).await?;
        }
        // Flush the previous session so its last position is part of what we read.
        let previous = self.sessions.lock().await.remove(&key(user_id, book_id));
        if let Some(previous) = previous {
            previous.shutdown().await;
        }
        let book = self.ctx.store.get_book(book_id).await?;
        let progress = self.ctx.store.get_progress(user_id, book_id).await?;
        let resume = ResumeDecision::for_progress(progress.as_ref());
        let highlights = self
            .ctx
            .store
            .get_highlights_for_book(book_id)
            .await?
            .into_iter()
            .filter(|h| h.user_id == user_id)
            .collect();

        let current = progress.as_ref().map(|p| p.position.clone());
        let reporter = PositionReporter::spawn(
            self.ctx.clone(),
            user_id,
            book_id,
            self.quiet_period,
            current.clone(),
        );
        let replaced = self
            .sessions
            .lock()
            .await
            .insert(key(user_id, book_id), reporter);
        // A position event may have started a session while we were reading.
        if let Some(replaced) = replaced {
            replaced.shutdown().await;
        }

        Ok(OpenedBook {
            book,
            current,
            highest: progress.map(|p| p.highest_position),
            resume,
            highlights,
        })
    }

    /// Forward a raw position event. A session is started on demand when the
    /// book was not opened first.
    pub async fn report_position(&self, user_id: &str, book_id: &str, position: Position) {
        let mut sessions = self.sessions.lock().await;
        let reporter = sessions.entry(key(user_id, book_id)).or_insert_with(|| {
            tracing::debug!(user_id, book_id, "position for a book that was not opened");
            PositionReporter::spawn(
                self.ctx.clone(),
                user_id,
                book_id,
                self.quiet_period,
                None,
            )
        });
        reporter.report(position);
    }

    pub async fn current_position(&self, user_id: &str, book_id: &str) -> Option<Position> {
        self.sessions
            .lock()
            .await
            .get(&key(user_id, book_id))
            .and_then(PositionReporter::current)
    }

    /// Tear a session down, flushing any pending commit. Returns `false` when no
    /// such session was open.
    pub async fn close_book(&self, user_id: &str, book_id: &str) -> bool {
        let reporter = self.sessions.lock().await.remove(&key(user_id, book_id));
        match reporter {
            Some(reporter) => {
                reporter.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn close_user(&self, user_id: &str) -> usize {
        let closing: Vec<PositionReporter> = {
            let mut sessions = self.sessions.lock().await;
            let keys: Vec<SessionKey> = sessions
                .keys()
                .filter(|(u, _)| u == user_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| sessions.remove(k)).collect()
        };
        let closed = closing.len();
        for reporter in closing {
            reporter.shutdown().await;
        }
        closed
    }

    /// Users with at least one open session, deduplicated.
    pub async fn active_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .sessions
            .lock()
            .await
            .keys()
            .map(|(u, _)| u.clone())
            .collect();
        users.sort();
        users.dedup();
        users
    }

    /// Sign-out: flush and close the user's sessions, then drop their offline data.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear_offline_data_for_user(&self, user_id: &str) -> anyhow::Result<()> {
        let closed = self.close_user(user_id).await;
        self.ctx.store.clear_user_data(user_id).await?;
        tracing::info!(closed, "offline data cleared");
        Ok(())
    }
}

fn key(user_id: &str, book_id: &str) -> SessionKey {
    (user_id.to_string(), book_id.to_string())
}

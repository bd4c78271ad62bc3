use std::time::Duration;

use chrono::Utc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};

use super::{SyncContext, watermark};
use crate::domain::Position;

/// Trailing-debounce reporter for one (user, book) reading session.
///
/// Every event updates the in-memory current position immediately; the store
/// (and, when online, the remote authority) only see the last position of a
/// burst, once `quiet_period` has passed without new events. Commits happen
/// one at a time on a single task, so they can never overtake each other.
/// Dropping or shutting down the reporter flushes a pending commit instead of
/// discarding it.
pub struct PositionReporter {
    user_id: String,
    book_id: String,
    current: watch::Sender<Option<Position>>,
    events: Option<mpsc::UnboundedSender<Position>>,
    task: Option<JoinHandle<()>>,
}

impl PositionReporter {
    pub fn spawn(
        ctx: SyncContext,
        user_id: impl Into<String>,
        book_id: impl Into<String>,
        quiet_period: Duration,
        initial: Option<Position>,
    ) -> Self {
        let user_id = user_id.into();
        let book_id = book_id.into();
        let (current, _) = watch::channel(initial);
        let (events, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(
            ctx,
            user_id.clone(),
            book_id.clone(),
            quiet_period,
            rx,
        ));
        Self {
            user_id,
            book_id,
            current,
            events: Some(events),
            task: Some(task),
        }
    }

    pub fn report(&self, position: Position) {
        self.current.send_replace(Some(position.clone()));
        if let Some(events) = &self.events {
            if events.send(position).is_err() {
                tracing::warn!(book_id = %self.book_id, "position reporter task is gone");
            }
        }
    }

    pub fn current(&self) -> Option<Position> {
        self.current.borrow().clone()
    }

    pub fn current_fraction(&self) -> Option<f64> {
        self.current.borrow().as_ref().map(Position::fraction)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    /// Stop accepting events and wait until any pending commit has been flushed.
    pub async fn shutdown(mut self) {
        self.events.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, book_id = %self.book_id, "position reporter task failed");
            }
        }
    }
}

impl Drop for PositionReporter {
    fn drop(&mut self) {
        // closing the channel makes the detached task flush and exit on its own
        self.events.take();
    }
}

async fn run(
    ctx: SyncContext,
    user_id: String,
    book_id: String,
    quiet_period: Duration,
    mut rx: mpsc::UnboundedReceiver<Position>,
) {
    let mut pending: Option<Position> = None;
    let timer = tokio::time::sleep(quiet_period);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(position) => {
                    pending = Some(position);
                    timer.as_mut().reset(Instant::now() + quiet_period);
                }
                None => break,
            },
            () = &mut timer, if pending.is_some() => {
                if let Some(position) = pending.take() {
                    commit(&ctx, &user_id, &book_id, position).await;
                }
            }
        }
    }

    if let Some(position) = pending.take() {
        tracing::debug!(%book_id, "flushing pending position on teardown");
        commit(&ctx, &user_id, &book_id, position).await;
    }
}

/// Persist one position locally, then push it to the remote authority if online.
/// Failures are logged and swallowed; an unsynced record is picked up later by
/// the reconciliation engine.
#[tracing::instrument(level = "debug", skip(ctx, position))]
pub async fn commit(ctx: &SyncContext, user_id: &str, book_id: &str, position: Position) {
    let stored = match ctx.store.get_progress(user_id, book_id).await {
        Ok(existing) => {
            let progress =
                watermark::advance(existing.as_ref(), user_id, book_id, position, Utc::now());
            match ctx.store.put_progress(&progress).await {
                Ok(()) => Some(progress),
                Err(e) => {
                    tracing::warn!(error = %format!("{:?}", e), "failed to store progress");
                    None
                }
            }
        }
        Err(e) => {
            // without the stored watermark a write could move it backwards
            tracing::warn!(error = %format!("{:?}", e), "failed to read progress, not storing");
            if ctx.connectivity.is_online() {
                if let Err(e) = ctx
                    .remote
                    .save_progress(book_id, &position, position.remote_fraction())
                    .await
                {
                    tracing::debug!(error = %e, "remote save failed");
                }
            }
            return;
        }
    };

    let Some(progress) = stored else {
        return;
    };
    if !ctx.connectivity.is_online() {
        tracing::debug!("offline, progress left unsynced");
        return;
    }
    match ctx
        .remote
        .save_progress(
            book_id,
            &progress.position,
            progress.position.remote_fraction(),
        )
        .await
    {
        Ok(()) => {
            if let Err(e) = ctx
                .store
                .mark_progress_synced(user_id, book_id, progress.updated_at)
                .await
            {
                tracing::warn!(error = %format!("{:?}", e), "failed to flag progress as synced");
            }
        }
        Err(e) => tracing::debug!(error = %e, "remote save failed, progress left unsynced"),
    }
}

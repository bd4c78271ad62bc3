use std::{
    collections::BTreeSet,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::JoinHandle;

use super::{
    SyncContext,
    status::{self, SyncStatus},
};
use crate::{
    connectivity::ConnectivityMonitor,
    domain::{Highlight, Progress},
    remote_client::CreateHighlightRequest,
};

/// Single-flight guard for reconciliation passes. Owned by an engine (or
/// shared explicitly between engines), never ambient.
///
/// A caller that finds the lock held is not queued itself, but its user is
/// remembered; the holder runs one more pass per remembered user before it
/// lets go.
#[derive(Debug, Clone, Default)]
pub struct SyncLock(Arc<Mutex<LockState>>);

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    rerun: BTreeSet<String>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_acquire(&self) -> Option<SyncLockGuard> {
        let mut state = self.state();
        if state.held {
            return None;
        }
        state.held = true;
        Some(SyncLockGuard {
            lock: self.clone(),
            released: false,
        })
    }

    /// Like `try_acquire`, but a miss asks the current holder to rerun for `user_id`.
    pub fn acquire_or_request_rerun(&self, user_id: &str) -> Option<SyncLockGuard> {
        let mut state = self.state();
        if state.held {
            state.rerun.insert(user_id.to_string());
            return None;
        }
        state.held = true;
        Some(SyncLockGuard {
            lock: self.clone(),
            released: false,
        })
    }

    pub fn is_held(&self) -> bool {
        self.state().held
    }
}

#[derive(Debug)]
pub struct SyncLockGuard {
    lock: SyncLock,
    released: bool,
}

impl SyncLockGuard {
    /// Next user a rerun was requested for, or `None` after releasing the lock.
    /// Checking and releasing happen under one critical section, so a request
    /// is either returned here or made against a free lock.
    pub fn next_rerun(&mut self) -> Option<String> {
        let mut state = self.lock.state();
        match state.rerun.pop_first() {
            Some(user_id) => Some(user_id),
            None => {
                state.held = false;
                self.released = true;
                None
            }
        }
    }
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        if !self.released {
            self.lock.state().held = false;
        }
    }
}

/// One unit of reconciliation work. Each kind succeeds or fails on its own.
#[derive(Debug, Clone)]
pub enum PendingOp {
    CreateHighlight(Highlight),
    DeleteHighlight(Highlight),
    SaveProgress(Progress),
}

impl PendingOp {
    fn describe(&self) -> (&'static str, &str) {
        match self {
            PendingOp::CreateHighlight(h) => ("create_highlight", &h.id),
            PendingOp::DeleteHighlight(h) => ("delete_highlight", &h.id),
            PendingOp::SaveProgress(p) => ("save_progress", &p.book_id),
        }
    }
}

/// Aggregate result of one pass; per-record outcomes are not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub highlights_created: usize,
    pub highlights_deleted: usize,
    pub progress_saved: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn remote_calls_succeeded(&self) -> usize {
        self.highlights_created + self.highlights_deleted + self.progress_saved
    }

    fn merge(self, other: SyncReport) -> SyncReport {
        SyncReport {
            highlights_created: self.highlights_created + other.highlights_created,
            highlights_deleted: self.highlights_deleted + other.highlights_deleted,
            progress_saved: self.progress_saved + other.progress_saved,
            failed: self.failed + other.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass held the lock; this call was dropped, not queued.
    AlreadyRunning,
    Offline,
}

pub struct ReconciliationEngine {
    ctx: SyncContext,
    lock: SyncLock,
}

impl ReconciliationEngine {
    pub fn new(ctx: SyncContext) -> Self {
        Self::with_lock(ctx, SyncLock::new())
    }

    pub fn with_lock(ctx: SyncContext, lock: SyncLock) -> Self {
        Self { ctx, lock }
    }

    pub fn lock(&self) -> &SyncLock {
        &self.lock
    }

    /// Run one reconciliation pass for `user_id`. Safe to call repeatedly and
    /// concurrently; never fails, whatever the remote authority does. A call
    /// made while another pass runs returns `AlreadyRunning` and the running
    /// pass goes round once more for that user.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync_all(&self, user_id: &str) -> SyncOutcome {
        let Some(mut guard) = self.lock.acquire_or_request_rerun(user_id) else {
            tracing::debug!("reconciliation already running, rerun requested");
            return SyncOutcome::AlreadyRunning;
        };
        if !self.ctx.connectivity.is_online() {
            tracing::debug!("offline, skipping reconciliation");
            return SyncOutcome::Offline;
        }

        let mut report = self.pass(user_id).await;
        while let Some(next) = guard.next_rerun() {
            if !self.ctx.connectivity.is_online() {
                tracing::debug!(user_id = %next, "went offline, dropping requested rerun");
                continue;
            }
            let rerun = self.pass(&next).await;
            if next == user_id {
                report = report.merge(rerun);
            }
        }
        SyncOutcome::Completed(report)
    }

    async fn pass(&self, user_id: &str) -> SyncReport {
        let (highlights, progress) = tokio::join!(
            self.reconcile_highlights(user_id),
            self.reconcile_progress(user_id)
        );
        let report = highlights.merge(progress);
        tracing::info!(
            user_id,
            created = report.highlights_created,
            deleted = report.highlights_deleted,
            progress = report.progress_saved,
            failed = report.failed,
            "reconciliation pass finished"
        );
        report
    }

    /// Users owning at least one pending highlight or unsynced progress record.
    pub async fn users_with_pending_work(&self) -> Vec<String> {
        let mut users = Vec::new();
        for status in [SyncStatus::PendingCreate, SyncStatus::PendingDelete] {
            match self.ctx.store.get_highlights_by_status(status).await {
                Ok(records) => users.extend(records.into_iter().map(|h| h.user_id)),
                Err(e) => {
                    tracing::warn!(error = %format!("{:?}", e), %status, "failed to load pending highlights")
                }
            }
        }
        match self.ctx.store.get_unsynced_progress().await {
            Ok(records) => users.extend(records.into_iter().map(|p| p.user_id)),
            Err(e) => tracing::warn!(error = %format!("{:?}", e), "failed to load unsynced progress"),
        }
        users.sort();
        users.dedup();
        users
    }

    async fn reconcile_highlights(&self, user_id: &str) -> SyncReport {
        let mut report = SyncReport::default();
        // creates first so a delete never races its own create within a pass
        for status in [SyncStatus::PendingCreate, SyncStatus::PendingDelete] {
            let records = match self.ctx.store.get_highlights_by_status(status).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %format!("{:?}", e), %status, "failed to load pending highlights");
                    continue;
                }
            };
            for h in records.into_iter().filter(|h| h.user_id == user_id) {
                let op = match status {
                    SyncStatus::PendingCreate => PendingOp::CreateHighlight(h),
                    _ => PendingOp::DeleteHighlight(h),
                };
                report = report.merge(self.run(op).await);
            }
        }
        report
    }

    async fn reconcile_progress(&self, user_id: &str) -> SyncReport {
        let mut report = SyncReport::default();
        let records = match self.ctx.store.get_unsynced_progress().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to load unsynced progress");
                return report;
            }
        };
        for p in records.into_iter().filter(|p| p.user_id == user_id) {
            report = report.merge(self.run(PendingOp::SaveProgress(p)).await);
        }
        report
    }

    async fn run(&self, op: PendingOp) -> SyncReport {
        let (kind, id) = {
            let (kind, id) = op.describe();
            (kind, id.to_string())
        };
        match self.apply(op).await {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(error = %e, kind, record = %id, "left pending for next pass");
                SyncReport {
                    failed: 1,
                    ..Default::default()
                }
            }
        }
    }

    async fn apply(&self, op: PendingOp) -> anyhow::Result<SyncReport> {
        let store = &self.ctx.store;
        let remote = &self.ctx.remote;
        match op {
            PendingOp::CreateHighlight(h) => {
                let Some(temp_id) = h.temp_id.clone() else {
                    anyhow::bail!("pending_create highlight {} has no temp id", h.id);
                };
                let created = remote
                    .create_highlight(&CreateHighlightRequest {
                        book_id: h.book_id.clone(),
                        text: h.text.clone(),
                        color: h.color.clone(),
                        page_number: h.page_number,
                        start_cfi: h.start_cfi.clone(),
                    })
                    .await?;
                if !store.promote_highlight(&temp_id, &created.id).await? {
                    // deleted locally while the create was in flight
                    let tombstone = Highlight {
                        sync_status: SyncStatus::PendingDelete,
                        ..status::confirm_created(h, created.id)
                    };
                    store.put_highlight(&tombstone).await?;
                }
                Ok(SyncReport {
                    highlights_created: 1,
                    ..Default::default()
                })
            }
            PendingOp::DeleteHighlight(h) => {
                if status::needs_remote_delete(&h) {
                    remote.delete_highlight(&h.id).await?;
                }
                store.delete_highlight(&h.id).await?;
                Ok(SyncReport {
                    highlights_deleted: 1,
                    ..Default::default()
                })
            }
            PendingOp::SaveProgress(p) => {
                remote
                    .save_progress(&p.book_id, &p.position, p.position.remote_fraction())
                    .await?;
                if !store
                    .mark_progress_synced(&p.user_id, &p.book_id, p.updated_at)
                    .await?
                {
                    tracing::debug!(book_id = %p.book_id, "progress changed during sync, keeping it pending");
                }
                Ok(SyncReport {
                    progress_saved: 1,
                    ..Default::default()
                })
            }
        }
    }

    /// On every offline->online transition, run a pass for each user returned
    /// by `active_users`.
    pub fn spawn_on_reconnect<F, Fut>(
        self: &Arc<Self>,
        monitor: &ConnectivityMonitor,
        active_users: F,
    ) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Vec<String>> + Send + 'static,
    {
        let engine = Arc::clone(self);
        monitor.on_online(move || {
            let engine = engine.clone();
            let users = active_users();
            async move {
                for user_id in users.await {
                    engine.sync_all(&user_id).await;
                }
            }
        })
    }
}

//! Loopback HTTP surface used by the reading UI.

pub mod models;
pub mod routes;
pub mod services;

pub use routes::OfflineApi;

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::{
    connectivity::ConnectivityMonitor,
    reader::{HighlightEditor, ReaderSessions},
    sync::{ReconciliationEngine, SyncContext},
};

/// Long-lived collaborators shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub ctx: SyncContext,
    pub monitor: ConnectivityMonitor,
    pub engine: Arc<ReconciliationEngine>,
    pub sessions: Arc<ReaderSessions>,
    pub highlights: Arc<HighlightEditor>,
}

impl AppState {
    pub fn new(ctx: SyncContext, monitor: ConnectivityMonitor, quiet_period: Duration) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(ctx.clone()));
        let sessions = Arc::new(ReaderSessions::new(ctx.clone(), quiet_period));
        let highlights = Arc::new(HighlightEditor::new(ctx.clone(), engine.clone()));
        Self {
            ctx,
            monitor,
            engine,
            sessions,
            highlights,
        }
    }

    /// Users to reconcile: anyone reading right now plus anyone with pending records.
    pub async fn users_to_sync(&self) -> Vec<String> {
        users_to_sync(&self.sessions, &self.engine).await
    }

    /// Reconcile every relevant user whenever the host comes back online.
    pub fn spawn_reconnect_sync(&self) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        let engine = self.engine.clone();
        self.engine.spawn_on_reconnect(&self.monitor, move || {
            let sessions = sessions.clone();
            let engine = engine.clone();
            async move { users_to_sync(&sessions, &engine).await }
        })
    }
}

async fn users_to_sync(sessions: &ReaderSessions, engine: &ReconciliationEngine) -> Vec<String> {
    let mut users = sessions.active_users().await;
    users.extend(engine.users_with_pending_work().await);
    users.sort();
    users.dedup();
    users
}

#[cfg(test)]
mod tests {
    use poem_openapi::types::MaybeUndefined;
    use serde_json::json;

    use super::{
        models::{
            CreateHighlightRequestDto, CreateHighlightResponse, HighlightResponse,
            NoContentResponse, OpenBookRequestDto, OpenBookResponse, PositionResponse,
            ProgressResponse, SyncResponse, UpdateHighlightRequestDto,
        },
        services::{
            health::HealthService, highlights::HighlightService, reading::ReadingService,
            sync::SyncService,
        },
        *,
    };
    use crate::testing::{MemoryStore, RecordingRemote};

    fn state(online: bool) -> (AppState, Arc<RecordingRemote>) {
        let remote = Arc::new(RecordingRemote::default());
        let monitor = ConnectivityMonitor::new(online);
        let ctx = SyncContext::new(
            Arc::new(MemoryStore::default()),
            remote.clone(),
            Arc::new(monitor.clone()),
        );
        (
            AppState::new(ctx, monitor, Duration::from_secs(60)),
            remote,
        )
    }

    fn highlight(text: &str) -> CreateHighlightRequestDto {
        CreateHighlightRequestDto {
            text: text.into(),
            color: None,
            start_cfi: Some("epubcfi(/6/4!/4/2)".into()),
            end_cfi: None,
            page_number: None,
            ai_action: None,
            ai_response: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn empty_highlight_text_is_rejected() {
        let (state, _) = state(false);
        let res = HighlightService::new(&state)
            .create("u1", "b1", highlight("   "))
            .await;
        assert!(matches!(res, CreateHighlightResponse::BadRequest(_)));
    }

    #[tokio::test]
    async fn highlight_note_can_be_set_and_cleared() {
        let (state, _) = state(false);
        let service = HighlightService::new(&state);
        let CreateHighlightResponse::Created(created) = service.create("u1", "b1", highlight("a")).await
        else {
            panic!("highlight should be created");
        };
        let id = created.0.id;

        let set = UpdateHighlightRequestDto {
            note: MaybeUndefined::Value("later".into()),
            color: None,
        };
        let HighlightResponse::Ok(updated) = service.update("u1", &id, set).await else {
            panic!("update should succeed");
        };
        assert_eq!(updated.0.note.as_deref(), Some("later"));
        assert_eq!(updated.0.sync_status, "pending_create");

        let clear = UpdateHighlightRequestDto {
            note: MaybeUndefined::Null,
            color: None,
        };
        let HighlightResponse::Ok(updated) = service.update("u1", &id, clear).await else {
            panic!("update should succeed");
        };
        assert!(updated.0.note.is_none());

        assert!(matches!(
            service.delete("u1", &id).await,
            NoContentResponse::NoContent
        ));
        assert!(matches!(
            service.delete("u1", &id).await,
            NoContentResponse::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn reading_flow_reports_progress_after_close() {
        let (state, _) = state(false);
        let reading = ReadingService::new(&state);
        let opened = reading
            .open("u1", "b1", OpenBookRequestDto { book: None })
            .await;
        assert!(matches!(opened, OpenBookResponse::Ok(_)));

        let bad = reading
            .report_position("u1", "b1", json!({ "fraction": "far" }))
            .await;
        assert!(matches!(bad, PositionResponse::BadRequest(_)));
        let ok = reading
            .report_position("u1", "b1", json!({ "fraction": 0.25, "cfi": "x" }))
            .await;
        assert!(matches!(ok, PositionResponse::Accepted));
        assert!(matches!(
            reading.progress("u1", "b1").await,
            ProgressResponse::NotFound(_)
        ));

        assert!(matches!(
            reading.close("u1", "b1").await,
            NoContentResponse::NoContent
        ));
        let ProgressResponse::Ok(progress) = reading.progress("u1", "b1").await else {
            panic!("progress should be stored on close");
        };
        assert_eq!(progress.0.fraction, 0.25);
        assert!(!progress.0.synced);
    }

    #[tokio::test]
    async fn offline_sync_reports_offline() {
        let (state, remote) = state(false);
        let SyncResponse::Ok(report) = SyncService::new(&state).sync_all("u1").await;
        assert_eq!(report.0.outcome, "offline");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn going_online_reconciles_pending_users() {
        let (state, remote) = state(false);
        let _listener = state.spawn_reconnect_sync();
        HighlightService::new(&state)
            .create("u1", "b1", highlight("a"))
            .await;
        tokio::task::yield_now().await;

        HealthService::new(&state).set_connectivity(true);
        for _ in 0..100 {
            if !remote.calls().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(remote.calls(), vec!["create:a".to_string()]);
    }
}

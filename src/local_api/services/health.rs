use poem_openapi::payload::{Json, PlainText};

use crate::{
    connectivity::Connectivity,
    local_api::{
        AppState,
        models::{ConnectivityDto, ConnectivityResponse},
    },
};

pub struct HealthService<'a> {
    pub state: &'a AppState,
}

impl<'a> HealthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status_text(&self) -> PlainText<String> {
        let users = self.state.sessions.active_users().await;
        PlainText(format!(
            "readsync-offline version={} online={} open_sessions_users={} sync_running={}",
            env!("CARGO_PKG_VERSION"),
            self.state.monitor.is_online(),
            users.len(),
            self.state.engine.lock().is_held()
        ))
    }

    /// Host connectivity notification. Going online triggers reconciliation
    /// through the reconnect listener.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn set_connectivity(&self, online: bool) -> ConnectivityResponse {
        if self.state.monitor.set_online(online) {
            tracing::info!(online, "connectivity reported by host");
        }
        ConnectivityResponse::Ok(Json(ConnectivityDto {
            online: self.state.monitor.is_online(),
        }))
    }
}

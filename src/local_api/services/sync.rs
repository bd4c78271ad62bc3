use poem_openapi::payload::Json;

use crate::local_api::{
    AppState,
    models::{ErrorDto, NoContentResponse, SyncResponse},
};

pub struct SyncService<'a> {
    pub state: &'a AppState,
}

impl<'a> SyncService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync_all(&self, user_id: &str) -> SyncResponse {
        let outcome = self.state.engine.sync_all(user_id).await;
        SyncResponse::Ok(Json(outcome.into()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear_offline_data(&self, user_id: &str) -> NoContentResponse {
        match self
            .state
            .sessions
            .clear_offline_data_for_user(user_id)
            .await
        {
            Ok(()) => NoContentResponse::NoContent,
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to clear offline data");
                NoContentResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }
}

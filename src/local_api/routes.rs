use poem_openapi::{
    OpenApi,
    param::Path,
    payload::{Json, PlainText},
};

use super::{
    AppState,
    models::{
        BookListResponse, BookResponse, ConnectivityDto, ConnectivityResponse,
        CreateHighlightRequestDto, CreateHighlightResponse, HighlightListResponse,
        HighlightResponse, NoContentResponse, OpenBookRequestDto, OpenBookResponse,
        PositionEventDto, PositionResponse, ProgressResponse, PutBookRequestDto, SyncResponse,
        UpdateHighlightRequestDto,
    },
    services::{
        health::HealthService, highlights::HighlightService, library::LibraryService,
        reading::ReadingService, sync::SyncService,
    },
};

pub struct OfflineApi {
    pub state: AppState,
}

impl OfflineApi {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl OfflineApi {
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        HealthService::new(&self.state).status_text().await
    }

    /// Host connectivity notification
    #[oai(path = "/connectivity", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn set_connectivity(&self, body: Json<ConnectivityDto>) -> ConnectivityResponse {
        HealthService::new(&self.state).set_connectivity(body.0.online)
    }

    // ===== Offline library =====

    /// Books cached for offline reading
    #[oai(path = "/users/:user_id/books", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, user_id))]
    async fn list_books(&self, user_id: Path<String>) -> BookListResponse {
        LibraryService::new(&self.state).list_books(&user_id.0).await
    }

    #[oai(path = "/users/:user_id/books/:book_id", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id, body))]
    async fn put_book(
        &self,
        user_id: Path<String>,
        book_id: Path<String>,
        body: Json<PutBookRequestDto>,
    ) -> BookResponse {
        LibraryService::new(&self.state)
            .put_book(&user_id.0, &book_id.0, body.0)
            .await
    }

    #[oai(path = "/users/:user_id/books/:book_id", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id))]
    async fn get_book(&self, user_id: Path<String>, book_id: Path<String>) -> BookResponse {
        LibraryService::new(&self.state)
            .get_book(&user_id.0, &book_id.0)
            .await
    }

    // ===== Reading sessions =====

    /// Open a reading session and get the resume prompt
    #[oai(path = "/users/:user_id/books/:book_id/open", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id, body))]
    async fn open_book(
        &self,
        user_id: Path<String>,
        book_id: Path<String>,
        body: Json<OpenBookRequestDto>,
    ) -> OpenBookResponse {
        ReadingService::new(&self.state)
            .open(&user_id.0, &book_id.0, body.0)
            .await
    }

    /// Raw position event from the renderer
    #[oai(path = "/users/:user_id/books/:book_id/position", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id, body))]
    async fn report_position(
        &self,
        user_id: Path<String>,
        book_id: Path<String>,
        body: Json<PositionEventDto>,
    ) -> PositionResponse {
        ReadingService::new(&self.state)
            .report_position(&user_id.0, &book_id.0, body.0.position)
            .await
    }

    /// Close a reading session, flushing any pending position
    #[oai(path = "/users/:user_id/books/:book_id/close", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id))]
    async fn close_book(&self, user_id: Path<String>, book_id: Path<String>) -> NoContentResponse {
        ReadingService::new(&self.state)
            .close(&user_id.0, &book_id.0)
            .await
    }

    #[oai(path = "/users/:user_id/books/:book_id/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id))]
    async fn get_progress(&self, user_id: Path<String>, book_id: Path<String>) -> ProgressResponse {
        ReadingService::new(&self.state)
            .progress(&user_id.0, &book_id.0)
            .await
    }

    // ===== Highlights =====

    #[oai(path = "/users/:user_id/books/:book_id/highlights", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id))]
    async fn list_highlights(
        &self,
        user_id: Path<String>,
        book_id: Path<String>,
    ) -> HighlightListResponse {
        HighlightService::new(&self.state)
            .list(&user_id.0, &book_id.0)
            .await
    }

    /// Create a highlight; it is synced in the background when online
    #[oai(path = "/users/:user_id/books/:book_id/highlights", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, user_id, book_id, body))]
    async fn create_highlight(
        &self,
        user_id: Path<String>,
        book_id: Path<String>,
        body: Json<CreateHighlightRequestDto>,
    ) -> CreateHighlightResponse {
        HighlightService::new(&self.state)
            .create(&user_id.0, &book_id.0, body.0)
            .await
    }

    /// Edit note or color locally
    #[oai(path = "/users/:user_id/highlights/:id", method = "patch")]
    #[tracing::instrument(level = "debug", skip(self, user_id, id, body))]
    async fn update_highlight(
        &self,
        user_id: Path<String>,
        id: Path<String>,
        body: Json<UpdateHighlightRequestDto>,
    ) -> HighlightResponse {
        HighlightService::new(&self.state)
            .update(&user_id.0, &id.0, body.0)
            .await
    }

    #[oai(path = "/users/:user_id/highlights/:id", method = "delete")]
    #[tracing::instrument(level = "debug", skip(self, user_id, id))]
    async fn delete_highlight(&self, user_id: Path<String>, id: Path<String>) -> NoContentResponse {
        HighlightService::new(&self.state)
            .delete(&user_id.0, &id.0)
            .await
    }

    // ===== Sync =====

    /// Run a reconciliation pass now
    #[oai(path = "/users/:user_id/sync", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, user_id))]
    async fn sync_all(&self, user_id: Path<String>) -> SyncResponse {
        SyncService::new(&self.state).sync_all(&user_id.0).await
    }

    /// Sign-out: flush open sessions and drop the user's offline data
    #[oai(path = "/users/:user_id/offline-data", method = "delete")]
    #[tracing::instrument(level = "debug", skip(self, user_id))]
    async fn clear_offline_data(&self, user_id: Path<String>) -> NoContentResponse {
        SyncService::new(&self.state)
            .clear_offline_data(&user_id.0)
            .await
    }
}

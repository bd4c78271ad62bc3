use poem_openapi::{payload::Json, types::MaybeUndefined};

use crate::{
    domain::HighlightDraft,
    local_api::{
        AppState,
        models::{
            CreateHighlightRequestDto, CreateHighlightResponse, ErrorDto, HighlightDto,
            HighlightListResponse, HighlightResponse, NoContentResponse,
            UpdateHighlightRequestDto,
        },
    },
    reader::HighlightEdit,
};

pub struct HighlightService<'a> {
    pub state: &'a AppState,
}

impl<'a> HighlightService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list(&self, user_id: &str, book_id: &str) -> HighlightListResponse {
        match self.state.highlights.list(user_id, book_id).await {
            Ok(list) => {
                HighlightListResponse::Ok(Json(list.into_iter().map(HighlightDto::from).collect()))
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to list highlights");
                HighlightListResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    pub async fn create(
        &self,
        user_id: &str,
        book_id: &str,
        body: CreateHighlightRequestDto,
    ) -> CreateHighlightResponse {
        if body.text.trim().is_empty() {
            return CreateHighlightResponse::BadRequest(ErrorDto::new("text must not be empty"));
        }
        let draft = HighlightDraft {
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            text: body.text,
            color: body.color,
            start_cfi: body.start_cfi,
            end_cfi: body.end_cfi,
            page_number: body.page_number,
            ai_action: body.ai_action,
            ai_response: body.ai_response,
            note: body.note,
        };
        match self.state.highlights.create(draft).await {
            Ok(h) => CreateHighlightResponse::Created(Json(h.into())),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to store highlight");
                CreateHighlightResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        body: UpdateHighlightRequestDto,
    ) -> HighlightResponse {
        if body.color.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return HighlightResponse::BadRequest(ErrorDto::new("color must not be empty"));
        }
        let edit = HighlightEdit {
            note: match body.note {
                MaybeUndefined::Undefined => None,
                MaybeUndefined::Null => Some(None),
                MaybeUndefined::Value(note) => Some(Some(note)),
            },
            color: body.color,
        };
        match self.state.highlights.update(user_id, id, edit).await {
            Ok(Some(h)) => HighlightResponse::Ok(Json(h.into())),
            Ok(None) => HighlightResponse::NotFound(ErrorDto::new("Highlight not found")),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to update highlight");
                HighlightResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete(&self, user_id: &str, id: &str) -> NoContentResponse {
        match self.state.highlights.delete(user_id, id).await {
            Ok(true) => NoContentResponse::NoContent,
            Ok(false) => NoContentResponse::NotFound(ErrorDto::new("Highlight not found")),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to delete highlight");
                NoContentResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }
}

use poem_openapi::payload::Json;

use super::library::book_from_request;
use crate::{
    domain::Position,
    local_api::{
        AppState,
        models::{
            ErrorDto, HighlightDto, NoContentResponse, OpenBookRequestDto, OpenBookResponse,
            OpenedBookDto, PositionResponse, ProgressResponse,
        },
    },
};

pub struct ReadingService<'a> {
    pub state: &'a AppState,
}

impl<'a> ReadingService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    pub async fn open(
        &self,
        user_id: &str,
        book_id: &str,
        body: OpenBookRequestDto,
    ) -> OpenBookResponse {
        let book = match body.book {
            Some(req) => match book_from_request(user_id, book_id, req) {
                Ok(book) => Some(book),
                Err(message) => return OpenBookResponse::BadRequest(ErrorDto::new(message)),
            },
            None => None,
        };
        match self.state.sessions.open_book(user_id, book_id, book).await {
            Ok(opened) => OpenBookResponse::Ok(Json(OpenedBookDto {
                book: opened.book.map(Into::into),
                current_position: opened.current.map(|p| p.0),
                highest_position: opened.highest.map(|p| p.0),
                offer_resume: opened.resume.offer_resume,
                resume_to: opened.resume.resume_to.map(|p| p.0),
                highlights: opened
                    .highlights
                    .into_iter()
                    .map(HighlightDto::from)
                    .collect(),
            })),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to open book");
                OpenBookResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, position))]
    pub async fn report_position(
        &self,
        user_id: &str,
        book_id: &str,
        position: serde_json::Value,
    ) -> PositionResponse {
        if let Err(message) = validate_position(&position) {
            return PositionResponse::BadRequest(ErrorDto::new(message));
        }
        self.state
            .sessions
            .report_position(user_id, book_id, Position::new(position))
            .await;
        PositionResponse::Accepted
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn close(&self, user_id: &str, book_id: &str) -> NoContentResponse {
        if self.state.sessions.close_book(user_id, book_id).await {
            NoContentResponse::NoContent
        } else {
            NoContentResponse::NotFound(ErrorDto::new("No open session for this book"))
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn progress(&self, user_id: &str, book_id: &str) -> ProgressResponse {
        match self.state.ctx.store.get_progress(user_id, book_id).await {
            Ok(Some(progress)) => ProgressResponse::Ok(Json(progress.into())),
            Ok(None) => ProgressResponse::NotFound(ErrorDto::new("No progress recorded")),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to read progress");
                ProgressResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }
}

/// A locator is opaque, but a `fraction` it carries must be a number.
fn validate_position(position: &serde_json::Value) -> Result<(), String> {
    match position.get("fraction") {
        None | Some(serde_json::Value::Null) => Ok(()),
        Some(serde_json::Value::Number(n)) if n.as_f64().is_some_and(f64::is_finite) => Ok(()),
        Some(_) => Err("position.fraction must be a finite number".into()),
    }
}

use chrono::Utc;
use poem_openapi::payload::Json;

use crate::{
    domain::{Book, ContentType},
    local_api::{
        AppState,
        models::{BookDto, BookListResponse, BookResponse, ErrorDto, PutBookRequestDto},
    },
};

pub struct LibraryService<'a> {
    pub state: &'a AppState,
}

impl<'a> LibraryService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_books(&self, user_id: &str) -> BookListResponse {
        match self.state.ctx.store.list_books(user_id).await {
            Ok(books) => BookListResponse::Ok(Json(books.into_iter().map(BookDto::from).collect())),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to list cached books");
                BookListResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_book(&self, user_id: &str, book_id: &str) -> BookResponse {
        match self.state.ctx.store.get_book(book_id).await {
            Ok(Some(book)) if book.user_id == user_id => BookResponse::Ok(Json(book.into())),
            Ok(_) => BookResponse::NotFound(ErrorDto::new("Book is not available offline")),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to read cached book");
                BookResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    pub async fn put_book(
        &self,
        user_id: &str,
        book_id: &str,
        body: PutBookRequestDto,
    ) -> BookResponse {
        let book = match book_from_request(user_id, book_id, body) {
            Ok(book) => book,
            Err(message) => return BookResponse::BadRequest(ErrorDto::new(message)),
        };
        match self.state.ctx.store.put_book(&book).await {
            Ok(()) => BookResponse::Ok(Json(book.into())),
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "failed to cache book");
                BookResponse::InternalError(ErrorDto::new(format!("store error: {}", e)))
            }
        }
    }
}

/// Validate book metadata sent by the UI. The cache timestamp is set to now.
pub(crate) fn book_from_request(
    user_id: &str,
    book_id: &str,
    body: PutBookRequestDto,
) -> Result<Book, String> {
    if body.title.trim().is_empty() {
        return Err("title must not be empty".into());
    }
    if body.file_url.trim().is_empty() {
        return Err("file_url must not be empty".into());
    }
    let content_type = body
        .content_type
        .parse::<ContentType>()
        .map_err(|e| e.to_string())?;
    Ok(Book {
        id: book_id.to_string(),
        user_id: user_id.to_string(),
        title: body.title,
        file_url: body.file_url,
        content_type,
        cover_url: body.cover_url,
        total_pages: body.total_pages,
        cached_at: Utc::now(),
    })
}

use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Object, payload::Json, types::MaybeUndefined};

use crate::{
    domain::{Book, Highlight, Progress},
    sync::{SyncOutcome, SyncReport},
};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl ErrorDto {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ===== Connectivity =====

#[derive(Debug, Clone, Object)]
pub struct ConnectivityDto {
    pub online: bool,
}

#[derive(ApiResponse)]
pub enum ConnectivityResponse {
    /// Current connectivity after the update
    #[oai(status = 200)]
    Ok(Json<ConnectivityDto>),
}

// ===== Books =====

#[derive(Debug, Clone, Object)]
pub struct BookDto {
    pub id: String,
    pub title: String,
    pub file_url: String,
    /// `EPUB` or `PDF`
    pub content_type: String,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
    pub cached_at: DateTime<Utc>,
}

impl From<Book> for BookDto {
    fn from(b: Book) -> Self {
        BookDto {
            id: b.id,
            title: b.title,
            file_url: b.file_url,
            content_type: b.content_type.to_string(),
            cover_url: b.cover_url,
            total_pages: b.total_pages,
            cached_at: b.cached_at,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct PutBookRequestDto {
    pub title: String,
    pub file_url: String,
    pub content_type: String,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
}

#[derive(ApiResponse)]
pub enum BookListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<BookDto>>),

    /// Local store error
    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum BookResponse {
    #[oai(status = 200)]
    Ok(Json<BookDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    /// Book is not available offline
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

// ===== Reading =====

#[derive(Debug, Clone, Object)]
pub struct OpenBookRequestDto {
    /// Metadata to cache for offline use; omit to open an already cached book
    pub book: Option<PutBookRequestDto>,
}

#[derive(Debug, Clone, Object)]
pub struct PositionEventDto {
    /// Opaque locator; an optional numeric `fraction` in [0, 1] is interpreted
    pub position: serde_json::Value,
}

#[derive(Debug, Clone, Object)]
pub struct OpenedBookDto {
    pub book: Option<BookDto>,
    pub current_position: Option<serde_json::Value>,
    pub highest_position: Option<serde_json::Value>,
    /// Advisory: the furthest point reached is meaningfully ahead of the current one
    pub offer_resume: bool,
    pub resume_to: Option<serde_json::Value>,
    pub highlights: Vec<HighlightDto>,
}

#[derive(Debug, Clone, Object)]
pub struct ProgressDto {
    pub book_id: String,
    pub position: serde_json::Value,
    pub highest_position: serde_json::Value,
    pub fraction: f64,
    pub highest_fraction: f64,
    pub updated_at: DateTime<Utc>,
    pub synced: bool,
}

impl From<Progress> for ProgressDto {
    fn from(p: Progress) -> Self {
        ProgressDto {
            fraction: p.position.fraction(),
            highest_fraction: p.highest_position.fraction(),
            book_id: p.book_id,
            position: p.position.0,
            highest_position: p.highest_position.0,
            updated_at: p.updated_at,
            synced: p.synced,
        }
    }
}

#[derive(ApiResponse)]
pub enum OpenBookResponse {
    #[oai(status = 200)]
    Ok(Json<OpenedBookDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum PositionResponse {
    /// Position accepted; it is committed after the quiet period
    #[oai(status = 202)]
    Accepted,

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressResponse {
    #[oai(status = 200)]
    Ok(Json<ProgressDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

// ===== Highlights =====

#[derive(Debug, Clone, Object)]
pub struct HighlightDto {
    /// Server id, or `temp-<uuid>` while not yet synced
    pub id: String,
    pub book_id: String,
    pub text: String,
    pub color: String,
    pub start_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub page_number: Option<i32>,
    pub ai_action: Option<String>,
    pub ai_response: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `synced`, `pending_create` or `pending_delete`
    pub sync_status: String,
}

impl From<Highlight> for HighlightDto {
    fn from(h: Highlight) -> Self {
        HighlightDto {
            sync_status: h.sync_status.to_string(),
            id: h.id,
            book_id: h.book_id,
            text: h.text,
            color: h.color,
            start_cfi: h.start_cfi,
            end_cfi: h.end_cfi,
            page_number: h.page_number,
            ai_action: h.ai_action,
            ai_response: h.ai_response,
            note: h.note,
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct CreateHighlightRequestDto {
    pub text: String,
    /// Defaults to `yellow`
    pub color: Option<String>,
    pub start_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub page_number: Option<i32>,
    pub ai_action: Option<String>,
    pub ai_response: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Object)]
pub struct UpdateHighlightRequestDto {
    /// `null` clears the note, absent leaves it unchanged
    pub note: MaybeUndefined<String>,
    pub color: Option<String>,
}

#[derive(ApiResponse)]
pub enum HighlightListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<HighlightDto>>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum CreateHighlightResponse {
    /// Stored locally as `pending_create`
    #[oai(status = 201)]
    Created(Json<HighlightDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum HighlightResponse {
    #[oai(status = 200)]
    Ok(Json<HighlightDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

// ===== Sync =====

#[derive(Debug, Clone, Object)]
pub struct SyncReportDto {
    /// `completed`, `already_running` or `offline`
    pub outcome: String,
    pub highlights_created: u64,
    pub highlights_deleted: u64,
    pub progress_saved: u64,
    pub failed: u64,
}

impl From<SyncOutcome> for SyncReportDto {
    fn from(outcome: SyncOutcome) -> Self {
        let (name, report) = match outcome {
            SyncOutcome::Completed(report) => ("completed", report),
            SyncOutcome::AlreadyRunning => ("already_running", SyncReport::default()),
            SyncOutcome::Offline => ("offline", SyncReport::default()),
        };
        SyncReportDto {
            outcome: name.to_string(),
            highlights_created: report.highlights_created as u64,
            highlights_deleted: report.highlights_deleted as u64,
            progress_saved: report.progress_saved as u64,
            failed: report.failed as u64,
        }
    }
}

#[derive(ApiResponse)]
pub enum SyncResponse {
    /// Outcome of the pass; remote failures never surface as errors
    #[oai(status = 200)]
    Ok(Json<SyncReportDto>),
}

#[derive(ApiResponse)]
pub enum NoContentResponse {
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

// Domain models for the three record kinds kept in the offline store

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub use crate::sync::status::SyncStatus;

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "yellow";
const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "EPUB")]
    Epub,
    #[serde(rename = "PDF")]
    Pdf,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Epub => "EPUB",
            ContentType::Pdf => "PDF",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EPUB" => Ok(ContentType::Epub),
            "PDF" => Ok(ContentType::Pdf),
            other => Err(anyhow::anyhow!("unknown content type: {}", other)),
        }
    }
}

/// Locally cached book metadata. Never evicted by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub file_url: String,
    pub content_type: ContentType,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
    pub cached_at: DateTime<Utc>,
}

/// An opaque reading locator (CFI, page number, ...). The only part this crate
/// interprets is the optional `fraction` field, an offset into the book in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub serde_json::Value);

impl Position {
    pub fn new(value: serde_json::Value) -> Self {
        Position(value)
    }

    pub fn at_fraction(fraction: f64) -> Self {
        Position(json!({ "fraction": fraction }))
    }

    /// Fraction carried by the locator; 0 when it has none.
    pub fn fraction(&self) -> f64 {
        self.0
            .get("fraction")
            .and_then(serde_json::Value::as_f64)
            .filter(|f| f.is_finite())
            .unwrap_or(0.0)
    }

    /// Fraction as accepted by the remote authority.
    pub fn remote_fraction(&self) -> f64 {
        self.fraction().clamp(0.0, 1.0)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// User-supplied content of a new highlight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighlightDraft {
    pub book_id: String,
    pub user_id: String,
    pub text: String,
    pub color: Option<String>,
    pub start_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub page_number: Option<i32>,
    pub ai_action: Option<String>,
    pub ai_response: Option<String>,
    pub note: Option<String>,
}

/// Local-only edit of a highlight. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightEdit {
    pub note: Option<Option<String>>,
    pub color: Option<String>,
}

impl HighlightEdit {
    pub fn is_empty(&self) -> bool {
        self.note.is_none() && self.color.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    /// Server id once synced, otherwise equal to `temp_id`.
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub text: String,
    pub color: String,
    pub start_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub page_number: Option<i32>,
    pub ai_action: Option<String>,
    pub ai_response: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Present only while the record is `pending_create`.
    pub temp_id: Option<String>,
}

impl Highlight {
    /// A freshly created highlight that has not reached the remote authority.
    pub fn pending(draft: HighlightDraft, now: DateTime<Utc>) -> Self {
        let temp_id = new_temp_id();
        Highlight {
            id: temp_id.clone(),
            book_id: draft.book_id,
            user_id: draft.user_id,
            text: draft.text,
            color: draft
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string()),
            start_cfi: draft.start_cfi,
            end_cfi: draft.end_cfi,
            page_number: draft.page_number,
            ai_action: draft.ai_action,
            ai_response: draft.ai_response,
            note: draft.note,
            created_at: now,
            sync_status: SyncStatus::PendingCreate,
            temp_id: Some(temp_id),
        }
    }

    /// A temp id is present exactly when the record is `pending_create`, and a
    /// synced record never carries a temp-looking id.
    pub fn has_consistent_identity(&self) -> bool {
        match (&self.temp_id, self.sync_status) {
            (Some(temp), SyncStatus::PendingCreate) => *temp == self.id,
            (Some(_), _) => false,
            (None, SyncStatus::PendingCreate) => false,
            (None, SyncStatus::Synced) => !is_temp_id(&self.id),
            (None, SyncStatus::PendingDelete) => true,
        }
    }
}

pub fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Progress for one (user, book) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub user_id: String,
    pub book_id: String,
    /// Latest reported location, may move backwards.
    pub position: Position,
    /// Furthest location ever reported; its fraction never decreases.
    pub highest_position: Position,
    pub updated_at: DateTime<Utc>,
    pub synced: bool,
}

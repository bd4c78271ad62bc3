// Mapping between SeaORM rows and domain models

use anyhow::Context;
use chrono::{DateTime, Utc};
use entities::{book, highlight, reading_progress};
use sea_orm::ActiveValue::Set;

use super::models::{Book, Highlight, Position, Progress, SyncStatus};

pub fn millis_to_datetime(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("timestamp out of range: {}", ms))
}

pub fn book_from_model(m: book::Model) -> anyhow::Result<Book> {
    Ok(Book {
        content_type: m
            .file_type
            .parse()
            .with_context(|| format!("book {} has invalid file type", m.id))?,
        cached_at: millis_to_datetime(m.cached_at)?,
        id: m.id,
        user_id: m.user_id,
        title: m.title,
        file_url: m.file_url,
        cover_url: m.cover_url,
        total_pages: m.total_pages,
    })
}

pub fn book_to_active(b: &Book) -> book::ActiveModel {
    book::ActiveModel {
        id: Set(b.id.clone()),
        user_id: Set(b.user_id.clone()),
        title: Set(b.title.clone()),
        file_url: Set(b.file_url.clone()),
        file_type: Set(b.content_type.as_str().to_string()),
        cover_url: Set(b.cover_url.clone()),
        total_pages: Set(b.total_pages),
        cached_at: Set(b.cached_at.timestamp_millis()),
    }
}

pub fn highlight_from_model(m: highlight::Model) -> anyhow::Result<Highlight> {
    Ok(Highlight {
        sync_status: m
            .sync_status
            .parse::<SyncStatus>()
            .with_context(|| format!("highlight {} has invalid sync status", m.id))?,
        created_at: millis_to_datetime(m.created_at)?,
        id: m.id,
        book_id: m.book_id,
        user_id: m.user_id,
        text: m.text,
        color: m.color,
        start_cfi: m.start_cfi,
        end_cfi: m.end_cfi,
        page_number: m.page_number,
        ai_action: m.ai_action,
        ai_response: m.ai_response,
        note: m.note,
        temp_id: m.temp_id,
    })
}

pub fn highlight_to_active(h: &Highlight) -> highlight::ActiveModel {
    highlight::ActiveModel {
        id: Set(h.id.clone()),
        book_id: Set(h.book_id.clone()),
        user_id: Set(h.user_id.clone()),
        text: Set(h.text.clone()),
        color: Set(h.color.clone()),
        start_cfi: Set(h.start_cfi.clone()),
        end_cfi: Set(h.end_cfi.clone()),
        page_number: Set(h.page_number),
        ai_action: Set(h.ai_action.clone()),
        ai_response: Set(h.ai_response.clone()),
        note: Set(h.note.clone()),
        created_at: Set(h.created_at.timestamp_millis()),
        sync_status: Set(h.sync_status.as_str().to_string()),
        temp_id: Set(h.temp_id.clone()),
    }
}

pub fn progress_from_model(m: reading_progress::Model) -> anyhow::Result<Progress> {
    let position: Position = serde_json::from_str(&m.position)
        .with_context(|| format!("invalid stored position for book {}", m.book_id))?;
    let highest_position: Position = serde_json::from_str(&m.highest_position)
        .with_context(|| format!("invalid stored highest position for book {}", m.book_id))?;
    Ok(Progress {
        updated_at: millis_to_datetime(m.updated_at)?,
        user_id: m.user_id,
        book_id: m.book_id,
        position,
        highest_position,
        synced: m.synced,
    })
}

pub fn progress_to_active(p: &Progress) -> anyhow::Result<reading_progress::ActiveModel> {
    Ok(reading_progress::ActiveModel {
        user_id: Set(p.user_id.clone()),
        book_id: Set(p.book_id.clone()),
        position: Set(serde_json::to_string(&p.position)?),
        highest_position: Set(serde_json::to_string(&p.highest_position)?),
        updated_at: Set(p.updated_at.timestamp_millis()),
        synced: Set(p.synced),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_row_decodes_json_locators() {
        let row = reading_progress::Model {
            user_id: "u".into(),
            book_id: "b".into(),
            position: r#"{"cfi":"epubcfi(/6/8)","fraction":0.3}"#.into(),
            highest_position: r#"{"fraction":0.55}"#.into(),
            updated_at: 1_700_000_000_123,
            synced: false,
        };
        let p = progress_from_model(row).unwrap();
        assert_eq!(p.position.fraction(), 0.3);
        assert_eq!(p.position.as_value()["cfi"], json!("epubcfi(/6/8)"));
        assert_eq!(p.highest_position.fraction(), 0.55);
        assert_eq!(p.updated_at.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn unknown_sync_status_is_rejected() {
        let row = highlight::Model {
            id: "h1".into(),
            book_id: "b".into(),
            user_id: "u".into(),
            text: "t".into(),
            color: "yellow".into(),
            start_cfi: None,
            end_cfi: None,
            page_number: None,
            ai_action: None,
            ai_response: None,
            note: None,
            created_at: 0,
            sync_status: "failed".into(),
            temp_id: None,
        };
        assert!(highlight_from_model(row).is_err());
    }

    #[test]
    fn book_row_decodes_file_type() {
        let row = book::Model {
            id: "b".into(),
            user_id: "u".into(),
            title: "Middlemarch".into(),
            file_url: "https://files.example/b.pdf".into(),
            file_type: "PDF".into(),
            cover_url: None,
            total_pages: Some(880),
            cached_at: 0,
        };
        let b = book_from_model(row).unwrap();
        assert_eq!(b.content_type.as_str(), "PDF");
        assert_eq!(b.total_pages, Some(880));
    }
}

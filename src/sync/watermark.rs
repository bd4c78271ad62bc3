use chrono::{DateTime, Utc};

use crate::domain::{Position, Progress};

/// Highest position after `reported` is observed. Ratchets forward only: the
/// previous highest is kept unless the new fraction is strictly greater.
pub fn merge_highest(previous: Option<&Position>, reported: &Position) -> Position {
    let high = previous.map(Position::fraction).unwrap_or(0.0);
    if reported.fraction() > high {
        return reported.clone();
    }
    previous.cloned().unwrap_or_else(|| reported.clone())
}

/// Fold a position report into the stored progress for (user, book). The
/// result is always unsynced; `position` always takes the latest report.
pub fn advance(
    existing: Option<&Progress>,
    user_id: &str,
    book_id: &str,
    reported: Position,
    now: DateTime<Utc>,
) -> Progress {
    let highest_position = merge_highest(existing.map(|p| &p.highest_position), &reported);
    Progress {
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        position: reported,
        highest_position,
        updated_at: now,
        synced: false,
    }
}

use crate::domain::{Position, Progress};

/// Discrepancies at or below this are treated as noise.
pub const RESUME_MARGIN: f64 = 0.02;

/// Offer to jump forward only when the furthest point reached is meaningfully
/// ahead of where the reader currently is.
pub fn should_offer_resume(current_fraction: f64, highest_fraction: f64) -> bool {
    highest_fraction > current_fraction + RESUME_MARGIN
}

/// Advisory resume prompt, evaluated once when a book is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeDecision {
    pub offer_resume: bool,
    pub resume_to: Option<Position>,
}

impl ResumeDecision {
    pub fn for_progress(progress: Option<&Progress>) -> Self {
        match progress {
            Some(p)
                if should_offer_resume(p.position.fraction(), p.highest_position.fraction()) =>
            {
                ResumeDecision {
                    offer_resume: true,
                    resume_to: Some(p.highest_position.clone()),
                }
            }
            _ => ResumeDecision {
                offer_resume: false,
                resume_to: None,
            },
        }
    }
}

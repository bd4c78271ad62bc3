//! SeaORM entities for the offline store.

pub mod book;
pub mod highlight;
pub mod prelude;
pub mod reading_progress;

pub use super::book::Entity as Book;
pub use super::highlight::Entity as Highlight;
pub use super::reading_progress::Entity as ReadingProgress;

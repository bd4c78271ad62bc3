pub use sea_orm_migration::prelude::*;

mod m20251004_181502_create_books_table;
mod m20251004_181733_create_highlights_table;
mod m20251004_182019_create_reading_progress_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251004_181502_create_books_table::Migration),
            Box::new(m20251004_181733_create_highlights_table::Migration),
            Box::new(m20251004_182019_create_reading_progress_table::Migration),
        ]
    }
}

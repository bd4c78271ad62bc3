use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Highlights::Table)
                    .if_not_exists()
                    .col(string(Highlights::Id).primary_key())
                    .col(string(Highlights::BookId))
                    .col(string(Highlights::UserId))
                    .col(text(Highlights::Text))
                    .col(string(Highlights::Color))
                    .col(string_null(Highlights::StartCfi))
                    .col(string_null(Highlights::EndCfi))
                    .col(integer_null(Highlights::PageNumber))
                    .col(string_null(Highlights::AiAction))
                    .col(text_null(Highlights::AiResponse))
                    .col(text_null(Highlights::Note))
                    .col(big_integer(Highlights::CreatedAt))
                    .col(string(Highlights::SyncStatus))
                    .col(string_null(Highlights::TempId))
                    .to_owned(),
            )
            .await?;

        // Lookups by book for the reader and by status for reconciliation.
        manager
            .create_index(
                Index::create()
                    .name("idx_highlights_book_id")
                    .table(Highlights::Table)
                    .col(Highlights::BookId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_highlights_sync_status")
                    .table(Highlights::Table)
                    .col(Highlights::SyncStatus)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Highlights::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Highlights {
    Table,
    Id,
    BookId,
    UserId,
    Text,
    Color,
    StartCfi,
    EndCfi,
    PageNumber,
    AiAction,
    AiResponse,
    Note,
    CreatedAt,
    SyncStatus,
    TempId,
}

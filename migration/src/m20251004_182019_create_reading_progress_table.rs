use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReadingProgress::Table)
                    .if_not_exists()
                    .col(string(ReadingProgress::UserId))
                    .col(string(ReadingProgress::BookId))
                    .col(text(ReadingProgress::Position))
                    .col(text(ReadingProgress::HighestPosition))
                    .col(big_integer(ReadingProgress::UpdatedAt))
                    .col(boolean(ReadingProgress::Synced))
                    .primary_key(
                        Index::create()
                            .col(ReadingProgress::UserId)
                            .col(ReadingProgress::BookId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reading_progress_synced")
                    .table(ReadingProgress::Table)
                    .col(ReadingProgress::Synced)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReadingProgress::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ReadingProgress {
    Table,
    UserId,
    BookId,
    Position,
    HighestPosition,
    UpdatedAt,
    Synced,
}

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Books::Table)
                    .if_not_exists()
                    .col(string(Books::Id).primary_key())
                    .col(string(Books::UserId))
                    .col(string(Books::Title))
                    .col(string(Books::FileUrl))
                    .col(string(Books::FileType))
                    .col(string_null(Books::CoverUrl))
                    .col(integer_null(Books::TotalPages))
                    .col(big_integer(Books::CachedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_books_user_id")
                    .table(Books::Table)
                    .col(Books::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Books::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Books {
    Table,
    Id,
    UserId,
    Title,
    FileUrl,
    FileType,
    CoverUrl,
    TotalPages,
    CachedAt,
}

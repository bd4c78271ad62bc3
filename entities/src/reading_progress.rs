use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reading_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    /// JSON-encoded locator
    #[sea_orm(column_type = "Text")]
    pub position: String,
    /// JSON-encoded locator of the furthest point reached
    #[sea_orm(column_type = "Text")]
    pub highest_position: String,
    /// Epoch milliseconds
    pub updated_at: i64,
    pub synced: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

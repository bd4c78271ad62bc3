use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "highlights")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    #[sea_orm(column_type = "Text")]
    pub text: String,
    pub color: String,
    pub start_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub page_number: Option<i32>,
    pub ai_action: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ai_response: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// `synced`, `pending_create` or `pending_delete`
    pub sync_status: String,
    pub temp_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

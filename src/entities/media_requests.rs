use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub media_kind: String,
    pub title: String,
    pub year: Option<i32>,
    pub catalog_id: Option<i64>,
    pub content_id: Option<String>,
    pub status: String,
    pub search_attempts: i32,
    pub error_message: Option<String>,
    pub error_count: i32,
    pub last_error_at: Option<String>,
    pub last_checked_at: Option<String>,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

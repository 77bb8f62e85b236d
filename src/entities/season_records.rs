use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "season_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub show_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub season_number: i32,
    pub episode_count: Option<i32>,
    pub aired_episode_count: Option<i32>,
    /// JSON array of episode tags, e.g. `["E01","E02"]`.
    pub confirmed_episodes: String,
    pub failed_episodes: String,
    pub unprocessed_episodes: String,
    pub is_complete: bool,
    pub completion_method: Option<String>,
    pub is_discrepant: bool,
    pub discrepancy_reason: Option<String>,
    pub status: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

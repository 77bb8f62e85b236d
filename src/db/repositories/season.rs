use crate::domain::{EpisodeTag, ShowId};
use crate::entities::{prelude::*, season_records};
use crate::models::{CompletionMethod, SeasonRecord, SeasonStatus};
use crate::services::StoreError;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::BTreeSet;

/// Repository for per-season confirmation records
pub struct SeasonRepository {
    conn: DatabaseConnection,
}

impl SeasonRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn to_db_count(count: Option<u32>) -> Result<Option<i32>> {
        count
            .map(i32::try_from)
            .transpose()
            .context("episode count out of range")
    }

    fn from_db_count(count: Option<i32>) -> Result<Option<u32>> {
        count
            .map(u32::try_from)
            .transpose()
            .context("negative episode count in season record")
    }

    fn encode_tags(tags: &BTreeSet<EpisodeTag>) -> Result<String> {
        Ok(serde_json::to_string(tags)?)
    }

    fn decode_tags(raw: &str) -> Result<BTreeSet<EpisodeTag>> {
        if raw.is_empty() {
            return Ok(BTreeSet::new());
        }
        serde_json::from_str(raw).with_context(|| format!("invalid episode set: {raw}"))
    }

    fn corrupt(err: anyhow::Error) -> anyhow::Error {
        anyhow!(StoreError::Corrupt(format!("{err:#}")))
    }

    fn map_model(m: season_records::Model) -> Result<SeasonRecord> {
        let updated_at = DateTime::parse_from_rfc3339(&m.updated_at)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(SeasonRecord {
            show_id: ShowId::new(m.show_id),
            season_number: u32::try_from(m.season_number)
                .context("negative season number in season record")?,
            episode_count: Self::from_db_count(m.episode_count)?,
            aired_episode_count: Self::from_db_count(m.aired_episode_count)?,
            confirmed_episodes: Self::decode_tags(&m.confirmed_episodes)?,
            failed_episodes: Self::decode_tags(&m.failed_episodes)?,
            unprocessed_episodes: Self::decode_tags(&m.unprocessed_episodes)?,
            is_complete: m.is_complete,
            completion_method: m
                .completion_method
                .as_deref()
                .map(str::parse::<CompletionMethod>)
                .transpose()?,
            is_discrepant: m.is_discrepant,
            discrepancy_reason: m.discrepancy_reason,
            status: m.status.parse::<SeasonStatus>()?,
            updated_at,
        })
    }

    pub async fn get(&self, show_id: ShowId, season: u32) -> Result<Option<SeasonRecord>> {
        let season = i32::try_from(season).context("season number out of range")?;
        let row = SeasonRecords::find_by_id((show_id.value(), season))
            .one(&self.conn)
            .await?;

        row.map(Self::map_model).transpose().map_err(Self::corrupt)
    }

    pub async fn list_for_show(&self, show_id: ShowId) -> Result<Vec<SeasonRecord>> {
        let rows = SeasonRecords::find()
            .filter(season_records::Column::ShowId.eq(show_id.value()))
            .order_by_asc(season_records::Column::SeasonNumber)
            .all(&self.conn)
            .await?;

        rows.into_iter()
            .map(Self::map_model)
            .collect::<Result<Vec<_>>>()
            .map_err(Self::corrupt)
    }

    /// Single-statement upsert of the whole record.
    pub async fn upsert(&self, record: &SeasonRecord) -> Result<()> {
        let active_model = season_records::ActiveModel {
            show_id: Set(record.show_id.value()),
            season_number: Set(
                i32::try_from(record.season_number).context("season number out of range")?
            ),
            episode_count: Set(Self::to_db_count(record.episode_count)?),
            aired_episode_count: Set(Self::to_db_count(record.aired_episode_count)?),
            confirmed_episodes: Set(Self::encode_tags(&record.confirmed_episodes)?),
            failed_episodes: Set(Self::encode_tags(&record.failed_episodes)?),
            unprocessed_episodes: Set(Self::encode_tags(&record.unprocessed_episodes)?),
            is_complete: Set(record.is_complete),
            completion_method: Set(record.completion_method.map(|m| m.as_str().to_string())),
            is_discrepant: Set(record.is_discrepant),
            discrepancy_reason: Set(record.discrepancy_reason.clone()),
            status: Set(record.status.as_str().to_string()),
            updated_at: Set(record.updated_at.to_rfc3339()),
        };

        SeasonRecords::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    season_records::Column::ShowId,
                    season_records::Column::SeasonNumber,
                ])
                .update_columns([
                    season_records::Column::EpisodeCount,
                    season_records::Column::AiredEpisodeCount,
                    season_records::Column::ConfirmedEpisodes,
                    season_records::Column::FailedEpisodes,
                    season_records::Column::UnprocessedEpisodes,
                    season_records::Column::IsComplete,
                    season_records::Column::CompletionMethod,
                    season_records::Column::IsDiscrepant,
                    season_records::Column::DiscrepancyReason,
                    season_records::Column::Status,
                    season_records::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        Ok(())
    }
}

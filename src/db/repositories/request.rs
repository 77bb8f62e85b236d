use crate::domain::{MediaRequest, RequestId};
use crate::entities::{media_requests, prelude::*};
use crate::models::{RequestRecord, RequestStatus};
use anyhow::{Result, anyhow};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Repository for the media request ledger
pub struct RequestRepository {
    conn: DatabaseConnection,
}

impl RequestRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    fn map_model(m: media_requests::Model) -> Result<RequestRecord> {
        Ok(RequestRecord {
            id: RequestId::new(m.id),
            status: m.status.parse::<RequestStatus>().map_err(|e| anyhow!(e))?,
            search_attempts: u32::try_from(m.search_attempts).unwrap_or(0),
            error_message: m.error_message,
            error_count: u32::try_from(m.error_count).unwrap_or(0),
            last_error_at: m.last_error_at,
            last_checked_at: m.last_checked_at,
        })
    }

    async fn find(&self, id: RequestId) -> Result<Option<media_requests::Model>> {
        Ok(MediaRequests::find_by_id(id.value()).one(&self.conn).await?)
    }

    async fn require(&self, id: RequestId) -> Result<media_requests::Model> {
        self.find(id)
            .await?
            .ok_or_else(|| anyhow!(crate::services::StoreError::NotFound(format!("request {id}"))))
    }

    pub async fn get(&self, id: RequestId) -> Result<Option<RequestRecord>> {
        self.find(id).await?.map(Self::map_model).transpose()
    }

    pub async fn register(&self, request: &MediaRequest) -> Result<()> {
        let active_model = media_requests::ActiveModel {
            id: Set(request.id.value()),
            media_kind: Set(request.kind.as_str().to_string()),
            title: Set(request.title.clone()),
            year: Set(request.year),
            catalog_id: Set(request.catalog_id),
            content_id: Set(request.content_id.clone()),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            search_attempts: Set(0),
            error_message: Set(None),
            error_count: Set(0),
            last_error_at: Set(None),
            last_checked_at: Set(None),
            updated_at: Set(Self::now()),
        };

        MediaRequests::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(media_requests::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<()> {
        let mut model: media_requests::ActiveModel = self.require(id).await?.into();
        model.status = Set(status.as_str().to_string());
        model.updated_at = Set(Self::now());
        model.update(&self.conn).await?;
        Ok(())
    }

    pub async fn begin_attempt(&self, id: RequestId) -> Result<()> {
        let existing = self.require(id).await?;
        let attempts = existing.search_attempts.saturating_add(1);
        let mut model: media_requests::ActiveModel = existing.into();
        model.status = Set(RequestStatus::Processing.as_str().to_string());
        model.search_attempts = Set(attempts);
        model.last_checked_at = Set(Some(Self::now()));
        model.updated_at = Set(Self::now());
        model.update(&self.conn).await?;
        Ok(())
    }

    pub async fn record_error(&self, id: RequestId, message: &str) -> Result<()> {
        let existing = self.require(id).await?;
        let count = existing.error_count.saturating_add(1);
        let mut model: media_requests::ActiveModel = existing.into();
        model.error_message = Set(Some(message.to_string()));
        model.error_count = Set(count);
        model.last_error_at = Set(Some(Self::now()));
        model.updated_at = Set(Self::now());
        model.update(&self.conn).await?;
        Ok(())
    }
}

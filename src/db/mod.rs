use crate::domain::{MediaRequest, RequestId, ShowId};
use crate::models::{HistoryEntry, RequestRecord, RequestStatus, SeasonRecord};
use crate::services::store::{StateStore, StoreError};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    /// Private in-memory database, mostly for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::with_pool_options("sqlite::memory:", 1, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        let mut opt = ConnectOptions::new(db_url.to_string());
        if in_memory {
            // Every pooled connection would otherwise see its own empty database.
            opt.max_connections(1).min_connections(1);
        } else {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }

            opt.max_connections(max_connections)
                .min_connections(min_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn season_repo(&self) -> repositories::season::SeasonRepository {
        repositories::season::SeasonRepository::new(self.conn.clone())
    }

    fn request_repo(&self) -> repositories::request::RequestRepository {
        repositories::request::RequestRepository::new(self.conn.clone())
    }

    fn history_repo(&self) -> repositories::history::HistoryRepository {
        repositories::history::HistoryRepository::new(self.conn.clone())
    }
}

#[async_trait::async_trait]
impl StateStore for Store {
    async fn load_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Option<SeasonRecord>, StoreError> {
        Ok(self.season_repo().get(show_id, season).await?)
    }

    async fn save_season(&self, record: &SeasonRecord) -> Result<(), StoreError> {
        Ok(self.season_repo().upsert(record).await?)
    }

    async fn list_seasons(&self, show_id: ShowId) -> Result<Vec<SeasonRecord>, StoreError> {
        Ok(self.season_repo().list_for_show(show_id).await?)
    }

    async fn register_request(&self, request: &MediaRequest) -> Result<(), StoreError> {
        Ok(self.request_repo().register(request).await?)
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<RequestRecord>, StoreError> {
        Ok(self.request_repo().get(id).await?)
    }

    async fn set_request_status(
        &self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), StoreError> {
        Ok(self.request_repo().set_status(id, status).await?)
    }

    async fn begin_request_attempt(&self, id: RequestId) -> Result<(), StoreError> {
        Ok(self.request_repo().begin_attempt(id).await?)
    }

    async fn record_request_error(&self, id: RequestId, message: &str) -> Result<(), StoreError> {
        Ok(self.request_repo().record_error(id, message).await?)
    }

    async fn record_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        Ok(self.history_repo().record(entry).await?)
    }

    async fn recent_history(&self, limit: u64) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.history_repo().recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EpisodeTag, MediaKind};
    use crate::models::CompletionMethod;

    fn request(id: i64) -> MediaRequest {
        MediaRequest {
            id: RequestId::new(id),
            kind: MediaKind::Show,
            title: "Some Show".to_string(),
            year: None,
            catalog_id: Some(500),
            content_id: None,
            seasons: vec![1],
            season_metadata: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_season_record_round_trip() {
        let store = Store::in_memory().await.unwrap();
        store.ping().await.unwrap();

        let mut record = SeasonRecord::new(ShowId::new(500), 2, Some(8), Some(5));
        record.confirm_episode(EpisodeTag::new(1)).unwrap();
        record.fail_episode(EpisodeTag::new(2)).unwrap();
        record.mark_partially_aired();
        store.save_season(&record).await.unwrap();

        let loaded = store.load_season(ShowId::new(500), 2).await.unwrap().unwrap();
        assert_eq!(loaded.confirmed_episodes, record.confirmed_episodes);
        assert_eq!(loaded.failed_episodes, record.failed_episodes);
        assert_eq!(loaded.unprocessed_episodes, record.unprocessed_episodes);
        assert_eq!(loaded.status, record.status);
        assert_eq!(loaded.discrepancy_reason, record.discrepancy_reason);

        record.complete_with_pack(CompletionMethod::WithExtrasPack).unwrap();
        store.save_season(&record).await.unwrap();
        let seasons = store.list_seasons(ShowId::new(500)).await.unwrap();
        assert_eq!(seasons.len(), 1);
        assert!(seasons[0].is_completed());
    }

    #[tokio::test]
    async fn test_request_ledger() {
        let store = Store::in_memory().await.unwrap();
        let id = RequestId::new(9);

        store.register_request(&request(9)).await.unwrap();
        store.register_request(&request(9)).await.unwrap();
        assert_eq!(
            store.request_status(id).await.unwrap(),
            Some(RequestStatus::Pending)
        );

        store.begin_request_attempt(id).await.unwrap();
        store.begin_request_attempt(id).await.unwrap();
        store.record_request_error(id, "search timed out").await.unwrap();

        let record = store.get_request(id).await.unwrap().unwrap();
        assert_eq!(record.status, RequestStatus::Processing);
        assert_eq!(record.search_attempts, 2);
        assert_eq!(record.error_count, 1);
        assert_eq!(record.error_message.as_deref(), Some("search timed out"));
        assert!(record.last_checked_at.is_some());

        let missing = store
            .set_request_status(RequestId::new(404), RequestStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recent_history_is_newest_first() {
        let store = Store::in_memory().await.unwrap();
        for n in 1..=3 {
            store
                .record_history(&HistoryEntry {
                    run_id: format!("run-{n}"),
                    request_id: RequestId::new(n),
                    title: "Some Show".to_string(),
                    outcome: "confirmed".to_string(),
                    seasons_completed: 1,
                    seasons_partial: 0,
                    seasons_failed: 0,
                    duration_ms: 12,
                    recorded_at: chrono::Utc::now().to_rfc3339(),
                })
                .await
                .unwrap();
        }

        let recent = store.recent_history(2).await.unwrap();
        let runs: Vec<&str> = recent.iter().map(|e| e.run_id.as_str()).collect();
        assert_eq!(runs, ["run-3", "run-2"]);
    }
}

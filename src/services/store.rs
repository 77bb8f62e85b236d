//! State store boundary for season records, the request ledger and history.
//!
//! The engine only talks to persistence through [`StateStore`]. Each
//! `save_season` call writes the whole record in one statement, so a failure
//! never leaves a half-updated season behind.

use crate::domain::{MediaRequest, RequestId, ShowId};
use crate::models::{HistoryEntry, RequestRecord, RequestStatus, SeasonRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(store) => store,
            Err(other) => Self::Database(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Option<SeasonRecord>, StoreError>;

    /// Persists the full record atomically.
    async fn save_season(&self, record: &SeasonRecord) -> Result<(), StoreError>;

    async fn list_seasons(&self, show_id: ShowId) -> Result<Vec<SeasonRecord>, StoreError>;

    /// Registers the request if unknown. Existing ledger rows are left as is.
    async fn register_request(&self, request: &MediaRequest) -> Result<(), StoreError>;

    async fn get_request(&self, id: RequestId) -> Result<Option<RequestRecord>, StoreError>;

    async fn request_status(&self, id: RequestId) -> Result<Option<RequestStatus>, StoreError> {
        Ok(self.get_request(id).await?.map(|r| r.status))
    }

    async fn set_request_status(
        &self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), StoreError>;

    /// Marks the request `processing` and bumps its attempt counter.
    async fn begin_request_attempt(&self, id: RequestId) -> Result<(), StoreError>;

    async fn record_request_error(&self, id: RequestId, message: &str) -> Result<(), StoreError>;

    async fn record_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    async fn recent_history(&self, limit: u64) -> Result<Vec<HistoryEntry>, StoreError>;
}

use crate::domain::RequestId;
use crate::entities::{prelude::*, reconcile_history};
use crate::models::HistoryEntry;
use anyhow::Result;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

/// Repository for reconciliation pass history
pub struct HistoryRepository {
    conn: DatabaseConnection,
}

impl HistoryRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: reconcile_history::Model) -> HistoryEntry {
        HistoryEntry {
            run_id: m.run_id,
            request_id: RequestId::new(m.request_id),
            title: m.title,
            outcome: m.outcome,
            seasons_completed: u32::try_from(m.seasons_completed).unwrap_or(0),
            seasons_partial: u32::try_from(m.seasons_partial).unwrap_or(0),
            seasons_failed: u32::try_from(m.seasons_failed).unwrap_or(0),
            duration_ms: m.duration_ms,
            recorded_at: m.recorded_at,
        }
    }

    fn to_db(n: u32) -> i32 {
        i32::try_from(n).unwrap_or(i32::MAX)
    }

    pub async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        let active_model = reconcile_history::ActiveModel {
            run_id: Set(entry.run_id.clone()),
            request_id: Set(entry.request_id.value()),
            title: Set(entry.title.clone()),
            outcome: Set(entry.outcome.clone()),
            seasons_completed: Set(Self::to_db(entry.seasons_completed)),
            seasons_partial: Set(Self::to_db(entry.seasons_partial)),
            seasons_failed: Set(Self::to_db(entry.seasons_failed)),
            duration_ms: Set(entry.duration_ms),
            recorded_at: Set(entry.recorded_at.clone()),
            ..Default::default()
        };

        ReconcileHistory::insert(active_model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<HistoryEntry>> {
        let rows = ReconcileHistory::find()
            .order_by_desc(reconcile_history::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }
}

//! Serialized read-modify-write access to season records.
//!
//! Every transition loads the persisted record, applies one
//! [`SeasonRecord`] method and writes the whole record back, all while
//! holding a lock keyed by `(show, season)`. If the write fails the
//! in-memory change is discarded and the stored record stays as it was.

use super::store::{StateStore, StoreError};
use crate::domain::{EpisodeTag, ShowId};
use crate::models::{CompletionMethod, SeasonError, SeasonRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Season(#[from] SeasonError),

    #[error("No record for show {show} season {season}")]
    Missing { show: ShowId, season: u32 },
}

type SeasonKey = (ShowId, u32);

#[derive(Clone)]
pub struct SeasonTracker {
    store: Arc<dyn StateStore>,
    locks: Arc<Mutex<HashMap<SeasonKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SeasonTracker {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    fn lock_for(&self, key: SeasonKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }

    pub async fn load(&self, show: ShowId, season: u32) -> Result<Option<SeasonRecord>, StoreError> {
        self.store.load_season(show, season).await
    }

    pub async fn list(&self, show: ShowId) -> Result<Vec<SeasonRecord>, StoreError> {
        self.store.list_seasons(show).await
    }

    /// Applies `apply` to the stored record and persists the result.
    pub async fn update<F>(
        &self,
        show: ShowId,
        season: u32,
        apply: F,
    ) -> Result<SeasonRecord, TrackerError>
    where
        F: FnOnce(&mut SeasonRecord) -> Result<(), SeasonError> + Send,
    {
        let lock = self.lock_for((show, season));
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .load_season(show, season)
            .await?
            .ok_or(TrackerError::Missing { show, season })?;

        apply(&mut record)?;
        self.store.save_season(&record).await?;

        debug!(
            show_id = %show,
            season,
            status = %record.status,
            confirmed = record.confirmed_episodes.len(),
            failed = record.failed_episodes.len(),
            unprocessed = record.unprocessed_episodes.len(),
            "Season record updated"
        );
        Ok(record)
    }

    /// Creates the record on first sight, otherwise applies the new counts.
    pub async fn sync_metadata(
        &self,
        show: ShowId,
        season: u32,
        episode_count: Option<u32>,
        aired_episode_count: Option<u32>,
    ) -> Result<SeasonRecord, TrackerError> {
        let lock = self.lock_for((show, season));
        let _guard = lock.lock().await;

        let record = match self.store.load_season(show, season).await? {
            Some(mut existing) => {
                let unchanged = episode_count.is_none_or(|n| existing.episode_count == Some(n))
                    && aired_episode_count
                        .is_none_or(|n| existing.aired_episode_count == Some(n));
                if unchanged {
                    return Ok(existing);
                }
                existing.sync_metadata(episode_count, aired_episode_count);
                existing
            }
            None => {
                debug!(show_id = %show, season, "Creating season record");
                SeasonRecord::new(show, season, episode_count, aired_episode_count)
            }
        };

        self.store.save_season(&record).await?;
        Ok(record)
    }

    pub async fn begin_attempt(
        &self,
        show: ShowId,
        season: u32,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, |r| {
            r.begin_attempt();
            Ok(())
        })
        .await
    }

    pub async fn mark_discrepant(
        &self,
        show: ShowId,
        season: u32,
        reason: String,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, move |r| {
            r.mark_discrepant(reason);
            Ok(())
        })
        .await
    }

    pub async fn mark_partially_aired(
        &self,
        show: ShowId,
        season: u32,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, |r| {
            r.mark_partially_aired();
            Ok(())
        })
        .await
    }

    pub async fn complete_with_pack(
        &self,
        show: ShowId,
        season: u32,
        method: CompletionMethod,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, move |r| r.complete_with_pack(method))
            .await
    }

    pub async fn confirm_episode(
        &self,
        show: ShowId,
        season: u32,
        tag: EpisodeTag,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, move |r| r.confirm_episode(tag))
            .await
    }

    pub async fn fail_episode(
        &self,
        show: ShowId,
        season: u32,
        tag: EpisodeTag,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, move |r| r.fail_episode(tag)).await
    }

    pub async fn clear_discrepancy(
        &self,
        show: ShowId,
        season: u32,
    ) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, |r| {
            r.clear_discrepancy();
            Ok(())
        })
        .await
    }

    pub async fn reset(&self, show: ShowId, season: u32) -> Result<SeasonRecord, TrackerError> {
        self.update(show, season, |r| {
            r.reset();
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::models::SeasonStatus;

    async fn tracker() -> SeasonTracker {
        let store = Store::in_memory().await.unwrap();
        SeasonTracker::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_sync_creates_record_lazily() {
        let tracker = tracker().await;
        let show = ShowId::new(7);
        assert!(tracker.load(show, 1).await.unwrap().is_none());

        let record = tracker.sync_metadata(show, 1, Some(4), Some(4)).await.unwrap();
        assert_eq!(record.unprocessed_episodes.len(), 4);

        let stored = tracker.load(show, 1).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_update_without_record_is_missing() {
        let tracker = tracker().await;
        let err = tracker.begin_attempt(ShowId::new(1), 3).await.unwrap_err();
        assert!(matches!(err, TrackerError::Missing { season: 3, .. }));
    }

    #[tokio::test]
    async fn test_rejected_transition_is_not_persisted() {
        let tracker = tracker().await;
        let show = ShowId::new(2);
        tracker.sync_metadata(show, 1, Some(10), Some(2)).await.unwrap();

        let err = tracker
            .confirm_episode(show, 1, EpisodeTag::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Season(SeasonError::NotAired { .. })));

        let stored = tracker.load(show, 1).await.unwrap().unwrap();
        assert!(stored.confirmed_episodes.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_are_not_lost() {
        let tracker = tracker().await;
        let show = ShowId::new(3);
        tracker.sync_metadata(show, 1, Some(12), Some(12)).await.unwrap();

        let mut handles = Vec::new();
        for n in 1..=12 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.confirm_episode(show, 1, EpisodeTag::new(n)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = tracker.load(show, 1).await.unwrap().unwrap();
        assert_eq!(stored.confirmed_episodes.len(), 12);
        assert_eq!(stored.status, SeasonStatus::Completed);
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_reset_and_clear_discrepancy() {
        let tracker = tracker().await;
        let show = ShowId::new(4);
        tracker.sync_metadata(show, 2, Some(6), Some(6)).await.unwrap();

        let r = tracker
            .mark_discrepant(show, 2, "complete pack has 5/6 files".into())
            .await
            .unwrap();
        assert!(!r.pack_strategies_allowed());
        let r = tracker.clear_discrepancy(show, 2).await.unwrap();
        assert!(r.pack_strategies_allowed());

        tracker
            .complete_with_pack(show, 2, CompletionMethod::CompletePack)
            .await
            .unwrap();
        let r = tracker.reset(show, 2).await.unwrap();
        assert_eq!(r.status, SeasonStatus::Pending);
        assert_eq!(r.unprocessed_episodes.len(), 6);
    }
}

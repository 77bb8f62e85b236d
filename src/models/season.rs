//! Per-season confirmation record and its transitions.
//!
//! Every mutation goes through a method on [`SeasonRecord`] and ends with
//! [`SeasonRecord::recompute`], which is the single place the aggregate
//! `status` is derived from the episode sets.

use crate::domain::{EpisodeTag, ShowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    NotAired,
    Pending,
    InProgress,
    Discrepant,
    Completed,
    Failed,
}

impl SeasonStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAired => "not_aired",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Discrepant => "discrepant",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonStatus {
    type Err = SeasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_aired" => Ok(Self::NotAired),
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "discrepant" => Ok(Self::Discrepant),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SeasonError::UnknownStatus(other.to_string())),
        }
    }
}

/// How a completed season was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMethod {
    CompletePack,
    WithExtrasPack,
    Individual,
}

impl CompletionMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CompletePack => "complete_pack",
            Self::WithExtrasPack => "with_extras_pack",
            Self::Individual => "individual",
        }
    }
}

impl fmt::Display for CompletionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionMethod {
    type Err = SeasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete_pack" => Ok(Self::CompletePack),
            "with_extras_pack" => Ok(Self::WithExtrasPack),
            "individual" => Ok(Self::Individual),
            other => Err(SeasonError::UnknownCompletionMethod(other.to_string())),
        }
    }
}

const PARTIAL_AIRING_REASON: &str = "partially aired";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeasonError {
    #[error("Episode {episode} has not aired in season {season}")]
    NotAired { season: u32, episode: EpisodeTag },

    #[error("Season {0} has no aired episodes")]
    NothingAired(u32),

    #[error("Unknown season status: {0}")]
    UnknownStatus(String),

    #[error("Unknown completion method: {0}")]
    UnknownCompletionMethod(String),
}

/// Confirmation state of one season of one show.
///
/// `confirmed_episodes`, `failed_episodes` and `unprocessed_episodes` are
/// pairwise disjoint and together cover exactly the aired episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub show_id: ShowId,
    pub season_number: u32,
    pub episode_count: Option<u32>,
    pub aired_episode_count: Option<u32>,
    pub confirmed_episodes: BTreeSet<EpisodeTag>,
    pub failed_episodes: BTreeSet<EpisodeTag>,
    pub unprocessed_episodes: BTreeSet<EpisodeTag>,
    pub is_complete: bool,
    pub completion_method: Option<CompletionMethod>,
    pub is_discrepant: bool,
    pub discrepancy_reason: Option<String>,
    pub status: SeasonStatus,
    pub updated_at: DateTime<Utc>,
}

impl SeasonRecord {
    #[must_use]
    pub fn new(
        show_id: ShowId,
        season_number: u32,
        episode_count: Option<u32>,
        aired_episode_count: Option<u32>,
    ) -> Self {
        let mut record = Self {
            show_id,
            season_number,
            episode_count: None,
            aired_episode_count: None,
            confirmed_episodes: BTreeSet::new(),
            failed_episodes: BTreeSet::new(),
            unprocessed_episodes: BTreeSet::new(),
            is_complete: false,
            completion_method: None,
            is_discrepant: false,
            discrepancy_reason: None,
            status: SeasonStatus::Pending,
            updated_at: Utc::now(),
        };
        record.sync_metadata(episode_count, aired_episode_count);
        record
    }

    /// Number of aired episodes, falling back to the total when the aired
    /// count is unknown. `None` means nothing is known.
    #[must_use]
    pub fn aired_count(&self) -> Option<u32> {
        self.aired_episode_count.or(self.episode_count)
    }

    /// File count a full-season pack must cover. Prefers the authoritative
    /// total and falls back to the aired count.
    #[must_use]
    pub fn expected_episode_count(&self) -> Option<u32> {
        self.episode_count.or(self.aired_episode_count)
    }

    #[must_use]
    pub fn aired_episodes(&self) -> BTreeSet<EpisodeTag> {
        EpisodeTag::range(self.aired_count().unwrap_or(0)).collect()
    }

    /// The season is still airing: some, but not all, episodes are out.
    #[must_use]
    pub fn is_partially_aired(&self) -> bool {
        match (self.aired_episode_count, self.episode_count) {
            (Some(aired), Some(total)) => aired > 0 && aired < total,
            _ => false,
        }
    }

    /// Packs cannot be trusted for discrepant or still-airing seasons.
    #[must_use]
    pub fn pack_strategies_allowed(&self) -> bool {
        !self.is_discrepant && !self.is_partially_aired()
    }

    #[must_use]
    pub fn has_aired(&self) -> bool {
        self.aired_count().is_some_and(|n| n > 0)
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, SeasonStatus::Completed)
    }

    /// Partition invariant plus the completion invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let aired = self.aired_episodes();
        let c = &self.confirmed_episodes;
        let f = &self.failed_episodes;
        let u = &self.unprocessed_episodes;

        let disjoint = c.is_disjoint(f) && c.is_disjoint(u) && f.is_disjoint(u);
        let union: BTreeSet<EpisodeTag> = c.union(f).copied().chain(u.iter().copied()).collect();
        let complete_ok = !self.is_complete || (u.is_empty() && aired.is_subset(c));
        let status_ok = self.status != SeasonStatus::Completed || u.is_empty();

        disjoint && union == aired && complete_ok && status_ok
    }

    /// Applies new external counts and re-partitions the episode sets so the
    /// invariant holds for the new aired set.
    ///
    /// A missing count keeps the stored one. Counts never shrink below the
    /// highest confirmed episode, so a stale catalog cannot undo confirmed
    /// work. Newly aired episodes become unprocessed; failed or unprocessed
    /// episodes past a smaller count are dropped.
    pub fn sync_metadata(&mut self, episode_count: Option<u32>, aired_episode_count: Option<u32>) {
        if episode_count.is_some() {
            self.episode_count = episode_count;
        }
        if aired_episode_count.is_some() {
            self.aired_episode_count = aired_episode_count;
        }

        let floor = self.confirmed_episodes.last().map_or(0, EpisodeTag::number);
        if floor > 0 {
            if self.aired_count().is_none_or(|n| n < floor) {
                self.aired_episode_count = Some(floor);
            }
            if let Some(total) = self.episode_count
                && total < floor
            {
                self.episode_count = Some(floor);
            }
        }

        let aired = self.aired_episodes();
        self.failed_episodes.retain(|t| aired.contains(t));
        self.unprocessed_episodes.retain(|t| aired.contains(t));

        for tag in &aired {
            if !self.confirmed_episodes.contains(tag) && !self.failed_episodes.contains(tag) {
                self.unprocessed_episodes.insert(*tag);
            }
        }

        if self.status == SeasonStatus::NotAired && !aired.is_empty() {
            self.status = SeasonStatus::Pending;
        }

        // A discrepancy caused only by airing is lifted once the season has finished.
        let airing_reason = self
            .discrepancy_reason
            .as_deref()
            .is_some_and(|r| r.starts_with(PARTIAL_AIRING_REASON));
        if self.is_discrepant && airing_reason && !self.is_partially_aired() {
            self.clear_discrepancy();
            return;
        }
        self.recompute();
    }

    /// Starts a new attempt: failed episodes become unprocessed again and a
    /// `pending`, `failed` or `discrepant` season moves to `in_progress`.
    pub fn begin_attempt(&mut self) {
        if self.is_completed() || !self.has_aired() {
            return;
        }

        let failed = std::mem::take(&mut self.failed_episodes);
        self.unprocessed_episodes.extend(failed);
        self.status = SeasonStatus::InProgress;
        self.recompute();
    }

    /// Flags the season so that only per-episode handling is used until
    /// [`Self::clear_discrepancy`] is called.
    pub fn mark_discrepant(&mut self, reason: impl Into<String>) {
        self.is_discrepant = true;
        self.discrepancy_reason = Some(reason.into());
        if !self.is_completed() {
            self.status = SeasonStatus::Discrepant;
        }
        self.recompute();
    }

    /// Flags a still-airing season as discrepant. Lifted automatically by
    /// [`Self::sync_metadata`] once every episode has aired.
    pub fn mark_partially_aired(&mut self) {
        let aired = self.aired_episode_count.unwrap_or(0);
        let total = self.episode_count.unwrap_or(0);
        self.mark_discrepant(format!(
            "{PARTIAL_AIRING_REASON}: {aired}/{total} episodes available"
        ));
    }

    pub fn clear_discrepancy(&mut self) {
        self.is_discrepant = false;
        self.discrepancy_reason = None;
        if self.status == SeasonStatus::Discrepant {
            self.status = SeasonStatus::Pending;
        }
        self.recompute();
    }

    /// Confirms every aired episode at once after a verified pack.
    pub fn complete_with_pack(&mut self, method: CompletionMethod) -> Result<(), SeasonError> {
        let aired = self.aired_episodes();
        if aired.is_empty() {
            return Err(SeasonError::NothingAired(self.season_number));
        }

        self.confirmed_episodes = aired;
        self.failed_episodes.clear();
        self.unprocessed_episodes.clear();
        self.completion_method = Some(method);
        self.recompute();
        Ok(())
    }

    pub fn confirm_episode(&mut self, tag: EpisodeTag) -> Result<(), SeasonError> {
        self.ensure_aired(tag)?;
        self.unprocessed_episodes.remove(&tag);
        self.failed_episodes.remove(&tag);
        self.confirmed_episodes.insert(tag);
        self.recompute();
        Ok(())
    }

    /// Records an episode with no matching candidate. Already confirmed
    /// episodes stay confirmed.
    pub fn fail_episode(&mut self, tag: EpisodeTag) -> Result<(), SeasonError> {
        self.ensure_aired(tag)?;
        if self.confirmed_episodes.contains(&tag) {
            return Ok(());
        }
        self.unprocessed_episodes.remove(&tag);
        self.failed_episodes.insert(tag);
        self.recompute();
        Ok(())
    }

    /// External reset: every aired episode becomes unprocessed again.
    pub fn reset(&mut self) {
        self.confirmed_episodes.clear();
        self.failed_episodes.clear();
        self.unprocessed_episodes = self.aired_episodes();
        self.is_complete = false;
        self.completion_method = None;
        self.is_discrepant = false;
        self.discrepancy_reason = None;
        self.status = SeasonStatus::Pending;
        self.recompute();
    }

    fn ensure_aired(&self, tag: EpisodeTag) -> Result<(), SeasonError> {
        if tag.number() == 0 || self.aired_count().is_none_or(|n| tag.number() > n) {
            return Err(SeasonError::NotAired {
                season: self.season_number,
                episode: tag,
            });
        }
        Ok(())
    }

    /// Derives `status`, `is_complete` and `completion_method` from the
    /// episode sets.
    pub fn recompute(&mut self) {
        self.updated_at = Utc::now();

        if self.aired_count() == Some(0) {
            self.is_complete = false;
            self.completion_method = None;
            self.status = SeasonStatus::NotAired;
            return;
        }

        let aired = self.aired_episodes();
        if !aired.is_empty() && aired.is_subset(&self.confirmed_episodes) {
            self.is_complete = true;
            if self.completion_method.is_none() {
                self.completion_method = Some(CompletionMethod::Individual);
            }
            self.status = SeasonStatus::Completed;
            return;
        }

        self.is_complete = false;
        self.completion_method = None;

        self.status = if !aired.is_empty() && self.unprocessed_episodes.is_empty() {
            if self.is_discrepant {
                SeasonStatus::Discrepant
            } else {
                SeasonStatus::Failed
            }
        } else if !self.confirmed_episodes.is_empty() || !self.failed_episodes.is_empty() {
            SeasonStatus::InProgress
        } else {
            match self.status {
                SeasonStatus::InProgress | SeasonStatus::Discrepant => self.status,
                _ if self.is_discrepant => SeasonStatus::Discrepant,
                _ => SeasonStatus::Pending,
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(total: Option<u32>, aired: Option<u32>) -> SeasonRecord {
        SeasonRecord::new(ShowId::new(1), 1, total, aired)
    }

    fn tags(nums: &[u32]) -> BTreeSet<EpisodeTag> {
        nums.iter().copied().map(EpisodeTag::new).collect()
    }

    #[test]
    fn test_new_season_partitions_aired_episodes() {
        let r = record(Some(10), Some(3));
        assert_eq!(r.unprocessed_episodes, tags(&[1, 2, 3]));
        assert_eq!(r.status, SeasonStatus::Pending);
        assert!(r.is_partially_aired());
        assert!(!r.pack_strategies_allowed());
        assert!(r.is_consistent());
    }

    #[test]
    fn test_not_aired_then_pending() {
        let mut r = record(Some(8), Some(0));
        assert_eq!(r.status, SeasonStatus::NotAired);
        r.sync_metadata(Some(8), Some(2));
        assert_eq!(r.status, SeasonStatus::Pending);
        assert_eq!(r.unprocessed_episodes.len(), 2);
    }

    #[test]
    fn test_unknown_counts_keep_sets_empty() {
        let r = record(None, None);
        assert_eq!(r.aired_count(), None);
        assert!(r.unprocessed_episodes.is_empty());
        assert_eq!(r.status, SeasonStatus::Pending);
        assert!(r.is_consistent());
    }

    #[test]
    fn test_aired_falls_back_to_total() {
        let r = record(Some(6), None);
        assert_eq!(r.aired_count(), Some(6));
        assert_eq!(r.expected_episode_count(), Some(6));
    }

    #[test]
    fn test_complete_with_pack() {
        let mut r = record(Some(9), Some(9));
        r.begin_attempt();
        r.fail_episode(EpisodeTag::new(2)).unwrap();
        r.complete_with_pack(CompletionMethod::CompletePack).unwrap();

        assert_eq!(r.status, SeasonStatus::Completed);
        assert!(r.is_complete);
        assert_eq!(r.completion_method, Some(CompletionMethod::CompletePack));
        assert!(r.unprocessed_episodes.is_empty());
        assert!(r.failed_episodes.is_empty());
        assert_eq!(r.confirmed_episodes.len(), 9);
        assert!(r.is_consistent());
    }

    #[test]
    fn test_individual_progress() {
        let mut r = record(Some(3), Some(3));
        r.begin_attempt();
        assert_eq!(r.status, SeasonStatus::InProgress);

        r.confirm_episode(EpisodeTag::new(1)).unwrap();
        assert_eq!(r.status, SeasonStatus::InProgress);
        r.fail_episode(EpisodeTag::new(2)).unwrap();
        r.confirm_episode(EpisodeTag::new(3)).unwrap();
        assert_eq!(r.status, SeasonStatus::Failed);
        assert!(r.is_consistent());

        r.begin_attempt();
        assert_eq!(r.unprocessed_episodes, tags(&[2]));
        r.confirm_episode(EpisodeTag::new(2)).unwrap();
        assert_eq!(r.status, SeasonStatus::Completed);
        assert_eq!(r.completion_method, Some(CompletionMethod::Individual));
    }

    #[test]
    fn test_discrepant_is_not_failure() {
        let mut r = record(Some(10), Some(10));
        r.begin_attempt();
        r.mark_discrepant("pack has 8 of 10 files");
        assert_eq!(r.status, SeasonStatus::Discrepant);
        assert!(!r.pack_strategies_allowed());

        for n in 1..=10 {
            r.fail_episode(EpisodeTag::new(n)).unwrap();
        }
        assert_eq!(r.status, SeasonStatus::Discrepant);

        r.clear_discrepancy();
        assert_eq!(r.status, SeasonStatus::Failed);
        assert!(r.pack_strategies_allowed());
    }

    #[test]
    fn test_airing_discrepancy_lifted_when_season_finishes() {
        let mut r = record(Some(10), Some(3));
        r.mark_partially_aired();
        assert!(r.is_discrepant);
        assert_eq!(
            r.discrepancy_reason.as_deref(),
            Some("partially aired: 3/10 episodes available")
        );

        r.sync_metadata(Some(10), Some(7));
        assert!(r.is_discrepant);

        r.sync_metadata(Some(10), Some(10));
        assert!(!r.is_discrepant);
        assert!(r.pack_strategies_allowed());
        assert!(r.is_consistent());
    }

    #[test]
    fn test_pack_discrepancy_survives_metadata_sync() {
        let mut r = record(Some(10), Some(10));
        r.mark_discrepant("complete pack has 8/10 files");
        r.sync_metadata(Some(10), Some(10));
        assert!(r.is_discrepant);
    }

    #[test]
    fn test_missing_counts_keep_stored_values() {
        let mut r = record(Some(4), Some(4));
        for n in 1..=4 {
            r.confirm_episode(EpisodeTag::new(n)).unwrap();
        }
        assert!(r.is_completed());

        r.sync_metadata(None, None);
        assert_eq!(r.episode_count, Some(4));
        assert_eq!(r.aired_episode_count, Some(4));
        assert_eq!(r.confirmed_episodes, tags(&[1, 2, 3, 4]));
        assert_eq!(r.status, SeasonStatus::Completed);
        assert!(r.is_consistent());

        r.sync_metadata(None, Some(5));
        assert_eq!(r.episode_count, Some(4));
        assert_eq!(r.aired_episode_count, Some(5));
        assert_eq!(r.unprocessed_episodes, tags(&[5]));
    }

    #[test]
    fn test_stale_counts_never_drop_confirmed_episodes() {
        let mut r = record(Some(10), Some(6));
        r.confirm_episode(EpisodeTag::new(2)).unwrap();
        r.confirm_episode(EpisodeTag::new(5)).unwrap();
        r.fail_episode(EpisodeTag::new(6)).unwrap();

        r.sync_metadata(Some(3), Some(2));
        assert_eq!(r.confirmed_episodes, tags(&[2, 5]));
        assert_eq!(r.aired_episode_count, Some(5));
        assert_eq!(r.episode_count, Some(5));
        assert!(r.failed_episodes.is_empty());
        assert_eq!(r.unprocessed_episodes, tags(&[1, 3, 4]));
        assert!(r.is_consistent());
    }

    #[test]
    fn test_fail_does_not_undo_confirmation() {
        let mut r = record(Some(2), Some(2));
        r.confirm_episode(EpisodeTag::new(1)).unwrap();
        r.fail_episode(EpisodeTag::new(1)).unwrap();
        assert!(r.confirmed_episodes.contains(&EpisodeTag::new(1)));
        assert!(r.is_consistent());
    }

    #[test]
    fn test_unaired_episode_rejected() {
        let mut r = record(Some(10), Some(3));
        let err = r.confirm_episode(EpisodeTag::new(4)).unwrap_err();
        assert!(matches!(err, SeasonError::NotAired { season: 1, .. }));
    }

    #[test]
    fn test_newly_aired_episode_reopens_completed_season() {
        let mut r = record(Some(10), Some(2));
        r.confirm_episode(EpisodeTag::new(1)).unwrap();
        r.confirm_episode(EpisodeTag::new(2)).unwrap();
        assert!(r.is_completed());

        r.sync_metadata(Some(10), Some(3));
        assert_eq!(r.status, SeasonStatus::InProgress);
        assert_eq!(r.unprocessed_episodes, tags(&[3]));
        assert!(!r.is_complete);
        assert!(r.is_consistent());
    }

    #[test]
    fn test_reset() {
        let mut r = record(Some(4), Some(4));
        r.complete_with_pack(CompletionMethod::WithExtrasPack).unwrap();
        r.reset();
        assert_eq!(r.status, SeasonStatus::Pending);
        assert_eq!(r.unprocessed_episodes.len(), 4);
        assert_eq!(r.completion_method, None);
        assert!(r.is_consistent());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in [
            SeasonStatus::NotAired,
            SeasonStatus::Pending,
            SeasonStatus::InProgress,
            SeasonStatus::Discrepant,
            SeasonStatus::Completed,
            SeasonStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<SeasonStatus>().unwrap(), s);
        }
    }
}

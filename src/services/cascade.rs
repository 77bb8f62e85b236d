//! Per-season strategy cascade: complete pack, pack with extras, then
//! individual episodes.

use super::reconcile::CancellationSignal;
use super::tracker::{SeasonTracker, TrackerError};
use crate::clients::{ProviderError, SearchFilter, SearchProvider, SearchQuery};
use crate::config::ReconcileConfig;
use crate::constants::limits;
use crate::domain::{EpisodeTag, ShowId};
use crate::matching::{Classifier, Expectation, ProcessedSet};
use crate::models::{BadgeKind, CacheState, Candidate, CompletionMethod, PackBadge, SeasonRecord};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CompletePack,
    WithExtrasPack,
    Individual,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompletePack => "complete_pack",
            Self::WithExtrasPack => "with_extras_pack",
            Self::Individual => "individual",
        }
    }

    const fn completion_method(self) -> CompletionMethod {
        match self {
            Self::CompletePack => CompletionMethod::CompletePack,
            Self::WithExtrasPack => CompletionMethod::WithExtrasPack,
            Self::Individual => CompletionMethod::Individual,
        }
    }

    const fn pack_filter(self) -> Option<(SearchFilter, BadgeKind)> {
        match self {
            Self::CompletePack => Some((SearchFilter::CompletePacks, BadgeKind::Complete)),
            Self::WithExtrasPack => Some((SearchFilter::WithExtras, BadgeKind::WithExtras)),
            Self::Individual => None,
        }
    }

    /// `None` when the badge carries no counts to check.
    ///
    /// A complete pack must hold exactly the expected episodes; a pack with
    /// extras may hold more files than that.
    fn verifies(self, badge: PackBadge, expected: u32) -> Option<bool> {
        let (have, total) = (badge.have?, badge.total?);
        Some(match self {
            Self::CompletePack => have == total && total == expected,
            Self::WithExtrasPack => have >= expected,
            Self::Individual => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeSettings {
    pub max_candidates: usize,
    pub treat_pending_as_confirmed: bool,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            max_candidates: limits::MAX_CANDIDATES_PER_SEARCH,
            treat_pending_as_confirmed: false,
        }
    }
}

impl From<&ReconcileConfig> for CascadeSettings {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            max_candidates: config.max_candidates_per_search.max(1),
            treat_pending_as_confirmed: config.treat_pending_as_confirmed,
        }
    }
}

/// The season a cascade run works on.
#[derive(Debug, Clone, Copy)]
pub struct SeasonTarget<'a> {
    pub show: ShowId,
    pub season: u32,
    pub title: &'a str,
}

/// State of a season after one cascade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonReport {
    pub record: SeasonRecord,
    pub cancelled: bool,
}

impl SeasonReport {
    const fn finished(record: SeasonRecord) -> Self {
        Self {
            record,
            cancelled: false,
        }
    }

    const fn cancelled(record: SeasonRecord) -> Self {
        Self {
            record,
            cancelled: true,
        }
    }
}

enum PackAttempt {
    Confirmed(SeasonRecord),
    Mismatch(String),
    NoMatch,
    Cancelled,
}

impl PackAttempt {
    const fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "confirmed",
            Self::Mismatch(_) => "discrepant",
            Self::NoMatch => "no_match",
            Self::Cancelled => "cancelled",
        }
    }
}

pub struct CascadeController {
    tracker: SeasonTracker,
    classifier: Classifier,
    settings: CascadeSettings,
}

impl CascadeController {
    pub const fn new(
        tracker: SeasonTracker,
        classifier: Classifier,
        settings: CascadeSettings,
    ) -> Self {
        Self {
            tracker,
            classifier,
            settings,
        }
    }

    #[must_use]
    pub const fn tracker(&self) -> &SeasonTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub const fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    /// Runs the cascade for one season whose record already exists.
    ///
    /// Only store faults are returned as errors. Provider faults end the
    /// current strategy or episode and the cascade moves on.
    pub async fn run_season(
        &self,
        target: &SeasonTarget<'_>,
        provider: &mut dyn SearchProvider,
        processed: &mut ProcessedSet,
        cancel: &dyn CancellationSignal,
    ) -> Result<SeasonReport, TrackerError> {
        let mut record = self.tracker.begin_attempt(target.show, target.season).await?;
        if record.is_completed() || !record.has_aired() {
            return Ok(SeasonReport::finished(record));
        }

        if record.is_partially_aired() && !record.is_discrepant {
            record = self
                .tracker
                .mark_partially_aired(target.show, target.season)
                .await?;
        }

        if record.pack_strategies_allowed() {
            for strategy in [Strategy::CompletePack, Strategy::WithExtrasPack] {
                if cancel.is_cancelled().await {
                    return Ok(SeasonReport::cancelled(record));
                }

                let attempt = self
                    .try_pack(strategy, target, &record, provider, processed, cancel)
                    .await?;
                metrics::counter!(
                    "season_strategy_total",
                    "strategy" => strategy.as_str(),
                    "result" => attempt.label()
                )
                .increment(1);

                match attempt {
                    PackAttempt::Confirmed(done) => {
                        info!(
                            show_id = %target.show,
                            season = target.season,
                            strategy = strategy.as_str(),
                            episodes = done.confirmed_episodes.len(),
                            "Season confirmed from pack"
                        );
                        return Ok(SeasonReport::finished(done));
                    }
                    PackAttempt::Mismatch(reason) => {
                        info!(
                            show_id = %target.show,
                            season = target.season,
                            reason = %reason,
                            "Pack count mismatch, switching to individual episodes"
                        );
                        record = self
                            .tracker
                            .mark_discrepant(target.show, target.season, reason)
                            .await?;
                        break;
                    }
                    PackAttempt::NoMatch => {}
                    PackAttempt::Cancelled => return Ok(SeasonReport::cancelled(record)),
                }
            }
        } else {
            debug!(
                show_id = %target.show,
                season = target.season,
                reason = record.discrepancy_reason.as_deref().unwrap_or_default(),
                "Skipping pack strategies"
            );
        }

        self.run_individual(target, record, provider, processed, cancel)
            .await
    }

    async fn try_pack(
        &self,
        strategy: Strategy,
        target: &SeasonTarget<'_>,
        record: &SeasonRecord,
        provider: &mut dyn SearchProvider,
        processed: &mut ProcessedSet,
        cancel: &dyn CancellationSignal,
    ) -> Result<PackAttempt, TrackerError> {
        let (Some((filter, badge_kind)), Some(expected)) =
            (strategy.pack_filter(), record.expected_episode_count())
        else {
            return Ok(PackAttempt::NoMatch);
        };

        let query = SearchQuery::new(target.title, filter);
        let candidates = match provider.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                Self::log_provider_error(&query, &e);
                return Ok(PackAttempt::NoMatch);
            }
        };

        let expectation = Expectation::season(target.title, target.season);
        let mut mismatch = None;

        for candidate in candidates.iter().take(self.settings.max_candidates) {
            if cancel.is_cancelled().await {
                return Ok(PackAttempt::Cancelled);
            }

            let Some(badge) = candidate.badge.filter(|b| b.kind == badge_kind) else {
                continue;
            };
            if candidate.is_listed_uncached() {
                debug!(candidate = %candidate.title, "Skipping uncached pack");
                continue;
            }

            let result = self.classifier.classify(candidate, &expectation, processed);
            if !result.accepted {
                continue;
            }

            match strategy.verifies(badge, expected) {
                Some(true) => {}
                Some(false) => {
                    let have = badge.have.unwrap_or_default();
                    let total = badge.total.unwrap_or_default();
                    debug!(
                        candidate = %candidate.title,
                        have,
                        total,
                        expected,
                        "Pack file count does not match season"
                    );
                    mismatch.get_or_insert_with(|| {
                        format!(
                            "{} has {have}/{total} files, expected {expected}",
                            strategy.as_str()
                        )
                    });
                    continue;
                }
                None => {
                    debug!(candidate = %candidate.title, "Pack badge has no file counts");
                    continue;
                }
            }

            if self.activate(candidate, provider, processed).await {
                let done = self
                    .tracker
                    .complete_with_pack(target.show, target.season, strategy.completion_method())
                    .await?;
                return Ok(PackAttempt::Confirmed(done));
            }
        }

        Ok(mismatch.map_or(PackAttempt::NoMatch, PackAttempt::Mismatch))
    }

    async fn run_individual(
        &self,
        target: &SeasonTarget<'_>,
        mut record: SeasonRecord,
        provider: &mut dyn SearchProvider,
        processed: &mut ProcessedSet,
        cancel: &dyn CancellationSignal,
    ) -> Result<SeasonReport, TrackerError> {
        let pending: Vec<EpisodeTag> = record.unprocessed_episodes.iter().copied().collect();

        for tag in pending {
            if cancel.is_cancelled().await {
                return Ok(SeasonReport::cancelled(record));
            }

            let query = SearchQuery::new(
                target.title,
                SearchFilter::Episode(tag.search_token(target.season)),
            );
            let candidates = match provider.search(&query).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    // Left unprocessed for the next pass.
                    Self::log_provider_error(&query, &e);
                    continue;
                }
            };

            let expectation = Expectation::episode(target.title, target.season, tag);
            let mut found = false;
            for candidate in candidates.iter().take(self.settings.max_candidates) {
                if cancel.is_cancelled().await {
                    return Ok(SeasonReport::cancelled(record));
                }
                if candidate.is_listed_uncached() {
                    continue;
                }
                let result = self.classifier.classify(candidate, &expectation, processed);
                if result.accepted && self.activate(candidate, provider, processed).await {
                    found = true;
                    break;
                }
            }

            record = if found {
                metrics::counter!("episode_confirmations_total").increment(1);
                self.tracker
                    .confirm_episode(target.show, target.season, tag)
                    .await?
            } else {
                debug!(
                    show_id = %target.show,
                    season = target.season,
                    episode = %tag,
                    "No candidate for episode"
                );
                self.tracker
                    .fail_episode(target.show, target.season, tag)
                    .await?
            };
        }

        metrics::counter!(
            "season_strategy_total",
            "strategy" => Strategy::Individual.as_str(),
            "result" => record.status.as_str()
        )
        .increment(1);

        info!(
            show_id = %target.show,
            season = target.season,
            status = %record.status,
            confirmed = record.confirmed_episodes.len(),
            failed = record.failed_episodes.len(),
            unprocessed = record.unprocessed_episodes.len(),
            "Individual episode pass finished"
        );
        Ok(SeasonReport::finished(record))
    }

    /// Activates an accepted candidate. Returns whether it ended up cached.
    async fn activate(
        &self,
        candidate: &Candidate,
        provider: &mut dyn SearchProvider,
        processed: &mut ProcessedSet,
    ) -> bool {
        processed.insert(candidate.key());

        let state = match provider.activate(candidate).await {
            Ok(state) => state,
            Err(e) => {
                warn!(candidate = %candidate.title, error = %e, "Activation failed");
                metrics::counter!("candidate_activations_total", "result" => "error")
                    .increment(1);
                return false;
            }
        };
        metrics::counter!("candidate_activations_total", "result" => state.to_string())
            .increment(1);

        match state {
            CacheState::Cached => true,
            CacheState::Pending if self.settings.treat_pending_as_confirmed => true,
            CacheState::NotCached => {
                if let Err(e) = provider.undo(candidate).await {
                    warn!(candidate = %candidate.title, error = %e, "Failed to undo activation");
                }
                false
            }
            CacheState::Pending | CacheState::Unknown => {
                debug!(candidate = %candidate.title, state = %state, "Candidate not cached yet");
                false
            }
        }
    }

    fn log_provider_error(query: &SearchQuery, error: &ProviderError) {
        warn!(query = %query, error = %error, "Search failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{FixtureCandidate, FixtureProvider};
    use crate::db::Store;
    use crate::models::SeasonStatus;
    use crate::services::reconcile::CancellationFlag;
    use std::sync::Arc;

    const SHOW: ShowId = ShowId::new(42);
    const TITLE: &str = "The Great Show";

    async fn controller() -> CascadeController {
        let store = Store::in_memory().await.unwrap();
        let tracker = SeasonTracker::new(Arc::new(store));
        CascadeController::new(tracker, Classifier::default(), CascadeSettings::default())
    }

    fn target(season: u32) -> SeasonTarget<'static> {
        SeasonTarget {
            show: SHOW,
            season,
            title: TITLE,
        }
    }

    fn episode_query(season: u32, episode: u32) -> SearchQuery {
        SearchQuery::new(
            TITLE,
            SearchFilter::Episode(EpisodeTag::new(episode).search_token(season)),
        )
    }

    #[test]
    fn test_pack_verification_rules() {
        let badge = |text: &str| PackBadge::parse(text).unwrap();
        assert_eq!(Strategy::CompletePack.verifies(badge("Complete (9/9)"), 9), Some(true));
        assert_eq!(Strategy::CompletePack.verifies(badge("Complete (8/10)"), 10), Some(false));
        assert_eq!(Strategy::CompletePack.verifies(badge("Complete (10/10)"), 9), Some(false));
        assert_eq!(
            Strategy::WithExtrasPack.verifies(badge("With extras (34/9)"), 9),
            Some(true)
        );
        assert_eq!(
            Strategy::WithExtrasPack.verifies(badge("With extras (7/9)"), 9),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_complete_pack_short_circuits() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 1, Some(9), Some(9))
            .await
            .unwrap();

        let mut provider = FixtureProvider::new().with_results(
            &SearchQuery::new(TITLE, SearchFilter::CompletePacks),
            vec![FixtureCandidate::new("The.Great.Show.S01.1080p").badge("Complete (9/9)")],
        );
        let mut processed = ProcessedSet::new();
        let report = controller
            .run_season(&target(1), &mut provider, &mut processed, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.record.status, SeasonStatus::Completed);
        assert_eq!(
            report.record.completion_method,
            Some(CompletionMethod::CompletePack)
        );
        assert_eq!(provider.queries().len(), 1);
        assert!(processed.contains("The.Great.Show.S01.1080p"));
    }

    #[tokio::test]
    async fn test_with_extras_accepts_more_files() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 2, Some(9), Some(9))
            .await
            .unwrap();

        let mut provider = FixtureProvider::new().with_results(
            &SearchQuery::new(TITLE, SearchFilter::WithExtras),
            vec![FixtureCandidate::new("The Great Show Season 2 Extras").badge("With extras (34/9)")],
        );
        let report = controller
            .run_season(
                &target(2),
                &mut provider,
                &mut ProcessedSet::new(),
                &CancellationFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            report.record.completion_method,
            Some(CompletionMethod::WithExtrasPack)
        );
    }

    #[tokio::test]
    async fn test_uncached_pack_is_undone_and_skipped() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 1, Some(2), Some(2))
            .await
            .unwrap();

        let mut provider = FixtureProvider::new()
            .with_results(
                &SearchQuery::new(TITLE, SearchFilter::CompletePacks),
                vec![
                    FixtureCandidate::new("The.Great.Show.S01.720p")
                        .badge("Complete (2/2)")
                        .activation(CacheState::NotCached),
                ],
            )
            .with_results(
                &episode_query(1, 1),
                vec![FixtureCandidate::new("The.Great.Show.S01E01.1080p")],
            );

        let report = controller
            .run_season(
                &target(1),
                &mut provider,
                &mut ProcessedSet::new(),
                &CancellationFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(provider.undone(), ["The.Great.Show.S01.720p"]);
        let r = &report.record;
        assert_eq!(r.confirmed_episodes.len(), 1);
        assert_eq!(r.failed_episodes.len(), 1);
        assert_eq!(r.status, SeasonStatus::Failed);
        assert!(r.is_consistent());
    }

    #[tokio::test]
    async fn test_pack_listed_as_uncached_is_never_activated() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 1, Some(2), Some(2))
            .await
            .unwrap();

        let mut provider = FixtureProvider::new()
            .with_results(
                &SearchQuery::new(TITLE, SearchFilter::CompletePacks),
                vec![
                    FixtureCandidate::new("The.Great.Show.S01.1080p")
                        .badge("Complete (2/2)")
                        .cache("0%"),
                ],
            )
            .with_results(
                &episode_query(1, 1),
                vec![
                    FixtureCandidate::new("The.Great.Show.S01E01.2160p").cache("0%"),
                    FixtureCandidate::new("The.Great.Show.S01E01.1080p").cache("100%"),
                ],
            )
            .with_results(
                &episode_query(1, 2),
                vec![FixtureCandidate::new("The.Great.Show.S01E02.1080p")],
            );

        let report = controller
            .run_season(
                &target(1),
                &mut provider,
                &mut ProcessedSet::new(),
                &CancellationFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            provider.activated(),
            ["The.Great.Show.S01E01.1080p", "The.Great.Show.S01E02.1080p"]
        );
        assert!(provider.undone().is_empty());
        assert_eq!(report.record.status, SeasonStatus::Completed);
        assert_eq!(
            report.record.completion_method,
            Some(CompletionMethod::Individual)
        );
        assert!(!report.record.is_discrepant);
    }

    #[tokio::test]
    async fn test_cancelled_before_any_search() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 1, Some(3), Some(3))
            .await
            .unwrap();

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let mut provider = FixtureProvider::new();
        let report = controller
            .run_season(&target(1), &mut provider, &mut ProcessedSet::new(), &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(provider.queries().is_empty());
        assert_eq!(report.record.unprocessed_episodes.len(), 3);
    }

    #[tokio::test]
    async fn test_search_error_leaves_episode_unprocessed() {
        let controller = controller().await;
        controller
            .tracker()
            .sync_metadata(SHOW, 3, Some(1), Some(1))
            .await
            .unwrap();

        let query = episode_query(3, 1);
        let mut provider = FixtureProvider::new()
            .with_results(&query, vec![FixtureCandidate::new("The.Great.Show.S03E01")])
            .with_failures(&query, 1);

        let report = controller
            .run_season(
                &target(3),
                &mut provider,
                &mut ProcessedSet::new(),
                &CancellationFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.record.unprocessed_episodes.len(), 1);
        assert!(report.record.failed_episodes.is_empty());
    }
}

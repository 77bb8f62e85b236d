//! Top-level entry point for one media request.

use super::cascade::{CascadeController, SeasonReport, SeasonTarget};
use super::store::{StateStore, StoreError};
use super::tracker::SeasonTracker;
use crate::clients::{SearchFilter, SearchProvider, SearchQuery};
use crate::config::Config;
use crate::domain::{MediaRequest, RequestId};
use crate::matching::{Classifier, Expectation, ProcessedSet, Thresholds};
use crate::models::{CacheState, HistoryEntry, RequestStatus, SeasonRecord};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cooperative cancellation, polled between steps.
#[async_trait::async_trait]
pub trait CancellationSignal: Send + Sync {
    async fn is_cancelled(&self) -> bool;
}

/// In-process cancellation switch.
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl CancellationSignal for CancellationFlag {
    async fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller's signal plus the request's persisted status.
struct RequestCancellation<'a> {
    signal: &'a dyn CancellationSignal,
    store: &'a dyn StateStore,
    id: RequestId,
}

#[async_trait::async_trait]
impl CancellationSignal for RequestCancellation<'_> {
    async fn is_cancelled(&self) -> bool {
        if self.signal.is_cancelled().await {
            return true;
        }
        match self.store.request_status(self.id).await {
            Ok(status) => status == Some(RequestStatus::Cancelled),
            Err(e) => {
                warn!(request_id = %self.id, error = %e, "Could not read request status");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    Cancelled,
    Skipped,
    Failed,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Ledger status written at the end of a pass.
    const fn request_status(self) -> RequestStatus {
        match self {
            Self::Confirmed => RequestStatus::Completed,
            Self::Cancelled => RequestStatus::Cancelled,
            Self::Skipped => RequestStatus::Skipped,
            Self::Failed => RequestStatus::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub request_id: RequestId,
    pub outcome: Outcome,
    /// Records of the seasons in scope, for shows.
    pub seasons: Vec<SeasonRecord>,
    /// Cached candidate that satisfied a movie request.
    pub movie_release: Option<String>,
}

impl ReconcileReport {
    const fn new(request_id: RequestId, outcome: Outcome) -> Self {
        Self {
            request_id,
            outcome,
            seasons: Vec::new(),
            movie_release: None,
        }
    }

    /// Some season in scope still has episodes to air or to confirm.
    #[must_use]
    pub fn has_outstanding_seasons(&self) -> bool {
        self.seasons
            .iter()
            .any(|r| !r.is_completed() || r.is_partially_aired())
    }

    #[must_use]
    pub fn completed_seasons(&self) -> Vec<u32> {
        self.seasons
            .iter()
            .filter(|r| r.is_completed())
            .map(|r| r.season_number)
            .collect()
    }
}

pub struct Coordinator {
    store: Arc<dyn StateStore>,
    cascade: CascadeController,
}

impl Coordinator {
    pub fn new(store: Arc<dyn StateStore>, config: &Config) -> Self {
        let tracker = SeasonTracker::new(Arc::clone(&store));
        let classifier = Classifier::new(Thresholds::from(&config.matching));
        let cascade = CascadeController::new(tracker, classifier, (&config.reconcile).into());
        Self { store, cascade }
    }

    #[must_use]
    pub const fn tracker(&self) -> &SeasonTracker {
        self.cascade.tracker()
    }

    /// Runs one reconciliation pass. Repeating a pass is safe: confirmed
    /// work is kept and settled requests are skipped.
    pub async fn reconcile(
        &self,
        request: &MediaRequest,
        provider: &mut dyn SearchProvider,
        signal: &dyn CancellationSignal,
    ) -> Result<ReconcileReport, ReconcileError> {
        let start = Instant::now();
        let cancel = RequestCancellation {
            signal,
            store: self.store.as_ref(),
            id: request.id,
        };

        self.store.register_request(request).await?;

        if let Some(status) = self.store.request_status(request.id).await?
            && status.is_settled()
        {
            info!(request_id = %request.id, status = status.as_str(), "Request already settled");
            metrics::counter!("reconcile_requests_total", "outcome" => "skipped").increment(1);
            return Ok(ReconcileReport::new(request.id, Outcome::Skipped));
        }

        if cancel.is_cancelled().await {
            return self
                .finish(request, ReconcileReport::new(request.id, Outcome::Cancelled), start)
                .await;
        }

        self.store.begin_request_attempt(request.id).await?;
        info!(
            request_id = %request.id,
            title = %request.title,
            kind = request.kind.as_str(),
            "Reconciling request"
        );

        let report = if request.is_show() {
            self.reconcile_show(request, provider, &cancel).await?
        } else {
            self.reconcile_movie(request, provider, &cancel).await?
        };

        self.finish(request, report, start).await
    }

    async fn reconcile_movie(
        &self,
        request: &MediaRequest,
        provider: &mut dyn SearchProvider,
        cancel: &dyn CancellationSignal,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::new(request.id, Outcome::Failed);
        let expectation = Expectation::movie(&request.title, request.year);
        let mut processed = ProcessedSet::new();

        let query = SearchQuery::new(&request.title, SearchFilter::None);
        let candidates = match provider.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(request_id = %request.id, query = %query, error = %e, "Search failed");
                self.store
                    .record_request_error(request.id, &e.to_string())
                    .await?;
                return Ok(report);
            }
        };

        let settings = self.cascade.settings();
        for candidate in candidates.iter().take(settings.max_candidates) {
            if cancel.is_cancelled().await {
                report.outcome = Outcome::Cancelled;
                return Ok(report);
            }

            if candidate.is_listed_uncached() {
                debug!(candidate = %candidate.title, "Skipping uncached result");
                continue;
            }

            let result = self
                .cascade
                .classifier()
                .classify(candidate, &expectation, &processed);
            if !result.accepted {
                continue;
            }

            processed.insert(candidate.key());
            let state = match provider.activate(candidate).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(candidate = %candidate.title, error = %e, "Activation failed");
                    continue;
                }
            };
            metrics::counter!("candidate_activations_total", "result" => state.to_string())
                .increment(1);

            let confirmed = state.is_cached()
                || (state == CacheState::Pending && settings.treat_pending_as_confirmed);
            if confirmed {
                info!(request_id = %request.id, release = %candidate.title, "Movie confirmed");
                report.outcome = Outcome::Confirmed;
                report.movie_release = Some(candidate.title.clone());
                return Ok(report);
            }
            if state == CacheState::NotCached
                && let Err(e) = provider.undo(candidate).await
            {
                warn!(candidate = %candidate.title, error = %e, "Failed to undo activation");
            }
        }

        Ok(report)
    }

    async fn reconcile_show(
        &self,
        request: &MediaRequest,
        provider: &mut dyn SearchProvider,
        cancel: &dyn CancellationSignal,
    ) -> Result<ReconcileReport, ReconcileError> {
        let show = request.show_id();
        let tracker = self.cascade.tracker();
        let mut report = ReconcileReport::new(request.id, Outcome::Failed);

        for meta in &request.season_metadata {
            if let Err(e) = tracker
                .sync_metadata(show, meta.season, meta.episode_count, meta.aired_episode_count)
                .await
            {
                error!(show_id = %show, season = meta.season, error = %e, "Failed to sync season metadata");
                self.store
                    .record_request_error(request.id, &e.to_string())
                    .await?;
            }
        }

        let known = tracker.list(show).await?;
        let scope: BTreeSet<u32> = if request.seasons.is_empty() {
            known.iter().map(|r| r.season_number).collect()
        } else {
            request.seasons.iter().copied().collect()
        };

        let mut processed = ProcessedSet::new();
        let mut cancelled = false;

        for record in known.iter().filter(|r| scope.contains(&r.season_number)) {
            let season = record.season_number;
            if record.is_completed() {
                debug!(show_id = %show, season, "Season already completed");
                continue;
            }
            if !record.has_aired() {
                debug!(show_id = %show, season, "Season not aired or counts unknown, skipping");
                continue;
            }
            if cancel.is_cancelled().await {
                cancelled = true;
                break;
            }

            let target = SeasonTarget {
                show,
                season,
                title: &request.title,
            };
            match self
                .cascade
                .run_season(&target, provider, &mut processed, cancel)
                .await
            {
                Ok(SeasonReport { cancelled: true, .. }) => {
                    cancelled = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    // Store fault: this season is abandoned, the rest still run.
                    error!(show_id = %show, season, error = %e, "Season reconciliation aborted");
                    self.store
                        .record_request_error(request.id, &e.to_string())
                        .await?;
                }
            }
        }

        report.seasons = tracker
            .list(show)
            .await?
            .into_iter()
            .filter(|r| scope.contains(&r.season_number))
            .collect();

        report.outcome = if cancelled {
            Outcome::Cancelled
        } else if report.seasons.iter().any(SeasonRecord::is_completed) {
            Outcome::Confirmed
        } else if report.seasons.iter().any(SeasonRecord::has_aired) {
            Outcome::Failed
        } else {
            Outcome::Skipped
        };
        Ok(report)
    }

    /// Only a withdrawal recorded in the ledger stays cancelled. A pass
    /// interrupted by the caller leaves the request open for the next one.
    async fn cancelled_status(&self, id: RequestId) -> Result<RequestStatus, ReconcileError> {
        let status = match self.store.request_status(id).await? {
            Some(RequestStatus::Cancelled) => RequestStatus::Cancelled,
            _ => {
                info!(request_id = %id, "Pass interrupted, request left pending");
                RequestStatus::Pending
            }
        };
        Ok(status)
    }

    async fn finish(
        &self,
        request: &MediaRequest,
        report: ReconcileReport,
        start: Instant,
    ) -> Result<ReconcileReport, ReconcileError> {
        // A confirmed show with seasons still airing stays open for later passes.
        let status = match report.outcome {
            Outcome::Confirmed if report.has_outstanding_seasons() => RequestStatus::Pending,
            Outcome::Cancelled => self.cancelled_status(request.id).await?,
            outcome => outcome.request_status(),
        };
        self.store.set_request_status(request.id, status).await?;

        let count = |pred: fn(&SeasonRecord) -> bool| {
            u32::try_from(report.seasons.iter().filter(|r| pred(r)).count()).unwrap_or(u32::MAX)
        };
        let duration_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
        let entry = HistoryEntry {
            run_id: uuid::Uuid::new_v4().to_string(),
            request_id: request.id,
            title: request.title.clone(),
            outcome: report.outcome.as_str().to_string(),
            seasons_completed: count(SeasonRecord::is_completed),
            seasons_partial: count(|r| {
                !r.is_completed() && (r.is_discrepant || !r.confirmed_episodes.is_empty())
            }),
            seasons_failed: count(|r| {
                !r.is_completed() && r.confirmed_episodes.is_empty() && !r.failed_episodes.is_empty()
            }),
            duration_ms,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        };

        if let Err(e) = self.store.record_history(&entry).await {
            warn!(request_id = %request.id, error = %e, "Failed to record history");
        }

        metrics::counter!("reconcile_requests_total", "outcome" => report.outcome.as_str())
            .increment(1);
        info!(
            event = "reconcile_finished",
            request_id = %request.id,
            outcome = %report.outcome,
            seasons_completed = entry.seasons_completed,
            seasons_partial = entry.seasons_partial,
            duration_ms,
            "Reconciliation finished"
        );
        Ok(report)
    }
}

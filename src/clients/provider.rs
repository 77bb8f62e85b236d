//! Search provider boundary and its retry adapter.
//!
//! A provider is a single stateful session (one remote page), so it is
//! driven sequentially through `&mut self` and owned by one reconciliation
//! pass at a time.

use crate::config::ProviderConfig;
use crate::models::{CacheState, Candidate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Candidate not found: {0}")]
    NotFound(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl ProviderError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result filter applied by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchFilter {
    None,
    CompletePacks,
    WithExtras,
    /// Episode-scoped search, e.g. `S02E05`.
    Episode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    None,
    CompletePacks,
    WithExtras,
    Episode,
}

impl SearchFilter {
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::None => FilterKind::None,
            Self::CompletePacks => FilterKind::CompletePacks,
            Self::WithExtras => FilterKind::WithExtras,
            Self::Episode(_) => FilterKind::Episode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub text: String,
    pub filter: SearchFilter,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>, filter: SearchFilter) -> Self {
        Self {
            text: text.into(),
            filter,
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            SearchFilter::None => write!(f, "{}", self.text),
            SearchFilter::CompletePacks => write!(f, "{} [complete]", self.text),
            SearchFilter::WithExtras => write!(f, "{} [with extras]", self.text),
            SearchFilter::Episode(token) => write!(f, "{} [{token}]", self.text),
        }
    }
}

/// A search session against the remote catalog.
#[async_trait::async_trait]
pub trait SearchProvider: Send {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError>;

    /// Activates a candidate and reports the cache state observed afterwards.
    /// The only external side effect the engine triggers.
    async fn activate(&mut self, candidate: &Candidate) -> Result<CacheState, ProviderError>;

    /// Reverts an activation that left the candidate uncached.
    async fn undo(&mut self, _candidate: &Candidate) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Exponential backoff schedule for retryable provider errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for RetryPolicy {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
        }
    }
}

impl RetryPolicy {
    /// No retries, no waiting.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Wraps a provider and retries transient search failures.
///
/// Activation is passed through untouched so a candidate is never clicked
/// twice because of a flaky response.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: SearchProvider> RetryingProvider<P> {
    pub const fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<P: SearchProvider> SearchProvider for RetryingProvider<P> {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.search(query).await {
                Ok(results) => return Ok(results),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        query = %query,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Search failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn activate(&mut self, candidate: &Candidate) -> Result<CacheState, ProviderError> {
        self.inner.activate(candidate).await
    }

    async fn undo(&mut self, candidate: &Candidate) -> Result<(), ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.undo(candidate).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        failures_left: u32,
        calls: u32,
    }

    #[async_trait::async_trait]
    impl SearchProvider for Flaky {
        async fn search(&mut self, _query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
            self.calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(ProviderError::Transient("page went stale".into()));
            }
            Ok(vec![Candidate::new("Result")])
        }

        async fn activate(&mut self, _candidate: &Candidate) -> Result<CacheState, ProviderError> {
            Err(ProviderError::Transient("click failed".into()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let mut provider = RetryingProvider::new(
            Flaky {
                failures_left: 2,
                calls: 0,
            },
            fast_policy(3),
        );
        let results = provider
            .search(&SearchQuery::new("Show", SearchFilter::None))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(provider.inner().calls, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut provider = RetryingProvider::new(
            Flaky {
                failures_left: 5,
                calls: 0,
            },
            fast_policy(2),
        );
        let err = provider
            .search(&SearchQuery::new("Show", SearchFilter::None))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(provider.inner().calls, 2);
    }

    #[tokio::test]
    async fn test_activation_is_not_retried() {
        let mut provider = RetryingProvider::new(
            Flaky {
                failures_left: 0,
                calls: 0,
            },
            fast_policy(3),
        );
        assert!(provider.activate(&Candidate::new("x")).await.is_err());
    }

    #[test]
    fn test_backoff_schedule_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
        assert_eq!(RetryPolicy::none().backoff(4), Duration::ZERO);
    }
}

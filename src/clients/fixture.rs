//! File-backed search session for dry runs and tests.
//!
//! ```toml
//! [[search]]
//! query = "Some Show"
//! filter = "complete_packs"
//! results = [
//!     { title = "Some.Show.S01.1080p", badge = "Complete (9/9)", activation = "cached" },
//! ]
//!
//! [[search]]
//! query = "Some Show"
//! filter = "episode"
//! episode = "S01E03"
//! results = [{ title = "Some.Show.S01E03.720p" }]
//! ```

use super::provider::{FilterKind, ProviderError, SearchFilter, SearchProvider, SearchQuery};
use crate::models::{CacheState, Candidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureCandidate {
    pub title: String,
    #[serde(default)]
    pub badge: Option<String>,
    /// Cache state shown in the result list before activation.
    #[serde(default)]
    pub cache: Option<String>,
    /// Cache state reported after activation. Defaults to `cached`.
    #[serde(default)]
    pub activation: Option<CacheState>,
}

impl FixtureCandidate {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            badge: None,
            cache: None,
            activation: None,
        }
    }

    #[must_use]
    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    /// Cache label shown in the result list, e.g. `"0%"`.
    #[must_use]
    pub fn cache(mut self, label: impl Into<String>) -> Self {
        self.cache = Some(label.into());
        self
    }

    #[must_use]
    pub const fn activation(mut self, state: CacheState) -> Self {
        self.activation = Some(state);
        self
    }

    fn to_candidate(&self) -> Candidate {
        let mut candidate = Candidate::new(self.title.clone());
        if let Some(badge) = &self.badge {
            candidate = candidate.with_badge(badge);
        }
        if let Some(cache) = &self.cache {
            candidate = candidate.with_cache(CacheState::from_label(cache));
        }
        candidate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSearch {
    pub query: String,
    #[serde(default)]
    pub filter: FilterKind,
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub results: Vec<FixtureCandidate>,
    /// Number of calls answered with a transient error before succeeding.
    #[serde(default)]
    pub fail_times: u32,
}

impl FixtureSearch {
    fn matches(&self, query: &SearchQuery) -> bool {
        if !self.query.eq_ignore_ascii_case(query.text.trim()) {
            return false;
        }
        if self.filter != query.filter.kind() {
            return false;
        }
        match &query.filter {
            SearchFilter::Episode(token) => self
                .episode
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(token)),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    search: Vec<FixtureSearch>,
}

/// Replays scripted search results. Searches with no script return nothing.
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    searches: Vec<FixtureSearch>,
    activations: HashMap<String, CacheState>,
    activated: Vec<String>,
    undone: Vec<String>,
    queries: Vec<SearchQuery>,
}

impl FixtureProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(content: &str) -> Result<Self, ProviderError> {
        let file: FixtureFile =
            toml::from_str(content).map_err(|e| ProviderError::Fixture(e.to_string()))?;
        let mut provider = Self::new();
        for search in file.search {
            provider.push(search);
        }
        Ok(provider)
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Fixture(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn push(&mut self, search: FixtureSearch) {
        for candidate in &search.results {
            if let Some(state) = candidate.activation {
                self.activations.insert(candidate.title.clone(), state);
            }
        }
        self.searches.push(search);
    }

    /// Scripts the results for a query.
    #[must_use]
    pub fn with_results(mut self, query: &SearchQuery, results: Vec<FixtureCandidate>) -> Self {
        let episode = match &query.filter {
            SearchFilter::Episode(token) => Some(token.clone()),
            _ => None,
        };
        self.push(FixtureSearch {
            query: query.text.clone(),
            filter: query.filter.kind(),
            episode,
            results,
            fail_times: 0,
        });
        self
    }

    /// Scripts a query that fails transiently `times` times before answering.
    #[must_use]
    pub fn with_failures(mut self, query: &SearchQuery, times: u32) -> Self {
        if let Some(search) = self.searches.iter_mut().find(|s| s.matches(query)) {
            search.fail_times = times;
        }
        self
    }

    fn ensure_listed(&self, candidate: &Candidate) -> Result<(), ProviderError> {
        let listed = self
            .searches
            .iter()
            .any(|s| s.results.iter().any(|c| c.title == candidate.title));
        if listed {
            Ok(())
        } else {
            Err(ProviderError::NotFound(candidate.title.clone()))
        }
    }

    /// Titles activated so far, in order.
    #[must_use]
    pub fn activated(&self) -> &[String] {
        &self.activated
    }

    #[must_use]
    pub fn undone(&self) -> &[String] {
        &self.undone
    }

    /// Every query received, in order.
    #[must_use]
    pub fn queries(&self) -> &[SearchQuery] {
        &self.queries
    }
}

#[async_trait::async_trait]
impl SearchProvider for FixtureProvider {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
        self.queries.push(query.clone());

        let Some(search) = self.searches.iter_mut().find(|s| s.matches(query)) else {
            debug!(query = %query, "No fixture for query");
            return Ok(Vec::new());
        };

        if search.fail_times > 0 {
            search.fail_times -= 1;
            return Err(ProviderError::Transient(format!("scripted failure for {query}")));
        }

        Ok(search
            .results
            .iter()
            .map(FixtureCandidate::to_candidate)
            .collect())
    }

    async fn activate(&mut self, candidate: &Candidate) -> Result<CacheState, ProviderError> {
        self.ensure_listed(candidate)?;
        self.activated.push(candidate.title.clone());
        Ok(self
            .activations
            .get(&candidate.title)
            .copied()
            .unwrap_or(CacheState::Cached))
    }

    async fn undo(&mut self, candidate: &Candidate) -> Result<(), ProviderError> {
        self.ensure_listed(candidate)?;
        self.undone.push(candidate.title.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BadgeKind;

    const FIXTURE: &str = r#"
        [[search]]
        query = "Some Show"
        filter = "complete_packs"
        results = [
            { title = "Some.Show.S01.1080p", badge = "Complete (9/9)", activation = "not_cached" },
        ]

        [[search]]
        query = "Some Show"
        filter = "episode"
        episode = "S01E03"
        results = [{ title = "Some.Show.S01E03.720p" }]
    "#;

    #[tokio::test]
    async fn test_fixture_from_toml() {
        let mut provider = FixtureProvider::from_toml(FIXTURE).unwrap();

        let packs = provider
            .search(&SearchQuery::new("some show", SearchFilter::CompletePacks))
            .await
            .unwrap();
        assert_eq!(packs.len(), 1);
        let badge = packs[0].badge.unwrap();
        assert_eq!(badge.kind, BadgeKind::Complete);
        assert_eq!(badge.total, Some(9));
        assert_eq!(
            provider.activate(&packs[0]).await.unwrap(),
            CacheState::NotCached
        );

        let episodes = provider
            .search(&SearchQuery::new(
                "Some Show",
                SearchFilter::Episode("S01E03".into()),
            ))
            .await
            .unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(
            provider.activate(&episodes[0]).await.unwrap(),
            CacheState::Cached
        );

        let none = provider
            .search(&SearchQuery::new("Some Show", SearchFilter::WithExtras))
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(provider.queries().len(), 3);
        assert_eq!(provider.activated().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let query = SearchQuery::new("Show", SearchFilter::None);
        let mut provider = FixtureProvider::new()
            .with_results(&query, vec![FixtureCandidate::new("Show 2019")])
            .with_failures(&query, 1);

        assert!(provider.search(&query).await.is_err());
        assert_eq!(provider.search(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unlisted_candidate_cannot_be_activated() {
        let mut provider = FixtureProvider::from_toml(FIXTURE).unwrap();
        let err = provider
            .activate(&Candidate::new("Other.Show.S01.1080p"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotFound("Other.Show.S01.1080p".into()));
        assert!(!err.is_retryable());
        assert!(provider.activated().is_empty());
    }

    #[tokio::test]
    async fn test_listed_cache_label() {
        let query = SearchQuery::new("Show", SearchFilter::CompletePacks);
        let mut provider = FixtureProvider::new().with_results(
            &query,
            vec![FixtureCandidate::new("Show.S01.1080p").cache("0%")],
        );
        let results = provider.search(&query).await.unwrap();
        assert_eq!(results[0].cache, CacheState::NotCached);
        assert!(results[0].is_listed_uncached());
    }

    #[test]
    fn test_bad_fixture_is_reported() {
        let err = FixtureProvider::from_toml("search = 3").unwrap_err();
        assert!(matches!(err, ProviderError::Fixture(_)));
    }
}

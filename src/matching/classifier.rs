//! Accept/reject decision for a single search result.

use super::ProcessedSet;
use crate::config::MatchingConfig;
use crate::domain::{EpisodeTag, MediaKind};
use crate::models::Candidate;
use crate::parser::{
    WordMatch, detect_individual_episode_pattern, extract_episodes, extract_seasons,
    extract_year, similarity, title::partial_ratio, title::word_match,
};
use serde::Serialize;
use tracing::debug;

/// Which title threshold applies to a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Episode,
    Season,
    Movie,
}

/// What the caller is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
    /// Season tokens any of which satisfies the season check.
    pub seasons: Vec<u32>,
    pub episode: Option<EpisodeTag>,
    pub complete_packs_only: bool,
    pub strictness: Strictness,
    /// Results were already restricted to the season upstream, so an episode
    /// match stands in for the season match.
    pub season_filtered: bool,
}

impl Expectation {
    #[must_use]
    pub fn movie(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
            kind: MediaKind::Movie,
            seasons: Vec::new(),
            episode: None,
            complete_packs_only: false,
            strictness: Strictness::Movie,
            season_filtered: false,
        }
    }

    /// A full-season pack lookup.
    #[must_use]
    pub fn season(title: impl Into<String>, season: u32) -> Self {
        Self {
            title: title.into(),
            year: None,
            kind: MediaKind::Show,
            seasons: vec![season],
            episode: None,
            complete_packs_only: true,
            strictness: Strictness::Season,
            season_filtered: false,
        }
    }

    /// A single-episode lookup against season-filtered results.
    #[must_use]
    pub fn episode(title: impl Into<String>, season: u32, episode: EpisodeTag) -> Self {
        Self {
            title: title.into(),
            year: None,
            kind: MediaKind::Show,
            seasons: vec![season],
            episode: Some(episode),
            complete_packs_only: false,
            strictness: Strictness::Episode,
            season_filtered: true,
        }
    }
}

/// First check a rejected candidate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AlreadyProcessed,
    TitleMismatch,
    SequelTitle,
    YearMismatch,
    SeasonMismatch,
    EpisodeMismatch,
    IndividualEpisode,
}

/// Decision artifact for one candidate. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub accepted: bool,
    pub title_score: u8,
    pub year_ok: bool,
    pub season_ok: bool,
    pub episode_ok: bool,
    pub reason: Option<RejectReason>,
}

impl MatchResult {
    const fn processed() -> Self {
        Self {
            accepted: false,
            title_score: 0,
            year_ok: false,
            season_ok: false,
            episode_ok: false,
            reason: Some(RejectReason::AlreadyProcessed),
        }
    }
}

/// Title thresholds and year tolerance used by [`Classifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub episode: u8,
    pub season: u8,
    pub movie: u8,
    pub year_tolerance: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        use crate::constants::matching;
        Self {
            episode: matching::EPISODE_TITLE_THRESHOLD,
            season: matching::SEASON_TITLE_THRESHOLD,
            movie: matching::MOVIE_TITLE_THRESHOLD,
            year_tolerance: matching::YEAR_TOLERANCE,
        }
    }
}

impl From<&MatchingConfig> for Thresholds {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            episode: config.episode_title_threshold,
            season: config.season_title_threshold,
            movie: config.movie_title_threshold,
            year_tolerance: config.year_tolerance,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub const fn for_strictness(&self, strictness: Strictness) -> u8 {
        match strictness {
            Strictness::Episode => self.episode,
            Strictness::Season => self.season,
            Strictness::Movie => self.movie,
        }
    }
}

/// Pure candidate classifier. Marking candidates as processed is the
/// caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    #[must_use]
    pub const fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn classify(
        &self,
        candidate: &Candidate,
        expectation: &Expectation,
        processed: &ProcessedSet,
    ) -> MatchResult {
        if processed.contains(candidate.key()) {
            return MatchResult::processed();
        }

        let text = candidate.title.as_str();
        let threshold = self.thresholds.for_strictness(expectation.strictness);
        let title_score = Self::title_score(&expectation.title, text, threshold);
        let mut reason = None;

        let mut title_ok = title_score >= threshold;
        if title_ok && expectation.kind == MediaKind::Movie {
            match word_match(&expectation.title, text) {
                WordMatch::Complete => {}
                WordMatch::Sequel => {
                    title_ok = false;
                    reason = Some(RejectReason::SequelTitle);
                }
                WordMatch::Absent => title_ok = false,
            }
        }
        if !title_ok {
            reason.get_or_insert(RejectReason::TitleMismatch);
        }

        let year_ok = match expectation.kind {
            MediaKind::Movie => self.year_matches(expectation, text),
            MediaKind::Show => true,
        };
        if !year_ok {
            reason.get_or_insert(RejectReason::YearMismatch);
        }

        let (season_ok, episode_ok) = match expectation.kind {
            MediaKind::Movie => (true, true),
            MediaKind::Show => Self::season_and_episode(expectation, text),
        };
        if !season_ok {
            reason.get_or_insert(RejectReason::SeasonMismatch);
        }
        if !episode_ok {
            reason.get_or_insert(RejectReason::EpisodeMismatch);
        }

        let single_episode =
            expectation.complete_packs_only && detect_individual_episode_pattern(text);
        if single_episode {
            reason.get_or_insert(RejectReason::IndividualEpisode);
        }

        let accepted = title_ok && year_ok && season_ok && episode_ok && !single_episode;
        debug!(
            candidate = %text,
            title_score,
            year_ok,
            season_ok,
            episode_ok,
            accepted,
            "Classified candidate"
        );

        MatchResult {
            accepted,
            title_score,
            year_ok,
            season_ok,
            episode_ok,
            reason: if accepted { None } else { reason },
        }
    }

    /// Cleaned-variant score, falling back to the raw lowercase text when the
    /// cleaned comparison misses.
    fn title_score(expected: &str, candidate: &str, threshold: u8) -> u8 {
        let cleaned = similarity(expected, candidate);
        if cleaned >= threshold {
            return cleaned;
        }
        let raw = partial_ratio(&expected.to_lowercase(), &candidate.to_lowercase());
        cleaned.max(raw)
    }

    fn year_matches(&self, expectation: &Expectation, text: &str) -> bool {
        let expected = expectation
            .year
            .or_else(|| extract_year(&expectation.title, false));
        let Some(expected) = expected else {
            return true;
        };
        extract_year(text, true)
            .is_some_and(|found| (found - expected).abs() <= self.thresholds.year_tolerance)
    }

    fn season_and_episode(expectation: &Expectation, text: &str) -> (bool, bool) {
        let found = extract_seasons(text);
        let mut season_ok = expectation.seasons.is_empty()
            || expectation.seasons.iter().any(|s| found.contains(s));

        // Parsed `SxxEyy` markers decide when present; the bare tag is the fallback.
        let episode_ok = expectation.episode.is_none_or(|tag| {
            let parsed: Vec<u32> = expectation
                .seasons
                .iter()
                .flat_map(|s| extract_episodes(text, *s))
                .collect();
            if parsed.is_empty() {
                contains_tag(text, tag)
            } else {
                parsed.contains(&tag.number())
            }
        });

        if expectation.episode.is_some() && episode_ok && expectation.season_filtered {
            season_ok = true;
        }

        (season_ok, episode_ok)
    }
}

/// `E10` as a whole token: a trailing digit means a different episode
/// (`E105`).
fn contains_tag(text: &str, tag: EpisodeTag) -> bool {
    let upper = text.to_uppercase();
    let needle = tag.to_string();
    upper.match_indices(&needle).any(|(i, _)| {
        !upper[i + needle.len()..].starts_with(|c: char| c.is_ascii_digit())
    })
}

use crate::parser::extract_pack_file_counts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability of a release in the remote cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Fully cached ("100%").
    Cached,
    /// Not cached ("0%").
    NotCached,
    /// Accepted by the remote side but not yet available.
    Pending,
    #[default]
    Unknown,
}

impl CacheState {
    /// Reads the presentation strings the remote catalog uses for cache state.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        if label == "100%" || label == "cached" || label.contains("100%") {
            Self::Cached
        } else if label == "0%" || label.contains("not cached") {
            Self::NotCached
        } else if label.contains("pending") || label.ends_with('%') {
            Self::Pending
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cached => "cached",
            Self::NotCached => "not_cached",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    Complete,
    WithExtras,
    Single,
}

/// Pack badge attached to a search result, e.g. `Complete (9/9)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackBadge {
    pub kind: BadgeKind,
    /// Files present in the pack.
    pub have: Option<u32>,
    /// Files the pack claims to cover.
    pub total: Option<u32>,
}

impl PackBadge {
    /// Parses badge text. Unrecognised text yields `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        let kind = if lower.contains("with extras") {
            BadgeKind::WithExtras
        } else if lower.contains("complete") {
            BadgeKind::Complete
        } else if lower.contains("single") {
            BadgeKind::Single
        } else {
            return None;
        };

        let counts = extract_pack_file_counts(text);
        Some(Self {
            kind,
            have: counts.map(|(have, _)| have),
            total: counts.map(|(_, total)| total),
        })
    }
}

/// One search result as seen by the matching core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Raw title text as published. Also the dedup key within a pass.
    pub title: String,
    #[serde(default)]
    pub badge: Option<PackBadge>,
    #[serde(default)]
    pub cache: CacheState,
}

impl Candidate {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            badge: None,
            cache: CacheState::Unknown,
        }
    }

    #[must_use]
    pub fn with_badge(mut self, badge_text: &str) -> Self {
        self.badge = PackBadge::parse(badge_text);
        self
    }

    #[must_use]
    pub const fn with_cache(mut self, cache: CacheState) -> Self {
        self.cache = cache;
        self
    }

    /// The result list already shows the release as not cached, so
    /// activating it would only queue a download.
    #[must_use]
    pub const fn is_listed_uncached(&self) -> bool {
        matches!(self.cache, CacheState::NotCached)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.title
    }
}

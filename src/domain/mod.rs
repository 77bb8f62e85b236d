//! Domain primitives for media requests and season bookkeeping.
//!
//! Identifiers are wrapped in newtypes so a show id can never be passed where
//! a request id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a show in the external catalog.
///
/// Season records are keyed by `(ShowId, season_number)`.
///
/// ```rust
/// use seasonarr::domain::ShowId;
///
/// let id = ShowId::new(1399);
/// assert_eq!(id.value(), 1399);
/// assert_eq!(id.to_string(), "1399");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShowId(i64);

impl ShowId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ShowId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl From<ShowId> for i64 {
    fn from(id: ShowId) -> Self {
        id.0
    }
}

impl Serialize for ShowId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for ShowId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Self::new)
    }
}

/// Identifier of an enqueued media request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(i64);

impl RequestId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Self::new)
    }
}

/// Canonical season-relative episode identifier, rendered as `E<NN>`.
///
/// Ordering follows the episode number, so a `BTreeSet<EpisodeTag>` iterates
/// E01, E02, ... E10 rather than lexically.
///
/// ```rust
/// use seasonarr::domain::EpisodeTag;
///
/// let tag: EpisodeTag = "E07".parse().unwrap();
/// assert_eq!(tag.number(), 7);
/// assert_eq!(tag.to_string(), "E07");
/// assert_eq!(EpisodeTag::new(112).to_string(), "E112");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeTag(u32);

impl EpisodeTag {
    #[must_use]
    pub const fn new(episode: u32) -> Self {
        Self(episode)
    }

    #[must_use]
    pub const fn number(&self) -> u32 {
        self.0
    }

    /// Tags `E01..=E<count>`.
    pub fn range(count: u32) -> impl Iterator<Item = Self> {
        (1..=count).map(Self::new)
    }

    /// The episode-scoped search token for a season, e.g. `S02E05`.
    #[must_use]
    pub fn search_token(&self, season: u32) -> String {
        format!("S{season:02}E{:02}", self.0)
    }
}

impl fmt::Display for EpisodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:02}", self.0)
    }
}

/// Error returned when a string is not a valid `E<NN>` tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid episode tag: {0}")]
pub struct ParseEpisodeTagError(String);

impl FromStr for EpisodeTag {
    type Err = ParseEpisodeTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('E')
            .or_else(|| s.strip_prefix('e'))
            .ok_or_else(|| ParseEpisodeTagError(s.to_string()))?;

        match digits.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self(n)),
            _ => Err(ParseEpisodeTagError(s.to_string())),
        }
    }
}

impl Serialize for EpisodeTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EpisodeTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "show" | "tv" => Ok(Self::Show),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Externally supplied episode counts for one season.
///
/// Either count may be missing or stale; the tracker treats `None` as
/// "unknown", never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonMetadata {
    pub season: u32,
    #[serde(default)]
    pub episode_count: Option<u32>,
    #[serde(default)]
    pub aired_episode_count: Option<u32>,
}

/// A user's request for a movie or a show's seasons.
///
/// Created by an external collaborator and read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub id: RequestId,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    /// Catalog id (e.g. TMDB). Used as the show key when present.
    #[serde(default)]
    pub catalog_id: Option<i64>,
    /// Content id (e.g. IMDb).
    #[serde(default)]
    pub content_id: Option<String>,
    /// Explicitly requested seasons. Empty means "all outstanding seasons".
    #[serde(default)]
    pub seasons: Vec<u32>,
    /// Latest known season metadata, applied before reconciling.
    #[serde(default)]
    pub season_metadata: Vec<SeasonMetadata>,
}

impl MediaRequest {
    /// Key under which this request's season records are stored.
    #[must_use]
    pub fn show_id(&self) -> ShowId {
        ShowId::new(self.catalog_id.unwrap_or_else(|| self.id.value()))
    }

    #[must_use]
    pub const fn is_show(&self) -> bool {
        matches!(self.kind, MediaKind::Show)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_tag_ordering_is_numeric() {
        let mut tags = vec![EpisodeTag::new(10), EpisodeTag::new(2), EpisodeTag::new(1)];
        tags.sort();
        let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["E01", "E02", "E10"]);
    }

    #[test]
    fn test_episode_tag_parse_rejects_garbage() {
        assert!("E00".parse::<EpisodeTag>().is_err());
        assert!("S01".parse::<EpisodeTag>().is_err());
        assert!("E".parse::<EpisodeTag>().is_err());
        assert_eq!("e3".parse::<EpisodeTag>().unwrap(), EpisodeTag::new(3));
    }

    #[test]
    fn test_episode_tag_serde_uses_string_form() {
        let json = serde_json::to_string(&EpisodeTag::new(4)).unwrap();
        assert_eq!(json, "\"E04\"");
        let back: EpisodeTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back.number(), 4);
    }

    #[test]
    fn test_search_token() {
        assert_eq!(EpisodeTag::new(5).search_token(2), "S02E05");
    }

    #[test]
    fn test_show_id_falls_back_to_request_id() {
        let request = MediaRequest {
            id: RequestId::new(9),
            kind: MediaKind::Show,
            title: "Example".to_string(),
            year: None,
            catalog_id: None,
            content_id: None,
            seasons: vec![],
            season_metadata: vec![],
        };
        assert_eq!(request.show_id(), ShowId::new(9));
    }
}

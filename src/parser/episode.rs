//! Episode identifiers, single-episode detection and pack file counters.
//!
//! Release names come from many uploaders, so every function here is
//! best-effort: an empty result means "could not determine", never zero.

use regex::Regex;
use std::sync::OnceLock;

/// Ranges wider than this are treated as noise rather than a multi-episode file.
const MAX_EPISODE_SPAN: u32 = 50;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Episode numbers of `season` mentioned in `text`.
///
/// Understands `S02E05`, `S02E05-07` and `S02E05-E07` in any case. Markers
/// for other seasons are ignored. Result is sorted and deduplicated.
#[must_use]
pub fn extract_episodes(text: &str, season: u32) -> Vec<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"(?i)\bs(\d{1,3})e(\d{1,4})(?:\s*-\s*e?(\d{1,4}))?");

    let bytes = text.as_bytes();
    let mut episodes = Vec::new();

    for caps in re.captures_iter(text) {
        let Some(found_season) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
            continue;
        };
        if found_season != season {
            continue;
        }
        let Some(start) = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) else {
            continue;
        };
        episodes.push(start);

        let Some(end_match) = caps.get(3) else {
            continue;
        };
        // "S01E05-1080p" is a resolution, not a range end.
        let trailing = bytes.get(end_match.end()).map(u8::to_ascii_lowercase);
        if matches!(trailing, Some(b'0'..=b'9' | b'p' | b'i')) {
            continue;
        }
        if let Ok(end) = end_match.as_str().parse::<u32>()
            && end > start
            && end - start < MAX_EPISODE_SPAN
        {
            episodes.extend(start + 1..=end);
        }
    }

    episodes.sort_unstable();
    episodes.dedup();
    episodes
}

/// True when the text looks like a single-episode release.
#[must_use]
pub fn detect_individual_episode_pattern(text: &str) -> bool {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r"(?i)s\d+e\d+",
            r"(?i)\bepisode\s+\d+",
            r"(?i)\bep\s+\d+",
            r"(?i)\be\d+",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern defined in code"))
        .collect()
    });

    patterns.iter().any(|re| re.is_match(text))
}

/// Parses pack counters such as `Complete (9/9)` or `With extras (34/9)`
/// into `(have, total)`.
#[must_use]
pub fn extract_pack_file_counts(badge_text: &str) -> Option<(u32, u32)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)(?:complete|with\s+extras)?\s*\(\s*(\d+)\s*/\s*(\d+)\s*\)",
    );

    let caps = re.captures(badge_text)?;
    let have = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((have, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_episode() {
        assert_eq!(extract_episodes("Show.S02E05.1080p", 2), vec![5]);
        assert_eq!(extract_episodes("show.s02e05.1080p", 2), vec![5]);
    }

    #[test]
    fn test_extract_episode_ranges() {
        assert_eq!(extract_episodes("Show.S02E05-E07.1080p", 2), vec![5, 6, 7]);
        assert_eq!(extract_episodes("Show.S02E05-07.1080p", 2), vec![5, 6, 7]);
        assert_eq!(extract_episodes("Show S02E05 - E06", 2), vec![5, 6]);
    }

    #[test]
    fn test_extract_ignores_other_seasons() {
        assert!(extract_episodes("Show.S03E05.1080p", 2).is_empty());
        assert_eq!(extract_episodes("Show S01E09 S02E01", 2), vec![1]);
    }

    #[test]
    fn test_extract_rejects_bogus_ranges() {
        assert_eq!(extract_episodes("Show.S01E05-1080p", 1), vec![5]);
        assert_eq!(extract_episodes("Show.S01E07-E03", 1), vec![7]);
        assert_eq!(extract_episodes("Show.S01E01-E99", 1), vec![1]);
    }

    #[test]
    fn test_extract_no_marker() {
        assert!(extract_episodes("Show Season 2 Complete", 2).is_empty());
    }

    #[test]
    fn test_detect_individual_episode() {
        assert!(detect_individual_episode_pattern("Show.S01E01.720p"));
        assert!(detect_individual_episode_pattern("Show Episode 4"));
        assert!(detect_individual_episode_pattern("Show Ep 12 WEB"));
        assert!(detect_individual_episode_pattern("Show - E07"));
        assert!(!detect_individual_episode_pattern("Show Season 1 Complete 1080p"));
        assert!(!detect_individual_episode_pattern("Show.S01.1080p.WEB-DL"));
    }

    #[test]
    fn test_pack_file_counts() {
        assert_eq!(extract_pack_file_counts("Complete (9/9)"), Some((9, 9)));
        assert_eq!(extract_pack_file_counts("With extras (34/9)"), Some((34, 9)));
        assert_eq!(extract_pack_file_counts("complete ( 8 / 10 )"), Some((8, 10)));
        assert_eq!(extract_pack_file_counts("Single"), None);
        assert_eq!(extract_pack_file_counts(""), None);
    }
}

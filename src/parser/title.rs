//! Title canonicalisation, year/season extraction and fuzzy comparison.

use regex::Regex;
use std::sync::OnceLock;

const NUMBER_WORDS: &[(u32, &str)] = &[
    (0, "zero"),
    (1, "one"),
    (2, "two"),
    (3, "three"),
    (4, "four"),
    (5, "five"),
    (6, "six"),
    (7, "seven"),
    (8, "eight"),
    (9, "nine"),
    (10, "ten"),
    (11, "eleven"),
    (12, "twelve"),
    (13, "thirteen"),
    (14, "fourteen"),
    (15, "fifteen"),
    (16, "sixteen"),
    (17, "seventeen"),
    (18, "eighteen"),
    (19, "nineteen"),
    (20, "twenty"),
    (30, "thirty"),
    (40, "forty"),
    (50, "fifty"),
    (60, "sixty"),
    (70, "seventy"),
    (80, "eighty"),
    (90, "ninety"),
];

const ROMAN_SEQUELS: &[&str] = &["ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x"];

/// Maximum span accepted for a season range such as `S01-04`.
const MAX_RANGE_SPAN: u32 = 50;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// A title reduced to comparable form plus its number-spelling variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTitle {
    /// Lowercase, punctuation-free, single-spaced.
    pub canonical: String,
    /// `canonical` with number words replaced by digits ("season three" -> "season 3").
    pub digits: String,
    /// `canonical` with small numbers spelled out ("season 3" -> "season three").
    pub words: String,
}

impl CanonicalTitle {
    fn variants(&self) -> [&str; 3] {
        [&self.canonical, &self.digits, &self.words]
    }
}

/// Canonicalises a title.
///
/// Trailing `(YYYY)` / `[YYYY]` suffixes are dropped, apostrophes removed,
/// `&` read as "and", every other non-alphanumeric character turned into a
/// space, and whitespace collapsed. Applying it to its own output is a no-op.
#[must_use]
pub fn normalize(title: &str) -> CanonicalTitle {
    let canonical = canonicalize(title);
    let digits = map_tokens(&canonical, word_to_digit);
    let words = map_tokens(&canonical, digit_to_word);

    CanonicalTitle {
        canonical,
        digits,
        words,
    }
}

fn canonicalize(title: &str) -> String {
    static YEAR_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let year_suffix = get_regex(
        &YEAR_SUFFIX,
        r"[\s._-]*[\(\[]\s*(?:19|20)\d{2}\s*[\)\]][\s._-]*$",
    );

    let mut text = title.to_lowercase();
    while let Some(m) = year_suffix.find(&text) {
        if m.start() == 0 {
            break;
        }
        text.truncate(m.start());
    }

    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' | '\u{2019}' | '\u{2018}' | '`' => {}
            '&' => cleaned.push_str(" and "),
            c if c.is_alphanumeric() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn map_tokens(canonical: &str, f: fn(&str) -> Option<String>) -> String {
    canonical
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(|t| f(t).unwrap_or_else(|| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_to_digit(token: &str) -> Option<String> {
    NUMBER_WORDS
        .iter()
        .find(|(_, w)| *w == token)
        .map(|(n, _)| n.to_string())
}

fn digit_to_word(token: &str) -> Option<String> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    let n: u32 = token.parse().ok()?;
    NUMBER_WORDS
        .iter()
        .find(|(v, _)| *v == n)
        .map(|(_, w)| (*w).to_string())
}

fn number_word_value(token: &str) -> Option<u32> {
    NUMBER_WORDS
        .iter()
        .find(|(_, w)| *w == token)
        .map(|(n, _)| *n)
}

/// Finds a release year in free text.
///
/// A single bracketed year such as `(2019)` wins outright; two different
/// bracketed years are ambiguous. Otherwise the last bare `19xx`/`20xx`
/// token is used, skipping a leading token that is more likely part of the
/// title ("1917.2019.1080p" -> 2019, "2012.1080p" -> `None`). Resolution
/// markers like `2160p` never count; with `ignore_resolution` the markers and
/// `WxH` dimensions are removed before scanning.
#[must_use]
pub fn extract_year(text: &str, ignore_resolution: bool) -> Option<i32> {
    static RESOLUTION: OnceLock<Regex> = OnceLock::new();
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    static DIGITS: OnceLock<Regex> = OnceLock::new();

    let owned;
    let text = if ignore_resolution {
        let re = get_regex(&RESOLUTION, r"(?i)\b\d{3,4}[pi]\b|\b\d{3,4}x\d{3,4}\b");
        owned = re.replace_all(text, " ").into_owned();
        owned.as_str()
    } else {
        text
    };

    let bracketed = get_regex(&BRACKETED, r"[\(\[]\s*((?:19|20)\d{2})\s*[\)\]]");
    let mut bracket_years: Vec<i32> = bracketed
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();
    bracket_years.sort_unstable();
    bracket_years.dedup();
    match bracket_years.len() {
        1 => return bracket_years.first().copied(),
        0 => {}
        _ => return None,
    }

    let digits = get_regex(&DIGITS, r"\d+");
    let bytes = text.as_bytes();
    let lead = text
        .char_indices()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, _)| i);

    let mut candidates: Vec<(bool, i32)> = Vec::new();
    for m in digits.find_iter(text) {
        if m.len() != 4 {
            continue;
        }
        let Ok(year) = m.as_str().parse::<i32>() else {
            continue;
        };
        if !(1900..=2099).contains(&year) {
            continue;
        }
        let next = bytes.get(m.end()).map(u8::to_ascii_lowercase);
        if matches!(next, Some(b'p' | b'i')) {
            continue;
        }
        let next_is_dim = next == Some(b'x')
            && bytes.get(m.end() + 1).is_some_and(u8::is_ascii_digit);
        let prev_is_dim = m.start() >= 2
            && bytes[m.start() - 1].to_ascii_lowercase() == b'x'
            && bytes[m.start() - 2].is_ascii_digit();
        if next_is_dim || prev_is_dim {
            continue;
        }
        candidates.push((Some(m.start()) == lead, year));
    }

    match candidates.as_slice() {
        [] | [(true, _)] => None,
        [(false, year)] => Some(*year),
        many => many
            .iter()
            .rev()
            .find(|(leading, _)| !leading)
            .map(|(_, year)| *year),
    }
}

/// First season number mentioned in the text.
#[must_use]
pub fn extract_season(text: &str) -> Option<u32> {
    season_markers(text).into_iter().next().map(|(_, s, _)| s)
}

/// Every season covered by the text's season markers, expanding ranges
/// (`S01-04`, `S01-S04`, `Seasons 1-4`). Sorted and deduplicated.
#[must_use]
pub fn extract_seasons(text: &str) -> Vec<u32> {
    let mut seasons: Vec<u32> = season_markers(text)
        .into_iter()
        .flat_map(|(_, start, end)| match end {
            Some(end) if end > start && end - start < MAX_RANGE_SPAN => (start..=end).collect(),
            _ => vec![start],
        })
        .collect();
    seasons.sort_unstable();
    seasons.dedup();
    seasons
}

/// `(position, first season, optional range end)` for each marker.
fn season_markers(text: &str) -> Vec<(usize, u32, Option<u32>)> {
    static SHORT: OnceLock<Regex> = OnceLock::new();
    static LONG: OnceLock<Regex> = OnceLock::new();
    static SPELLED: OnceLock<Regex> = OnceLock::new();

    let short = get_regex(
        &SHORT,
        r"(?i)\bs(\d{1,2})(?:\s*-\s*s?(\d{1,2}))?(?:e\d{1,4})?\b",
    );
    let long = get_regex(
        &LONG,
        r"(?i)\bseasons?[\s._]*(\d{1,2})(?:\s*(?:-|to|&|and)\s*(\d{1,2}))?\b",
    );
    let spelled = get_regex(&SPELLED, r"(?i)\bseason[\s._]+([a-z]+)\b");

    let mut markers = Vec::new();
    for re in [short, long] {
        for caps in re.captures_iter(text) {
            let Some(start) = caps.get(1).and_then(|m| m.as_str().parse().ok()) else {
                continue;
            };
            let end = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let pos = caps.get(0).map_or(0, |m| m.start());
            markers.push((pos, start, end));
        }
    }
    for caps in spelled.captures_iter(text) {
        let Some(word) = caps.get(1) else { continue };
        if let Some(n) = number_word_value(&word.as_str().to_lowercase()) {
            let pos = caps.get(0).map_or(0, |m| m.start());
            markers.push((pos, n, None));
        }
    }

    markers.sort_by_key(|(pos, _, _)| *pos);
    markers
}

/// Best-window fuzzy ratio of the shorter string against the longer, 0..=100.
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    use rapidfuzz::distance::indel;

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return 0;
    }

    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        let score = indel::normalized_similarity(short.iter().copied(), window.iter().copied());
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }

    to_percent(best)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(score: f64) -> u8 {
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Partial-ratio similarity taken as the maximum over all canonical variants.
#[must_use]
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    a.variants()
        .into_iter()
        .zip(b.variants())
        .map(|(x, y)| partial_ratio(x, y))
        .max()
        .unwrap_or(0)
}

/// How the expected phrase sits inside a candidate title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMatch {
    /// Present as a delimited token run, not followed by a sequel marker.
    Complete,
    /// Present, but immediately followed by a sequel number ("Show 2").
    Sequel,
    /// Not present as a token run.
    Absent,
}

/// Classifies the expected phrase's placement in the candidate, across all
/// canonical variants. `Complete` anywhere wins over `Sequel`.
#[must_use]
pub fn word_match(expected: &str, candidate: &str) -> WordMatch {
    let expected = normalize(expected);
    let candidate = normalize(candidate);

    let mut result = WordMatch::Absent;
    for (e, c) in expected.variants().into_iter().zip(candidate.variants()) {
        match word_match_tokens(e, c) {
            WordMatch::Complete => return WordMatch::Complete,
            WordMatch::Sequel => result = WordMatch::Sequel,
            WordMatch::Absent => {}
        }
    }
    result
}

fn word_match_tokens(expected: &str, candidate: &str) -> WordMatch {
    let needle: Vec<&str> = expected.split(' ').filter(|t| !t.is_empty()).collect();
    let hay: Vec<&str> = candidate.split(' ').filter(|t| !t.is_empty()).collect();

    if needle.is_empty() || needle.len() > hay.len() {
        return WordMatch::Absent;
    }

    let mut result = WordMatch::Absent;
    for (i, window) in hay.windows(needle.len()).enumerate() {
        if window != needle.as_slice() {
            continue;
        }
        match hay.get(i + needle.len()) {
            Some(next) if is_sequel_marker(next) => result = WordMatch::Sequel,
            _ => return WordMatch::Complete,
        }
    }
    result
}

fn is_sequel_marker(token: &str) -> bool {
    if let Ok(n) = token.parse::<u32>() {
        return (1..100).contains(&n) && !token.starts_with('0');
    }
    ROMAN_SEQUELS.contains(&token) || number_word_value(token).is_some_and(|n| n > 0)
}

/// True when the expected phrase appears as a whole token sequence in the
/// candidate and is not the prefix of a sequel title.
#[must_use]
pub fn is_complete_word_match(expected: &str, candidate: &str) -> bool {
    word_match(expected, candidate) == WordMatch::Complete
}

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::has_cjk;
use crate::numerals::parse_chinese_numeral;

/// Season used for specials.
pub const SPECIALS_SEASON: u32 = 0;

/// Season assumed when a title carries no season marker.
pub const DEFAULT_SEASON: u32 = 1;

/// Show name and season parsed from a raw title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCandidate {
    pub raw_name: String,
    /// `None` when no season marker was found.
    pub season_hint: Option<u32>,
}

impl TitleCandidate {
    pub fn season(&self) -> u32 {
        self.season_hint.unwrap_or(DEFAULT_SEASON)
    }
}

// Brackets and tags dropped before parsing
static STRIP_TOKENS: &[&str] = &["（", "）", "《", "》", "(", ")", "【", "】", "18+"];

const SPECIALS_MARKER: &str = "特別篇";

// 第三季, 第2季, 第十八彈. The numeral may not span another 第, so names
// like 世界第一初戀 keep their own 第.
static RE_CJK_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+?)第([^第季彈弹]+)[季彈弹]").unwrap());

// "Show Season 2", case-insensitive
static RE_SEASON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)season\s*([0-9]+)").unwrap());

// "Show S2"
static RE_S_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s*\bs([0-9]+)$").unwrap());

// "Show 2". Also matches names that merely end in a number ("Blade Runner 2049").
static RE_TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*([0-9]+)$").unwrap());

/// Parse a raw show title into a clean name and season number.
///
/// Specials yield season 0; a title with no marker yields season 1.
pub fn extract_title_and_season(raw_title: &str) -> (String, u32) {
    let candidate = extract_candidate(raw_title);
    let season = candidate.season();
    (candidate.raw_name, season)
}

/// Like [`extract_title_and_season`], keeping whether a marker was found.
pub fn extract_candidate(raw_title: &str) -> TitleCandidate {
    let stripped = STRIP_TOKENS
        .iter()
        .fold(raw_title.to_string(), |acc, token| acc.replace(token, ""));

    let (name, season_hint) = if has_cjk(&stripped) {
        parse_cjk(&fullwidth_digits_to_ascii(&stripped))
    } else {
        parse_latin(&stripped)
    };

    TitleCandidate {
        raw_name: name.trim().to_string(),
        season_hint,
    }
}

fn parse_cjk(title: &str) -> (String, Option<u32>) {
    if let Some(idx) = title.find(SPECIALS_MARKER) {
        let prefix = title[..idx].trim_end_matches(['：', ':', ' ']);
        let name = if prefix.trim().is_empty() {
            title.replacen(SPECIALS_MARKER, "", 1)
        } else {
            prefix.to_string()
        };
        return (name, Some(SPECIALS_SEASON));
    }

    if let Some(caps) = RE_CJK_SEASON.captures(title) {
        if let Some(season) = parse_chinese_numeral(&caps[2]) {
            return (caps[1].to_string(), Some(season));
        }
    }

    trailing_number(title)
}

fn parse_latin(title: &str) -> (String, Option<u32>) {
    if let Some(caps) = RE_SEASON_WORD.captures(title) {
        if let Ok(season) = caps[2].parse() {
            return (caps[1].to_string(), Some(season));
        }
    }

    if let Some(caps) = RE_S_SUFFIX.captures(title) {
        if let Ok(season) = caps[2].parse() {
            return (caps[1].to_string(), Some(season));
        }
    }

    trailing_number(title)
}

fn trailing_number(title: &str) -> (String, Option<u32>) {
    RE_TRAILING_NUMBER
        .captures(title)
        .and_then(|caps| {
            let season = caps[2].parse().ok()?;
            Some((caps[1].to_string(), Some(season)))
        })
        .unwrap_or_else(|| (title.to_string(), None))
}

fn fullwidth_digits_to_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Punctuation and width normalizer for scraped Chinese text.
//!
//! Text without CJK ideographs is only trimmed. Text with CJK goes through
//! [`RULES`], an ordered table of substitutions, followed by a per-sentence
//! trim. The table is re-applied until the text stops changing, so
//! `normalize(normalize(x)) == normalize(x)`.

use std::sync::LazyLock;

use regex::Regex;

use crate::has_cjk;

/// CJK full stop, the sentence boundary used for trimming and truncation.
const FULL_STOP: char = '。';

/// Boilerplate trailers some services append to synopses.
static BOILERPLATE: &[&str] = &[
    "本季首播.",
    "本季首播。",
    "劇集首播.",
    "劇集首播。",
    "本季首集.",
    "本季首集。",
    "本季第一集.",
    "本季第一集。",
    "本季最後一集.",
    "本季最後一集。",
    "本季最後.",
    "本季最後。",
    "本季最後，",
    "本集中,",
    "本集中，",
];

/// One substitution in the normalizer table.
pub enum Substitution {
    Literal(&'static str, &'static str),
    Pattern(Regex, &'static str),
    RemoveAll(&'static [&'static str]),
}

/// A named entry of the normalizer table.
pub struct Rule {
    pub name: &'static str,
    pub substitution: Substitution,
}

impl Rule {
    fn literal(name: &'static str, from: &'static str, to: &'static str) -> Self {
        Self {
            name,
            substitution: Substitution::Literal(from, to),
        }
    }

    fn pattern(name: &'static str, pattern: &str, to: &'static str) -> Self {
        Self {
            name,
            substitution: Substitution::Pattern(Regex::new(pattern).unwrap(), to),
        }
    }

    /// Apply this rule to `text`.
    pub fn apply(&self, text: &str) -> String {
        match &self.substitution {
            Substitution::Literal(from, to) => text.replace(from, to),
            Substitution::Pattern(re, to) => re.replace_all(text, *to).into_owned(),
            Substitution::RemoveAll(phrases) => phrases
                .iter()
                .fold(text.to_string(), |acc, phrase| acc.replace(phrase, "")),
        }
    }
}

/// The ordered substitution table applied to CJK text.
pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::literal("paren_open", "(", "（"),
        Rule::literal("paren_close", ")", "）"),
        Rule::literal("exclamation", "!", "！"),
        Rule::literal("question", "?", "？"),
        Rule::literal("colon", ":", "："),
        Rule::literal("ellipsis_full_stops", "。。。", "…"),
        Rule::literal("ellipsis_dots", "...", "…"),
        Rule::literal("ellipsis_fullwidth_dots", "．．．", "…"),
        Rule::literal("quote_open", "“", "「"),
        Rule::literal("quote_close", "”", "」"),
        Rule::pattern("space_before_paren", r" +（", "（"),
        Rule::pattern("space_after_paren", r"） +", "）"),
        Rule::literal("comma", ",", "，"),
        Rule::pattern("space_around_comma", r" *， *", "，"),
        Rule::pattern("collapse_spaces", r" {2,}", " "),
        Rule::literal("end_marker", "（End）", ""),
        Rule::pattern("cast_credit", r"[ ，]*飾演?）", " 飾）"),
        Rule {
            name: "boilerplate",
            substitution: Substitution::RemoveAll(BOILERPLATE),
        },
    ]
});

/// Truncation policy for long synopses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeSettings {
    /// Texts at or under this many characters are never truncated.
    pub soft_limit: usize,
    /// Prefix windows searched, in order, for the last full stop.
    pub windows: Vec<usize>,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            soft_limit: 100,
            windows: vec![100, 150, 200],
        }
    }
}

/// Normalize scraped text with the default truncation policy.
pub fn normalize(text: &str, truncate: bool) -> String {
    normalize_with(text, truncate, &NormalizeSettings::default())
}

/// Normalize scraped text with an explicit truncation policy.
pub fn normalize_with(text: &str, truncate: bool, settings: &NormalizeSettings) -> String {
    let trimmed = text.trim();
    if !has_cjk(trimmed) {
        return trimmed.to_string();
    }

    // Every rule either shortens the text or leaves it stable, so this ends.
    let mut current = trimmed.to_string();
    loop {
        let next = apply_rules(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if truncate {
        if let Some(cut) = truncate_at_sentence(&current, settings) {
            current = cut;
        }
    }

    current.trim().to_string()
}

fn apply_rules(text: &str) -> String {
    let replaced = RULES.iter().fold(text.to_string(), |acc, rule| rule.apply(&acc));
    trim_sentences(&replaced)
}

/// Trim whitespace around every sentence without changing their order or count.
fn trim_sentences(text: &str) -> String {
    text.split(FULL_STOP)
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("。")
}

/// Cut `text` just after the last full stop inside the first matching window.
///
/// Returns `None` when the text is short enough or no window holds a full stop.
fn truncate_at_sentence(text: &str, settings: &NormalizeSettings) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= settings.soft_limit {
        return None;
    }

    settings.windows.iter().find_map(|&window| {
        let end = window.min(chars.len());
        chars[..end]
            .iter()
            .rposition(|&c| c == FULL_STOP)
            .map(|pos| chars[..=pos].iter().collect())
    })
}

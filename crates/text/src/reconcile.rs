//! Episode title/summary reconciliation.
//!
//! Rules:
//! 1. A generic scraped title ("第 7 集") never replaces a real CJK title
//!    already on the library; the stored title is kept with its episode
//!    marker rewritten to the canonical `第 N 集` form.
//! 2. Otherwise the normalized scraped title wins.
//! 3. Summaries follow the same shape: an empty (or, when Chinese is
//!    preferred, non-Chinese) scraped summary keeps a stored CJK summary.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::has_cjk;
use crate::normalize::normalize;

static RE_GENERIC_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[第剧劇]\s*(?:[0-9０-９]+|[〇零一二兩两三四五六七八九十百千]+)\s*[集話话回]|(?i:episode)\s*[0-9]+)$",
    )
    .unwrap()
});

// 剧7集, 劇 7 集, 第7集
static RE_EPISODE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[第剧劇]\s*([0-9]+)\s*集").unwrap());

/// One scraped episode, ready to be reconciled against the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
    pub episode_title: String,
    pub episode_synopsis: String,
    pub poster_url: Option<String>,
}

/// Final title and summary to write for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDecision {
    pub final_title: String,
    pub final_synopsis: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Keep a stored Chinese summary over a scraped non-Chinese one.
    pub prefer_cjk: bool,
    /// Cut long scraped summaries at a sentence boundary.
    pub truncate_synopsis: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            prefer_cjk: true,
            truncate_synopsis: false,
        }
    }
}

/// Whether `text` is an "Episode N" style placeholder with no real title.
pub fn is_generic_episode_placeholder(text: &str) -> bool {
    RE_GENERIC_EPISODE.is_match(text.trim())
}

/// Canonical placeholder for an episode without a title.
pub fn placeholder_title(episode: u32) -> String {
    format!("第 {episode} 集")
}

/// Canonical season title.
pub fn season_title(season: u32) -> String {
    format!("第 {season} 季")
}

/// Rewrite `剧7集`-style markers to `第 7 集`, leaving the rest untouched.
pub fn canonicalize_episode_marker(title: &str) -> String {
    RE_EPISODE_MARKER
        .replace_all(title, "第 ${1} 集")
        .into_owned()
}

/// Choose the episode title to write, with default settings.
pub fn reconcile(scraped_title: &str, current_title_on_target: &str) -> String {
    Reconciler::default().episode_title(scraped_title, current_title_on_target)
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(settings: ReconcileSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Choose between a scraped episode title and the one on the library.
    pub fn episode_title(&self, scraped: &str, current: &str) -> String {
        if is_generic_episode_placeholder(scraped)
            && has_cjk(current)
            && !is_generic_episode_placeholder(current)
        {
            return normalize(&canonicalize_episode_marker(current), false);
        }
        normalize(scraped, false)
    }

    /// Choose between a scraped summary and the one on the library.
    pub fn synopsis(&self, scraped: &str, current: &str) -> String {
        let scraped_usable =
            !scraped.trim().is_empty() && (!self.settings.prefer_cjk || has_cjk(scraped));
        if !scraped_usable && has_cjk(current) {
            return normalize(current, false);
        }
        normalize(scraped, self.settings.truncate_synopsis)
    }

    /// Reconcile one scraped episode against the library's current values.
    ///
    /// An empty scraped title is replaced by the `第 N 集` placeholder first.
    pub fn decide(
        &self,
        record: &EpisodeRecord,
        current_title: &str,
        current_summary: &str,
    ) -> ReconciliationDecision {
        let scraped_title = if record.episode_title.trim().is_empty() {
            placeholder_title(record.episode)
        } else {
            record.episode_title.clone()
        };

        ReconciliationDecision {
            final_title: self.episode_title(&scraped_title, current_title),
            final_synopsis: self.synopsis(&record.episode_synopsis, current_summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, synopsis: &str) -> EpisodeRecord {
        EpisodeRecord {
            show_name: "魔法少女".into(),
            season: 1,
            episode: 7,
            episode_title: title.into(),
            episode_synopsis: synopsis.into(),
            poster_url: None,
        }
    }

    #[test]
    fn generic_placeholder_detection() {
        assert!(is_generic_episode_placeholder("第 7 集"));
        assert!(is_generic_episode_placeholder("第7集"));
        assert!(is_generic_episode_placeholder("第七集"));
        assert!(is_generic_episode_placeholder("剧7集"));
        assert!(is_generic_episode_placeholder("第12話"));
        assert!(is_generic_episode_placeholder("Episode 3"));
        assert!(is_generic_episode_placeholder(" episode 10 "));
        assert!(!is_generic_episode_placeholder("第七集：家變"));
        assert!(!is_generic_episode_placeholder("魔法覺醒"));
        assert!(!is_generic_episode_placeholder("Episode"));
        assert!(!is_generic_episode_placeholder(""));
    }

    #[test]
    fn stored_real_title_beats_generic_scrape() {
        assert_eq!(reconcile("第 7 集", "魔法覺醒"), "魔法覺醒");
    }

    #[test]
    fn generic_vs_generic_keeps_scraped() {
        assert_eq!(reconcile("第 7 集", "第 7 集"), "第 7 集");
        assert_eq!(reconcile("第 7 集", "剧7集"), "第 7 集");
    }

    #[test]
    fn real_scraped_title_beats_stored_placeholder() {
        assert_eq!(reconcile("魔法覺醒", "第 7 集"), "魔法覺醒");
    }

    #[test]
    fn stored_title_with_real_suffix_is_kept() {
        assert_eq!(reconcile("第 7 集", "第七集：家變"), "第七集：家變");
    }

    #[test]
    fn stored_marker_is_canonicalized() {
        assert_eq!(reconcile("Episode 7", "剧7集 家變"), "第 7 集 家變");
    }

    #[test]
    fn latin_stored_title_does_not_block_update() {
        assert_eq!(reconcile("第 7 集", "The Awakening"), "第 7 集");
    }

    #[test]
    fn scraped_title_is_normalized() {
        assert_eq!(reconcile("魔法(上)", ""), "魔法（上）");
    }

    #[test]
    fn empty_summary_keeps_stored_one() {
        let r = Reconciler::default();
        assert_eq!(r.synopsis("  ", "他們出發了。"), "他們出發了。");
        assert_eq!(r.synopsis("新的劇情。", "舊的劇情。"), "新的劇情。");
        assert_eq!(r.synopsis("", ""), "");
    }

    #[test]
    fn english_summary_yields_to_stored_chinese_when_preferred() {
        let r = Reconciler::default();
        assert_eq!(r.synopsis("They set off.", "他們出發了。"), "他們出發了。");

        let r = Reconciler::new(ReconcileSettings {
            prefer_cjk: false,
            ..Default::default()
        });
        assert_eq!(r.synopsis("They set off.", "他們出發了。"), "They set off.");
    }

    #[test]
    fn decide_fills_placeholder_for_missing_title() {
        let r = Reconciler::default();
        let d = r.decide(&record("", "劇情。"), "第 7 集", "");
        assert_eq!(
            d,
            ReconciliationDecision {
                final_title: "第 7 集".into(),
                final_synopsis: "劇情。".into(),
            }
        );

        let d = r.decide(&record("", ""), "魔法覺醒", "舊的劇情。");
        assert_eq!(d.final_title, "魔法覺醒");
        assert_eq!(d.final_synopsis, "舊的劇情。");
    }

    #[test]
    fn season_and_placeholder_titles() {
        assert_eq!(placeholder_title(3), "第 3 集");
        assert_eq!(season_title(2), "第 2 季");
    }
}

//! Text normalization and title reconciliation for scraped metadata.
//!
//! Everything here is pure and total: any string input yields a value.

pub mod normalize;
pub mod numerals;
pub mod reconcile;
pub mod season;

pub use normalize::{NormalizeSettings, normalize};
pub use numerals::parse_chinese_numeral;
pub use reconcile::{
    EpisodeRecord, ReconcileSettings, ReconciliationDecision, Reconciler,
    is_generic_episode_placeholder, reconcile,
};
pub use season::{TitleCandidate, extract_candidate, extract_title_and_season};

/// Whether `c` is in the CJK Unified Ideographs block (U+4E00..=U+9FFF).
pub fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Whether the text contains at least one CJK ideograph.
pub fn has_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_detection() {
        assert!(has_cjk("魔法覺醒"));
        assert!(has_cjk("Episode 七"));
        assert!(!has_cjk("Breaking Bad"));
        assert!(!has_cjk("（）！"));
        assert!(!has_cjk(""));
    }
}

pub mod apply;
pub mod download;
pub mod http;
pub mod library;
pub mod plex;
pub mod provider;
pub mod services;
pub mod tmdb;

use std::collections::BTreeMap;

use plexmeta_text::{EpisodeRecord, normalize};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use provider::{Source, StreamingService};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported url: {0}")]
    Unsupported(String),
    #[error("library error: {0}")]
    Library(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] plexmeta_core::CoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Tv,
}

/// One scraped movie or episode.
///
/// Text fields are normalized when set through the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: String,
    pub kind: TitleKind,
    pub name: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub season_name: Option<String>,
    pub episode_name: Option<String>,
    pub synopsis: Option<String>,
    pub season_synopsis: Option<String>,
    pub episode_synopsis: Option<String>,
    pub content_rating: Option<String>,
    pub poster: Option<String>,
    pub background: Option<String>,
    pub episode_poster: Option<String>,
    pub source: Source,
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

impl Title {
    pub fn movie(source: Source, id: impl Into<String>, name: &str) -> Self {
        Self {
            id: id.into(),
            kind: TitleKind::Movie,
            name: normalize(name, false),
            year: None,
            season: None,
            episode: None,
            season_name: None,
            episode_name: None,
            synopsis: None,
            season_synopsis: None,
            episode_synopsis: None,
            content_rating: None,
            poster: None,
            background: None,
            episode_poster: None,
            source,
        }
    }

    pub fn episode(
        source: Source,
        id: impl Into<String>,
        name: &str,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            kind: TitleKind::Tv,
            season: Some(season),
            episode: Some(episode),
            ..Self::movie(source, id, name)
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_synopsis(mut self, text: &str) -> Self {
        self.synopsis = non_empty(normalize(text, false));
        self
    }

    pub fn with_season_name(mut self, text: &str) -> Self {
        self.season_name = non_empty(normalize(text, false));
        self
    }

    pub fn with_season_synopsis(mut self, text: &str) -> Self {
        self.season_synopsis = non_empty(normalize(text, false));
        self
    }

    pub fn with_episode_name(mut self, text: &str) -> Self {
        self.episode_name = non_empty(normalize(text, false));
        self
    }

    pub fn with_episode_synopsis(mut self, text: &str) -> Self {
        self.episode_synopsis = non_empty(normalize(text, false));
        self
    }

    pub fn with_content_rating(mut self, rating: Option<&str>) -> Self {
        self.content_rating = rating.map(str::trim).filter(|r| !r.is_empty()).map(String::from);
        self
    }

    pub fn with_poster(mut self, url: Option<String>) -> Self {
        self.poster = url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_background(mut self, url: Option<String>) -> Self {
        self.background = url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_episode_poster(mut self, url: Option<String>) -> Self {
        self.episode_poster = url.filter(|u| !u.is_empty());
        self
    }

    pub fn is_movie(&self) -> bool {
        self.kind == TitleKind::Movie
    }

    /// The reconciler's view of an episode; `None` for movies.
    pub fn episode_record(&self) -> Option<EpisodeRecord> {
        Some(EpisodeRecord {
            show_name: self.name.clone(),
            season: self.season?,
            episode: self.episode?,
            episode_title: self.episode_name.clone().unwrap_or_default(),
            episode_synopsis: self.episode_synopsis.clone().unwrap_or_default(),
            poster_url: self.episode_poster.clone(),
        })
    }
}

/// The titles scraped from one URL.
#[derive(Debug, Clone, Default)]
pub struct Titles {
    titles: Vec<Title>,
}

impl Titles {
    pub fn new(mut titles: Vec<Title>) -> Self {
        titles.sort_by_key(|t| (t.season.unwrap_or(0), t.episode.unwrap_or(0)));
        Self { titles }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Title> {
        self.titles.iter()
    }

    /// Episode count per season, in season order.
    pub fn seasons(&self) -> BTreeMap<u32, usize> {
        let mut seasons = BTreeMap::new();
        for season in self.titles.iter().filter_map(|t| t.season) {
            *seasons.entry(season).or_insert(0) += 1;
        }
        seasons
    }

    /// Titles in the requested seasons and episodes. Empty lists select all.
    pub fn with_wanted(&self, seasons: &[u32], episodes: &[u32]) -> Vec<&Title> {
        self.titles
            .iter()
            .filter(|t| {
                t.is_movie()
                    || (wanted(seasons, t.season) && wanted(episodes, t.episode))
            })
            .collect()
    }

    /// Every poster and episode poster URL, deduplicated in order.
    pub fn image_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for url in self
            .titles
            .iter()
            .flat_map(|t| [t.poster.as_ref(), t.episode_poster.as_ref()])
            .flatten()
        {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    pub fn log_summary(&self) {
        let Some(first) = self.titles.first() else {
            return;
        };
        match first.kind {
            TitleKind::Movie => info!(name = %first.name, year = ?first.year, "movie"),
            TitleKind::Tv => {
                for (season, count) in self.seasons() {
                    info!(name = %first.name, season, episodes = count, "series");
                }
            }
        }
    }
}

fn wanted(list: &[u32], value: Option<u32>) -> bool {
    list.is_empty() || value.is_some_and(|v| list.contains(&v))
}

impl<'a> IntoIterator for &'a Titles {
    type Item = &'a Title;
    type IntoIter = std::slice::Iter<'a, Title>;

    fn into_iter(self) -> Self::IntoIter {
        self.titles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(season: u32, episode: u32) -> Title {
        Title::episode(Source::Kktv, format!("{season}-{episode}"), "魔法少女", season, episode)
    }

    #[test]
    fn builders_normalize_text() {
        let t = ep(1, 1)
            .with_synopsis("本集中,他們出發了。")
            .with_episode_name("  ")
            .with_content_rating(Some(" TV-14 "));
        assert_eq!(t.synopsis.as_deref(), Some("他們出發了。"));
        assert_eq!(t.episode_name, None);
        assert_eq!(t.content_rating.as_deref(), Some("TV-14"));
    }

    #[test]
    fn episode_record_requires_coordinates() {
        let record = ep(2, 5).with_episode_name("魔法(上)").episode_record().unwrap();
        assert_eq!(record.season, 2);
        assert_eq!(record.episode, 5);
        assert_eq!(record.episode_title, "魔法（上）");

        assert!(Title::movie(Source::Kktv, "1", "電影").episode_record().is_none());
    }

    #[test]
    fn titles_are_ordered_and_filtered() {
        let titles = Titles::new(vec![ep(2, 1), ep(1, 2), ep(1, 1), ep(3, 1)]);
        let order: Vec<_> = titles.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, ["1-1", "1-2", "2-1", "3-1"]);

        let picked: Vec<_> = titles.with_wanted(&[1, 3], &[1]).iter().map(|t| t.id.clone()).collect();
        assert_eq!(picked, ["1-1", "3-1"]);
        assert_eq!(titles.with_wanted(&[], &[]).len(), 4);

        let seasons = titles.seasons();
        assert_eq!(seasons.get(&1), Some(&2));
        assert_eq!(seasons.len(), 3);
    }

    #[test]
    fn image_urls_are_deduplicated() {
        let titles = Titles::new(vec![
            ep(1, 1).with_poster(Some("p".into())).with_episode_poster(Some("e1".into())),
            ep(1, 2).with_poster(Some("p".into())).with_episode_poster(Some("e2".into())),
        ]);
        assert_eq!(titles.image_urls(), ["p", "e1", "e2"]);
    }
}

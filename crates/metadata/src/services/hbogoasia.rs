use std::sync::LazyLock;

use plexmeta_text::extract_title_and_season;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{fill_template, url_basename};
use crate::provider::{ServiceContext, Source, StreamingService};
use crate::services::{as_u32, as_year};
use crate::{MetadataError, Title};

static RE_SERIES_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/sr(\d+)").unwrap());

/// Metadata language code for Traditional Chinese.
const LANG: &str = "CHN";

static NULL: Value = Value::Null;

pub struct HboGoAsia {
    url: String,
    bundle_id: String,
    ctx: ServiceContext,
}

impl HboGoAsia {
    pub fn new(url: &str, ctx: ServiceContext) -> Result<Self, MetadataError> {
        let bundle_id = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .ok_or_else(|| MetadataError::Unsupported(url.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            bundle_id,
            ctx,
        })
    }

    async fn territory(&self) -> Result<String, MetadataError> {
        let url = fill_template(self.ctx.endpoint("geo")?, &[("bundle_id", &self.bundle_id)]);
        let data = self.ctx.http.get_json(&url, &[]).await?;
        let territory = data["territory"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| MetadataError::NotFound("hbo go asia is out of service here".into()))?;
        debug!(territory = %territory, "hbo go asia territory");
        Ok(territory)
    }

    async fn list(&self, endpoint: &str, parent_id: &str, territory: &str) -> Result<Vec<Value>, MetadataError> {
        let url = fill_template(
            self.ctx.endpoint(endpoint)?,
            &[("parent_id", parent_id), ("territory", territory)],
        );
        let mut data = self.ctx.http.get_json(&url, &[]).await?;
        Ok(match data.pointer_mut("/results").map(Value::take) {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        })
    }
}

#[async_trait::async_trait]
impl StreamingService for HboGoAsia {
    fn source(&self) -> Source {
        Source::HboGoAsia
    }

    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError> {
        let territory = self.territory().await?;

        let Some(caps) = RE_SERIES_ID.captures(&self.url) else {
            let content_id = url_basename(&self.url);
            let url = fill_template(
                self.ctx.endpoint("movie")?,
                &[("content_id", &content_id), ("territory", &territory)],
            );
            let data = self.ctx.http.get_json(&url, &[]).await?;
            return Ok(vec![parse_movie(&content_id, &data)?]);
        };

        let mut titles = Vec::new();
        for season in self.list("tvseason", &caps[1], &territory).await? {
            let Some(season_id) = season["contentId"].as_str() else {
                warn!("hbo go asia: season without content id, skipping");
                continue;
            };
            let episodes = self.list("tvepisode", season_id, &territory).await?;
            titles.extend(parse_season(&season, &episodes));
        }
        Ok(titles)
    }
}

/// The Chinese entry of `metadata.titleInformations`, else the first one.
fn title_info(data: &Value) -> &Value {
    let infos = data["metadata"]["titleInformations"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    infos
        .iter()
        .find(|info| info["lang"].as_str() == Some(LANG))
        .or_else(|| infos.first())
        .unwrap_or(&NULL)
}

fn material(season: &Value, marker: &str) -> Option<String> {
    season["materials"]
        .as_array()?
        .iter()
        .filter_map(|m| m["href"].as_str())
        .find(|href| href.contains(marker))
        .map(String::from)
}

pub fn parse_movie(content_id: &str, data: &Value) -> Result<Title, MetadataError> {
    let info = title_info(data);
    let name = info["name"]
        .as_str()
        .ok_or_else(|| MetadataError::Provider(format!("hbo go asia: no title for {content_id}")))?;
    Ok(Title::movie(Source::HboGoAsia, content_id, name)
        .with_year(as_year(&data["releaseDate"]))
        .with_synopsis(info["description"].as_str().unwrap_or_default())
        .with_poster(data["imagePortrait"].as_str().map(String::from))
        .with_background(data["image"].as_str().map(String::from)))
}

/// Episodes of one season. Episode titles are left for the reconciler.
pub fn parse_season(season: &Value, episodes: &[Value]) -> Vec<Title> {
    let Some(season_index) = as_u32(&season["seasonNumber"]) else {
        return Vec::new();
    };
    let info = title_info(season);
    let (name, _) = extract_title_and_season(info["name"].as_str().unwrap_or_default());
    let season_synopsis = info["summary"].as_str().unwrap_or_default();
    let poster = material(season, "portrait");
    let background = material(season, "largescreen_thumbnail");

    episodes
        .iter()
        .filter_map(|ep| {
            let episode_index = as_u32(&ep["episodeNumber"])?;
            Some(
                Title::episode(
                    Source::HboGoAsia,
                    ep["contentId"].as_str().unwrap_or_default(),
                    &name,
                    season_index,
                    episode_index,
                )
                .with_season_synopsis(season_synopsis)
                .with_poster(poster.clone())
                .with_background(background.clone())
                .with_episode_synopsis(title_info(ep)["description"].as_str().unwrap_or_default())
                .with_episode_poster(ep["image"].as_str().map(String::from)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn movie_prefers_chinese_metadata() {
        let data = json!({
            "metadata": { "titleInformations": [
                { "lang": "ENG", "name": "Dune", "description": "Paul Atreides..." },
                { "lang": "CHN", "name": "沙丘", "description": "保羅亞崔迪..." }
            ]},
            "imagePortrait": "https://img/portrait.jpg",
            "image": "https://img/landscape.jpg"
        });
        let t = parse_movie("m1", &data).unwrap();
        assert_eq!(t.name, "沙丘");
        assert_eq!(t.synopsis.as_deref(), Some("保羅亞崔迪…"));
        assert_eq!(t.poster.as_deref(), Some("https://img/portrait.jpg"));
        assert_eq!(t.background.as_deref(), Some("https://img/landscape.jpg"));
    }

    #[test]
    fn movie_without_metadata_is_an_error() {
        assert!(parse_movie("m1", &json!({})).is_err());
    }

    #[test]
    fn season_with_episodes() {
        let season = json!({
            "seasonNumber": 2,
            "contentId": "s2",
            "metadata": { "titleInformations": [
                { "lang": "CHN", "name": "繼承之戰 第二季", "summary": "羅伊家族的權力鬥爭。" }
            ]},
            "materials": [
                { "href": "https://img/s2_largescreen_thumbnail.jpg" },
                { "href": "https://img/s2_portrait.jpg" }
            ]
        });
        let episodes = vec![
            json!({
                "contentId": "e1",
                "episodeNumber": 1,
                "metadata": { "titleInformations": [{ "lang": "CHN", "description": "肯道爾回來了。" }] },
                "image": "https://img/e1.jpg"
            }),
            json!({ "contentId": "e2" }),
        ];
        let titles = parse_season(&season, &episodes);
        assert_eq!(titles.len(), 1);
        let t = &titles[0];
        assert_eq!(t.name, "繼承之戰");
        assert_eq!((t.season, t.episode), (Some(2), Some(1)));
        assert_eq!(t.episode_name, None);
        assert_eq!(t.season_synopsis.as_deref(), Some("羅伊家族的權力鬥爭。"));
        assert_eq!(t.episode_synopsis.as_deref(), Some("肯道爾回來了。"));
        assert_eq!(t.poster.as_deref(), Some("https://img/s2_portrait.jpg"));
        assert_eq!(t.background.as_deref(), Some("https://img/s2_largescreen_thumbnail.jpg"));
    }
}

use std::sync::LazyLock;

use plexmeta_text::{extract_title_and_season, parse_chinese_numeral};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::http::{fill_template, url_basename};
use crate::provider::{ServiceContext, Source, StreamingService};
use crate::services::{as_year, str_at};
use crate::{MetadataError, Title};

static RE_SEASON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"第(.+)季").unwrap());
static RE_EPISODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"第(\d+)[集話]").unwrap());

pub struct Kktv {
    title_id: String,
    ctx: ServiceContext,
}

impl Kktv {
    pub fn new(url: &str, ctx: ServiceContext) -> Self {
        Self {
            title_id: url_basename(url),
            ctx,
        }
    }
}

#[async_trait::async_trait]
impl StreamingService for Kktv {
    fn source(&self) -> Source {
        Source::Kktv
    }

    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError> {
        let url = fill_template(self.ctx.endpoint("titles")?, &[("title_id", &self.title_id)]);
        let data = self.ctx.http.get_json(&url, &[]).await?;
        parse_titles(&data["data"])
    }
}

fn large_image(url: Option<&str>) -> Option<String> {
    url.map(|u| u.replace(".xs", ".lg"))
}

/// Parse the `data` object of a KKTV title response.
pub fn parse_titles(data: &Value) -> Result<Vec<Title>, MetadataError> {
    let raw_title = data["title"]
        .as_str()
        .ok_or_else(|| MetadataError::Provider("kktv: title missing".into()))?;
    let name = raw_title.replace("(日)", "").replace("(中)", "");
    let name = name.trim();
    let id = data["id"].as_str().unwrap_or_default();
    let year = as_year(&data["release_year"]);
    let synopsis = data["summary"].as_str().unwrap_or_default();
    let poster = large_image(data["cover"].as_str());

    if data["title_type"].as_str() == Some("film") {
        return Ok(vec![
            Title::movie(Source::Kktv, id, name)
                .with_year(year)
                .with_synopsis(synopsis)
                .with_poster(poster),
        ]);
    }

    let (name, default_season) = extract_title_and_season(name);
    let series = data["series"].as_array().map(Vec::as_slice).unwrap_or_default();
    let mut titles = Vec::new();

    for season in series {
        let season_index = if series.len() > 1 {
            str_at(season, "/title")
                .and_then(|t| RE_SEASON.captures(t))
                .and_then(|caps| parse_chinese_numeral(&caps[1]))
                .unwrap_or(default_season)
        } else {
            default_season
        };

        for episode in season["episodes"].as_array().map(Vec::as_slice).unwrap_or_default() {
            let episode_title = episode["title"].as_str().unwrap_or_default();
            let Some(episode_index) = episode_number(episode) else {
                warn!(title = episode_title, "kktv: cannot tell episode number, skipping");
                continue;
            };

            titles.push(
                Title::episode(
                    Source::Kktv,
                    episode["id"].as_str().unwrap_or_default(),
                    &name,
                    season_index,
                    episode_index,
                )
                .with_year(year)
                .with_synopsis(synopsis)
                .with_poster(poster.clone())
                .with_episode_name(episode_title)
                .with_episode_poster(large_image(episode["still"].as_str())),
            );
        }
    }

    Ok(titles)
}

// 第N集 / 第N話 in the title, else the episode id minus the series id prefix.
fn episode_number(episode: &Value) -> Option<u32> {
    if let Some(caps) = episode["title"].as_str().and_then(|t| RE_EPISODE.captures(t)) {
        return caps[1].parse().ok();
    }
    let id = episode["id"].as_str()?;
    let series_id = episode["series_id"].as_str()?;
    id.strip_prefix(series_id)?.parse().ok()
}

use chrono::{DateTime, Datelike, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{fill_template, url_basename};
use crate::provider::{ServiceContext, Source, StreamingService};
use crate::services::{as_u32, str_at};
use crate::{MetadataError, Title};

/// Episodes returned per page of the shows endpoint.
const PAGE_SIZE: u64 = 10;

/// Most pages requested for one show, whatever episode count the API reports.
pub const MAX_PAGES: u64 = 100;

/// Page requests in flight at once.
const MAX_IN_FLIGHT: usize = 4;

/// `nextToken` values (`offset:size`) covering `total` episodes, capped at [`MAX_PAGES`].
pub fn page_tokens(total: u64) -> Vec<String> {
    let pages = total.div_ceil(PAGE_SIZE);
    if pages > MAX_PAGES {
        warn!(total, max_pages = MAX_PAGES, "apple tv+ episode count too large, truncating");
    }
    (0..pages.min(MAX_PAGES))
        .map(|n| format!("{}:{PAGE_SIZE}", n * PAGE_SIZE))
        .collect()
}

pub struct AppleTvPlus {
    id: String,
    is_movie: bool,
    ctx: ServiceContext,
}

impl AppleTvPlus {
    pub fn new(url: &str, ctx: ServiceContext) -> Self {
        Self {
            id: url_basename(url),
            is_movie: url.contains("/movie"),
            ctx,
        }
    }

    fn params(&self) -> Vec<(&str, &str)> {
        self.ctx
            .config
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    async fn episodes(&self, total: u64) -> Result<Vec<Value>, MetadataError> {
        let url = fill_template(self.ctx.endpoint("shows")?, &[("id", &self.id)]);
        let pages: Vec<Value> = stream::iter(page_tokens(total))
            .map(|token| {
                let url = &url;
                async move {
                    let mut params = self.params();
                    params.push(("nextToken", token.as_str()));
                    self.ctx.http.get_json(url, &params).await
                }
            })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        Ok(pages
            .into_iter()
            .flat_map(|mut page| match page.pointer_mut("/data/episodes").map(Value::take) {
                Some(Value::Array(episodes)) => episodes,
                _ => Vec::new(),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl StreamingService for AppleTvPlus {
    fn source(&self) -> Source {
        Source::AppleTvPlus
    }

    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError> {
        let content_type = if self.is_movie { "movies" } else { "shows" };
        let url = fill_template(
            self.ctx.endpoint("title")?,
            &[("content_type", content_type), ("id", &self.id)],
        );
        let data = self.ctx.http.get_json(&url, &self.params()).await?;
        let data = &data["data"];
        if data["playables"].as_object().is_none_or(|p| p.is_empty()) {
            return Err(MetadataError::NotFound(format!("apple tv+ title {}", self.id)));
        }

        let info = parse_show_info(data);
        if self.is_movie {
            return Ok(vec![info.into_movie(&self.id)]);
        }

        let url = fill_template(self.ctx.endpoint("shows")?, &[("id", &self.id)]);
        let mut params = self.params();
        params.push(("selectedSeasonEpisodesOnly", "false"));
        let listing = self.ctx.http.get_json(&url, &params).await?;
        let total = listing["data"]["totalEpisodeCount"].as_u64().unwrap_or(0);
        debug!(id = %self.id, total, "apple tv+ episode count");

        let episodes = self.episodes(total).await?;
        Ok(parse_episodes(&info, &episodes))
    }
}

/// Show- or movie-level fields shared by every title.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowInfo {
    pub name: String,
    pub year: Option<i32>,
    pub synopsis: String,
    pub content_rating: Option<String>,
    pub poster: Option<String>,
}

impl ShowInfo {
    fn into_movie(self, id: &str) -> Title {
        Title::movie(Source::AppleTvPlus, id, &self.name)
            .with_year(self.year)
            .with_synopsis(&self.synopsis)
            .with_content_rating(self.content_rating.as_deref())
            .with_poster(self.poster)
    }
}

/// Expand an artwork template (`…/{w}x{h}.{f}`) to its full size.
fn artwork_url(art: &Value) -> Option<String> {
    let url = art["url"].as_str()?;
    let width = art["width"].as_u64().unwrap_or(0).to_string();
    let height = art["height"].as_u64().unwrap_or(0).to_string();
    Some(fill_template(url, &[("w", &width), ("h", &height), ("f", "webp")]))
}

pub fn parse_show_info(data: &Value) -> ShowInfo {
    let content = &data["content"];
    ShowInfo {
        name: content["title"].as_str().unwrap_or_default().to_string(),
        year: content["releaseDate"]
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|d| d.year()),
        synopsis: content["description"].as_str().unwrap_or_default().to_string(),
        content_rating: str_at(content, "/rating/displayName").map(String::from),
        poster: artwork_url(&content["images"]["posterArt"]),
    }
}

/// Build episode titles, skipping announced but unreleased episodes.
pub fn parse_episodes(info: &ShowInfo, episodes: &[Value]) -> Vec<Title> {
    episodes
        .iter()
        .filter(|ep| !ep["comingSoon"].as_bool().unwrap_or(false))
        .filter_map(|ep| {
            let season = as_u32(&ep["seasonNumber"])?;
            let episode = as_u32(&ep["episodeNumber"])?;
            let name = ep["showTitle"].as_str().unwrap_or(&info.name);
            Some(
                Title::episode(
                    Source::AppleTvPlus,
                    ep["id"].as_str().unwrap_or_default(),
                    name,
                    season,
                    episode,
                )
                .with_year(info.year)
                .with_synopsis(&info.synopsis)
                .with_content_rating(info.content_rating.as_deref())
                .with_episode_name(ep["title"].as_str().unwrap_or_default())
                .with_episode_synopsis(ep["description"].as_str().unwrap_or_default())
                .with_episode_poster(artwork_url(&ep["images"]["posterArt"])),
            )
        })
        .collect()
}

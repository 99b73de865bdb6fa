use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::http::{fill_template, url_basename};
use crate::provider::{ServiceContext, Source, StreamingService};
use crate::services::{as_u32, as_year, str_at};
use crate::{MetadataError, Title};

/// Episodes per page of the `DmcEpisodes` endpoint.
const PAGE_SIZE: u64 = 30;

pub struct DisneyPlus {
    content_id: String,
    is_movie: bool,
    ctx: ServiceContext,
}

impl DisneyPlus {
    pub fn new(url: &str, ctx: ServiceContext) -> Self {
        Self {
            content_id: url_basename(url),
            is_movie: url.contains("/movies"),
            ctx,
        }
    }

    fn region(&self) -> &str {
        self.ctx.region.as_deref().unwrap_or("TW")
    }

    async fn season_episodes(&self, season: &Value) -> Result<Vec<Value>, MetadataError> {
        let season_id = season["seasonId"].as_str().unwrap_or_default();
        let hits = season["episodes_meta"]["hits"].as_u64().unwrap_or(0);
        let template = self.ctx.endpoint("episodes")?;

        let pages = try_join_all((1..=hits.div_ceil(PAGE_SIZE)).map(|page| {
            let url = fill_template(
                template,
                &[
                    ("region", self.region()),
                    ("language", &self.ctx.language),
                    ("season_id", season_id),
                    ("page_number", &page.to_string()),
                ],
            );
            async move { self.ctx.http.get_json(&url, &[]).await }
        }))
        .await?;

        debug!(season_id, hits, pages = pages.len(), "disney+ season");
        Ok(pages
            .into_iter()
            .flat_map(|mut page| {
                match page.pointer_mut("/data/DmcEpisodes/videos").map(Value::take) {
                    Some(Value::Array(videos)) => videos,
                    _ => Vec::new(),
                }
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl StreamingService for DisneyPlus {
    fn source(&self) -> Source {
        Source::DisneyPlus
    }

    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError> {
        let (bundle, encoded_type) = if self.is_movie {
            ("DmcVideoBundle", "encodedFamilyId")
        } else {
            ("DmcSeriesBundle", "encodedSeriesId")
        };
        let url = fill_template(
            self.ctx.endpoint("titles")?,
            &[
                ("content_type", bundle),
                ("region", self.region()),
                ("language", &self.ctx.language),
                ("encoded_type", encoded_type),
                ("content_id", &self.content_id),
            ],
        );
        let mut data = self.ctx.http.get_json(&url, &[]).await?;
        let data = data
            .pointer_mut(&format!("/data/{bundle}"))
            .map(Value::take)
            .unwrap_or_default();

        let not_found = || {
            MetadataError::NotFound(format!(
                "disney+ returned nothing for {} in region {}",
                self.content_id,
                self.region()
            ))
        };

        if self.is_movie {
            return parse_movie(&self.content_id, &data["video"])
                .map(|t| vec![t])
                .ok_or_else(not_found);
        }

        let series = parse_series(&data["series"]).ok_or_else(not_found)?;
        let mut episodes = Vec::new();
        for season in data["seasons"]["seasons"].as_array().map(Vec::as_slice).unwrap_or_default() {
            episodes.extend(self.season_episodes(season).await?);
        }
        Ok(parse_episodes(&self.content_id, &series, &episodes))
    }
}

// Background art lives under `background_details` or, on older titles, `background`.
fn background(image: &Value, variant: &str) -> Option<String> {
    ["background_details", "background"].iter().find_map(|key| {
        str_at(image, &format!("/{key}/1.78/{variant}/default/url")).map(String::from)
    })
}

pub fn parse_movie(content_id: &str, video: &Value) -> Option<Title> {
    let name = str_at(video, "/text/title/full/program/default/content")?;
    Some(
        Title::movie(Source::DisneyPlus, content_id, name)
            .with_year(as_year(&video["releases"][0]["releaseYear"]))
            .with_synopsis(
                str_at(video, "/text/description/medium/program/default/content").unwrap_or_default(),
            )
            .with_poster(str_at(video, "/image/tile/0.71/program/default/url").map(String::from))
            .with_background(background(&video["image"], "program")),
    )
}

/// Series-level fields shared by every episode.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub name: String,
    pub year: Option<i32>,
    pub synopsis: String,
    pub background: Option<String>,
}

pub fn parse_series(series: &Value) -> Option<SeriesInfo> {
    Some(SeriesInfo {
        name: str_at(series, "/text/title/full/series/default/content")?.to_string(),
        year: as_year(&series["releases"][0]["releaseYear"]),
        synopsis: str_at(series, "/text/description/medium/series/default/content")
            .unwrap_or_default()
            .to_string(),
        background: background(&series["image"], "series"),
    })
}

pub fn parse_episodes(content_id: &str, series: &SeriesInfo, episodes: &[Value]) -> Vec<Title> {
    episodes
        .iter()
        .filter_map(|ep| {
            let season = as_u32(&ep["seasonSequenceNumber"])?;
            let episode = as_u32(&ep["episodeSequenceNumber"])?;
            Some(
                Title::episode(Source::DisneyPlus, content_id, &series.name, season, episode)
                    .with_year(series.year)
                    .with_synopsis(&series.synopsis)
                    .with_background(series.background.clone())
                    .with_poster(str_at(ep, "/image/tile/0.71/series/default/url").map(String::from))
                    .with_season_synopsis(
                        str_at(ep, "/text/description/medium/season/default/content")
                            .unwrap_or_default(),
                    )
                    .with_episode_name(
                        str_at(ep, "/text/title/full/program/default/content").unwrap_or_default(),
                    )
                    .with_episode_synopsis(
                        str_at(ep, "/text/description/full/program/default/content")
                            .unwrap_or_default(),
                    )
                    .with_episode_poster(
                        str_at(ep, "/image/thumbnail/1.78/program/default/url").map(String::from),
                    ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn movie() {
        let video = json!({
            "text": {
                "title": { "full": { "program": { "default": { "content": "可可夜總會" } } } },
                "description": { "medium": { "program": { "default": { "content": "米高夢想成為音樂家!" } } } }
            },
            "releases": [{ "releaseYear": 2017 }],
            "image": {
                "tile": { "0.71": { "program": { "default": { "url": "https://img/poster" } } } },
                "background": { "1.78": { "program": { "default": { "url": "https://img/bg" } } } }
            }
        });
        let t = parse_movie("abc", &video).unwrap();
        assert_eq!(t.name, "可可夜總會");
        assert_eq!(t.year, Some(2017));
        assert_eq!(t.synopsis.as_deref(), Some("米高夢想成為音樂家！"));
        assert_eq!(t.poster.as_deref(), Some("https://img/poster"));
        assert_eq!(t.background.as_deref(), Some("https://img/bg"));
    }

    #[test]
    fn missing_video_is_none() {
        assert!(parse_movie("abc", &Value::Null).is_none());
        assert!(parse_series(&Value::Null).is_none());
    }

    #[test]
    fn series_episodes() {
        let series = parse_series(&json!({
            "text": {
                "title": { "full": { "series": { "default": { "content": "洛基" } } } },
                "description": { "medium": { "series": { "default": { "content": "洛基的冒險。" } } } }
            },
            "releases": [{ "releaseYear": 2021 }],
            "image": {
                "background_details": { "1.78": { "series": { "default": { "url": "https://img/details" } } } },
                "background": { "1.78": { "series": { "default": { "url": "https://img/plain" } } } }
            }
        }))
        .unwrap();
        assert_eq!(series.background.as_deref(), Some("https://img/details"));

        let episodes = vec![
            json!({
                "seasonSequenceNumber": 1,
                "episodeSequenceNumber": 2,
                "text": {
                    "title": { "full": { "program": { "default": { "content": "神聖時間線" } } } },
                    "description": {
                        "full": { "program": { "default": { "content": "洛基被帶到時間變異管理局。" } } },
                        "medium": { "season": { "default": { "content": "第一季。" } } }
                    }
                },
                "image": {
                    "thumbnail": { "1.78": { "program": { "default": { "url": "https://img/still" } } } }
                }
            }),
            json!({ "episodeSequenceNumber": 3 }),
        ];
        let titles = parse_episodes("abc", &series, &episodes);
        assert_eq!(titles.len(), 1);
        let t = &titles[0];
        assert_eq!((t.season, t.episode), (Some(1), Some(2)));
        assert_eq!(t.episode_name.as_deref(), Some("神聖時間線"));
        assert_eq!(t.season_synopsis.as_deref(), Some("第一季。"));
        assert_eq!(t.episode_poster.as_deref(), Some("https://img/still"));
        assert_eq!(t.poster, None);
    }
}

use std::sync::LazyLock;

use futures::future::try_join_all;
use plexmeta_text::extract_title_and_season;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::http::fill_template;
use crate::provider::{ServiceContext, Source, StreamingService};
use crate::services::{as_u32, as_year};
use crate::{MetadataError, Title};

static RE_PLAY_WITH_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://www\.iq\.com/play/.+-([^-]+)\?lang=.+").unwrap());
static RE_PLAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://www\.iq\.com/play/([^-?]+)").unwrap());
static RE_PROPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(\{"props":\{.*\})"#).unwrap());
static RE_ALBUM_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)_\d+_\d+\.webp").unwrap());
static RE_EPISODE_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)\.(webp|jpg)").unwrap());

/// Cookie carrying the device id the episode endpoint expects.
const DEVICE_COOKIE: &str = "QC005";

pub struct Iqiyi {
    album_url: String,
    ctx: ServiceContext,
}

impl Iqiyi {
    pub fn new(url: &str, ctx: ServiceContext) -> Self {
        Self {
            album_url: album_url(url),
            ctx,
        }
    }
}

/// Rewrite a `play/` URL to its album page; album URLs pass through.
pub fn album_url(url: &str) -> String {
    if !url.contains("play/") {
        return url.to_string();
    }
    RE_PLAY_WITH_LANG
        .captures(url)
        .or_else(|| RE_PLAY.captures(url))
        .map(|caps| format!("https://www.iq.com/album/{}", &caps[1]))
        .unwrap_or_else(|| url.to_string())
}

/// Album page state embedded in the HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumPage {
    pub mode_code: String,
    pub lang_code: String,
    pub album: Value,
}

pub fn parse_album_page(html: &str) -> Result<AlbumPage, MetadataError> {
    let raw = RE_PROPS
        .captures(html)
        .ok_or_else(|| MetadataError::Provider("iqiyi: page state not found".into()))?;
    let mut data: Value = serde_json::from_str(&raw[1])
        .map_err(|e| MetadataError::Provider(format!("iqiyi: page state: {e}")))?;
    let props = data
        .get_mut("props")
        .ok_or_else(|| MetadataError::Provider("iqiyi: page state has no props".into()))?;
    let page_props = &props["initialProps"]["pageProps"];
    let mode_code = page_props["modeCode"].as_str().unwrap_or_default().to_string();
    let lang_code = page_props["langCode"].as_str().unwrap_or_default().to_string();
    let album = props
        .pointer_mut("/initialState/album/videoAlbumInfo")
        .map(Value::take)
        .ok_or_else(|| MetadataError::Provider("iqiyi: album info missing".into()))?;
    Ok(AlbumPage {
        mode_code,
        lang_code,
        album,
    })
}

#[async_trait::async_trait]
impl StreamingService for Iqiyi {
    fn source(&self) -> Source {
        Source::Iqiyi
    }

    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError> {
        let page = self.ctx.http.get_page(&self.album_url).await?;
        let device_id = page.cookies.get(DEVICE_COOKIE).cloned().unwrap_or_default();
        let AlbumPage {
            mode_code,
            lang_code,
            album,
        } = parse_album_page(&page.body)?;

        if album["videoType"].as_str() == Some("singleVideo") {
            return Ok(vec![parse_movie(&album)]);
        }

        let album_id = id_of(&album["albumId"]);
        let template = self.ctx.endpoint("episodes")?;
        let ranges = album["totalPageRange"].as_array().map(Vec::as_slice).unwrap_or_default();
        debug!(album_id = %album_id, pages = ranges.len(), "iqiyi episode pages");

        let pages = try_join_all(ranges.iter().map(|range| {
            let url = fill_template(
                template,
                &[
                    ("album_id", &album_id),
                    ("mode_code", &mode_code),
                    ("lang_code", &lang_code),
                    ("device_id", &device_id),
                    ("end_order", &id_of(&range["to"])),
                    ("start_order", &id_of(&range["from"])),
                ],
            );
            async move { self.ctx.http.get_json(&url, &[]).await }
        }))
        .await?;

        let episodes: Vec<Value> = pages
            .into_iter()
            .flat_map(|mut page| match page.pointer_mut("/data/epg").map(Value::take) {
                Some(Value::Array(epg)) => epg,
                _ => Vec::new(),
            })
            .collect();
        Ok(parse_episodes(&album, &episodes))
    }
}

fn album_poster(album: &Value) -> Option<String> {
    let image = album["schemaAlbumImage"].as_str()?;
    Some(RE_ALBUM_IMAGE.replace(image, "https:${1}_2200_3000.webp").into_owned())
}

// Ids and page bounds arrive as either strings or numbers.
fn id_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn parse_movie(album: &Value) -> Title {
    Title::movie(
        Source::Iqiyi,
        id_of(&album["qipuId"]),
        album["name"].as_str().unwrap_or_default(),
    )
    .with_year(as_year(&album["year"]))
    .with_synopsis(album["desc"].as_str().unwrap_or_default())
    .with_poster(album_poster(album))
}

/// Episodes in order, stopping at the first preview-only entry.
pub fn parse_episodes(album: &Value, episodes: &[Value]) -> Vec<Title> {
    let (name, season) = extract_title_and_season(album["name"].as_str().unwrap_or_default());
    let synopsis = album["desc"].as_str().unwrap_or_default();
    let poster = album_poster(album);

    episodes
        .iter()
        .take_while(|ep| ep["payMarkFont"].as_str() != Some("Preview"))
        .filter_map(|ep| {
            let episode = as_u32(&ep["order"])?;
            let still = ep["albumWebpPic"].as_str().map(|pic| {
                RE_EPISODE_IMAGE
                    .replace(pic, "${1}_1920_1080.webp")
                    .replace("http:", "https:")
            });
            Some(
                Title::episode(Source::Iqiyi, id_of(&ep["qipuId"]), &name, season, episode)
                    .with_year(as_year(&album["year"]))
                    .with_synopsis(synopsis)
                    .with_poster(poster.clone())
                    .with_episode_poster(still),
            )
        })
        .collect()
}

//! Plex Media Server client.

use plexmeta_core::ItemKind;
use plexmeta_core::config::PlexConfig;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::MetadataError;
use crate::library::{FieldEdit, LibraryEntry, MediaLibrary};
use crate::services::{as_u32, as_year};

pub struct PlexClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl PlexClient {
    pub fn new(config: &PlexConfig, client: reqwest::Client) -> Result<Self, MetadataError> {
        if !config.is_configured() {
            return Err(MetadataError::Library(
                "plex baseurl and token must be set".into(),
            ));
        }
        Ok(Self {
            base_url: config.baseurl.trim().trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
            client,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, MetadataError> {
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, url = %url, "plex request");

        let resp = self
            .client
            .request(method, &url)
            .header("X-Plex-Token", &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MetadataError::Library(format!(
                "plex returned {} for {path}",
                resp.status()
            )));
        }
        Ok(resp)
    }

    async fn entries(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<LibraryEntry>, MetadataError> {
        let data: Value = self
            .request(Method::GET, path, params)
            .await?
            .json()
            .await
            .map_err(|e| MetadataError::Library(format!("parse JSON: {e}")))?;
        Ok(parse_entries(&data))
    }

    async fn children(&self, entry: &LibraryEntry) -> Result<Vec<LibraryEntry>, MetadataError> {
        let mut children = self
            .entries(&format!("/library/metadata/{}/children", entry.rating_key), &[])
            .await?;
        for child in children.iter_mut().filter(|c| c.section_id.is_none()) {
            child.section_id = entry.section_id.clone();
        }
        Ok(children)
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Entries of a `MediaContainer.Metadata` listing.
///
/// Children listings carry the section id on the container only.
pub fn parse_entries(data: &Value) -> Vec<LibraryEntry> {
    let container_section = id_string(&data["MediaContainer"]["librarySectionID"]);
    let items = data["MediaContainer"]["Metadata"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    items
        .iter()
        .filter_map(|item| {
            Some(LibraryEntry {
                rating_key: id_string(&item["ratingKey"])?,
                section_id: id_string(&item["librarySectionID"])
                    .or_else(|| container_section.clone()),
                title: item["title"].as_str().unwrap_or_default().to_string(),
                summary: item["summary"].as_str().unwrap_or_default().to_string(),
                year: as_year(&item["year"]),
                index: as_u32(&item["index"]),
            })
        })
        .collect()
}

/// Query parameters for a locked field edit.
pub fn edit_params(entry: &LibraryEntry, kind: ItemKind, edits: &[FieldEdit]) -> Vec<(String, String)> {
    let mut params = vec![
        ("type".to_string(), kind.plex_type().to_string()),
        ("id".to_string(), entry.rating_key.clone()),
    ];
    for edit in edits {
        let field = edit.field.as_str();
        params.push((format!("{field}.value"), edit.value.clone()));
        params.push((format!("{field}.locked"), "1".to_string()));
    }
    params
}

#[async_trait::async_trait]
impl MediaLibrary for PlexClient {
    async fn search(&self, kind: ItemKind, title: &str) -> Result<Vec<LibraryEntry>, MetadataError> {
        let kind_code = kind.plex_type().to_string();
        self.entries("/search", &[("query", title), ("type", &kind_code)])
            .await
    }

    async fn season(
        &self,
        show: &LibraryEntry,
        season: u32,
    ) -> Result<Option<LibraryEntry>, MetadataError> {
        Ok(self
            .children(show)
            .await?
            .into_iter()
            .find(|s| s.index == Some(season)))
    }

    async fn episode(
        &self,
        show: &LibraryEntry,
        season: u32,
        episode: u32,
    ) -> Result<Option<LibraryEntry>, MetadataError> {
        let Some(season) = self.season(show, season).await? else {
            return Ok(None);
        };
        Ok(self
            .children(&season)
            .await?
            .into_iter()
            .find(|e| e.index == Some(episode)))
    }

    async fn edit(
        &self,
        entry: &LibraryEntry,
        kind: ItemKind,
        edits: &[FieldEdit],
    ) -> Result<(), MetadataError> {
        if edits.is_empty() {
            return Ok(());
        }
        let section = entry.section_id.as_deref().ok_or_else(|| {
            MetadataError::Library(format!("{entry} has no library section"))
        })?;
        let params = edit_params(entry, kind, edits);
        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.request(Method::PUT, &format!("/library/sections/{section}/all"), &params)
            .await?;
        Ok(())
    }

    async fn upload_poster(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError> {
        self.request(
            Method::POST,
            &format!("/library/metadata/{}/posters", entry.rating_key),
            &[("url", url)],
        )
        .await?;
        Ok(())
    }

    async fn upload_art(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError> {
        self.request(
            Method::POST,
            &format!("/library/metadata/{}/arts", entry.rating_key),
            &[("url", url)],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Field;

    #[test]
    fn parse_search_listing() {
        let json = serde_json::json!({
            "MediaContainer": {
                "size": 2,
                "librarySectionID": 7,
                "Metadata": [
                    { "ratingKey": "101", "librarySectionID": 2, "title": "魔法少女", "year": 2021, "summary": "" },
                    { "ratingKey": "205", "title": "第 1 季", "index": 1, "summary": "第一季。" },
                    { "title": "no key" }
                ]
            }
        });
        let entries = parse_entries(&json);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].section_id.as_deref(), Some("2"));
        assert_eq!(entries[0].year, Some(2021));
        assert_eq!(entries[1].index, Some(1));
        assert_eq!(entries[1].section_id.as_deref(), Some("7"));
        assert_eq!(entries[1].summary, "第一季。");
        assert!(parse_entries(&serde_json::json!({ "MediaContainer": {} })).is_empty());
    }

    #[test]
    fn edits_are_locked() {
        let entry = LibraryEntry {
            rating_key: "301".into(),
            section_id: Some("2".into()),
            ..Default::default()
        };
        let params = edit_params(
            &entry,
            ItemKind::Episode,
            &[FieldEdit::new(Field::Title, "魔法覺醒"), FieldEdit::new(Field::Summary, "劇情。")],
        );
        let expected: Vec<(String, String)> = [
            ("type", "4"),
            ("id", "301"),
            ("title.value", "魔法覺醒"),
            ("title.locked", "1"),
            ("summary.value", "劇情。"),
            ("summary.locked", "1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(params, expected);
    }

    #[test]
    fn requires_configuration() {
        let config = PlexConfig::default();
        assert!(PlexClient::new(&config, reqwest::Client::new()).is_err());
    }

    #[test]
    fn entry_display() {
        let entry = LibraryEntry {
            rating_key: "1".into(),
            title: "魔法少女".into(),
            year: Some(2021),
            ..Default::default()
        };
        assert_eq!(entry.to_string(), "魔法少女 (2021) [1]");
    }
}

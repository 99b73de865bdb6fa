//! TMDB (The Movie Database) search client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::MetadataError;
use crate::services::as_year;

const BASE_URL: &str = "https://api.themoviedb.org/3";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmdbMatch {
    pub id: u64,
    pub title: String,
    pub original_title: String,
    pub original_language: Option<String>,
    pub year: Option<i32>,
}

pub struct TmdbClient {
    api_key: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, MetadataError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{BASE_URL}{path}");
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(path.to_string()));
        }

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }

    /// Search movies or TV shows by title, optionally narrowed to a year.
    pub async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        is_movie: bool,
    ) -> Result<Vec<TmdbMatch>, MetadataError> {
        let (path, year_key) = if is_movie {
            ("/search/movie", "primary_release_year")
        } else {
            ("/search/tv", "first_air_date_year")
        };
        let mut params = vec![("query", title)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push((year_key, y.as_str()));
        }

        let data = self.get_json(path, &params).await?;
        Ok(parse_search_results(&data, is_movie))
    }

    /// Other names the title is known by, most relevant first.
    ///
    /// Searches with the year, then without it when that finds nothing.
    pub async fn title_aliases(
        &self,
        title: &str,
        year: Option<i32>,
        is_movie: bool,
    ) -> Result<Vec<String>, MetadataError> {
        let mut matches = self.search(title, year, is_movie).await?;
        if matches.is_empty() && year.is_some() {
            matches = self.search(title, None, is_movie).await?;
        }
        Ok(aliases(title, &matches))
    }
}

pub fn parse_search_results(data: &Value, is_movie: bool) -> Vec<TmdbMatch> {
    let (title_key, original_key, date_key) = if is_movie {
        ("title", "original_title", "release_date")
    } else {
        ("name", "original_name", "first_air_date")
    };
    let results = data["results"].as_array().map(Vec::as_slice).unwrap_or_default();

    results
        .iter()
        .take(10)
        .filter_map(|r| {
            Some(TmdbMatch {
                id: r["id"].as_u64()?,
                title: r[title_key].as_str().unwrap_or_default().to_string(),
                original_title: r[original_key].as_str().unwrap_or_default().to_string(),
                original_language: r["original_language"].as_str().map(String::from),
                year: as_year(&r[date_key]),
            })
        })
        .collect()
}

/// Distinct non-empty names from `matches`, excluding `title` itself.
pub fn aliases(title: &str, matches: &[TmdbMatch]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in matches
        .iter()
        .flat_map(|m| [m.title.trim(), m.original_title.trim()])
    {
        if !name.is_empty() && name != title.trim() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

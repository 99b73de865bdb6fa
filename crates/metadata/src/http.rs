//! Shared HTTP client for the streaming services and image downloads.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::MetadataError;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

/// An HTML page and the cookies it set.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub body: String,
    pub cookies: HashMap<String, String>,
}

impl HttpClient {
    pub fn new(user_agent: &str, proxy: Option<&str>) -> Result<Self, MetadataError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| MetadataError::Network(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| MetadataError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, MetadataError> {
        debug!(url = %url, "GET");

        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(url.to_string()));
        }

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "{url} returned {}",
                resp.status()
            )));
        }

        Ok(resp)
    }

    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, MetadataError> {
        self.get(url, params)
            .await?
            .json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON from {url}: {e}")))
    }

    /// Fetch an HTML page, keeping the `Set-Cookie` name/value pairs.
    pub async fn get_page(&self, url: &str) -> Result<Page, MetadataError> {
        let resp = self.get(url, &[]).await?;
        let cookies = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;
        Ok(Page { body, cookies })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, MetadataError> {
        let bytes = self
            .get(url, &[])
            .await?
            .bytes()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

/// Substitute `{name}` placeholders in an endpoint template.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

/// Last path segment of a URL, without query or fragment.
pub fn url_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_placeholders() {
        assert_eq!(
            fill_template("https://api/{kind}/{id}?lang={lang}", &[("kind", "shows"), ("id", "42")]),
            "https://api/shows/42?lang={lang}"
        );
    }

    #[test]
    fn basename_ignores_query_and_trailing_slash() {
        assert_eq!(url_basename("https://www.kktv.me/titles/1000?ref=home"), "1000");
        assert_eq!(url_basename("https://a.com/movies/x/abc/"), "abc");
        assert_eq!(url_basename("https://img.com/p/poster.jpg#top"), "poster.jpg");
    }

    #[test]
    fn set_cookie_pairs() {
        assert_eq!(
            parse_set_cookie("QC005=abc123; Path=/; HttpOnly"),
            Some(("QC005".into(), "abc123".into()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
    }
}

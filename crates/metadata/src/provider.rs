use std::fmt;

use plexmeta_core::AppConfig;
use plexmeta_core::config::ServiceConfig;
use serde::{Deserialize, Serialize};

use crate::http::HttpClient;
use crate::services::{appletvplus, disneyplus, hbogoasia, iqiyi, kktv};
use crate::{MetadataError, Title};

/// A streaming service that can list the titles behind one URL.
#[async_trait::async_trait]
pub trait StreamingService: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch and parse every title (the movie, or each episode) for the URL.
    async fn get_titles(&self) -> Result<Vec<Title>, MetadataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Amazon,
    AppleTvPlus,
    DisneyPlus,
    FridayVideo,
    GooglePlay,
    HamiVideo,
    HboGoAsia,
    Iqiyi,
    Kktv,
    MyVideo,
    Netflix,
}

// Registered domains. A host matches its domain or any subdomain of it.
static DOMAINS: &[(&str, Source)] = &[
    ("amazon.com", Source::Amazon),
    ("primevideo.com", Source::Amazon),
    ("tv.apple.com", Source::AppleTvPlus),
    ("disneyplus.com", Source::DisneyPlus),
    ("video.friday.tw", Source::FridayVideo),
    ("play.google.com", Source::GooglePlay),
    ("hamivideo.hinet.net", Source::HamiVideo),
    ("hbogoasia.com", Source::HboGoAsia),
    ("hbogoasia.tw", Source::HboGoAsia),
    ("hbogoasia.hk", Source::HboGoAsia),
    ("hbogoasia.sg", Source::HboGoAsia),
    ("hbogoasia.id", Source::HboGoAsia),
    ("hbogoasia.ph", Source::HboGoAsia),
    ("iq.com", Source::Iqiyi),
    ("kktv.me", Source::Kktv),
    ("myvideo.net.tw", Source::MyVideo),
    ("netflix.com", Source::Netflix),
];

fn host_matches(host: &str, domain: &str) -> bool {
    host.strip_suffix(domain)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
}

impl Source {
    pub fn from_url(url: &str) -> Option<Self> {
        let host = reqwest::Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
        DOMAINS
            .iter()
            .find(|(domain, _)| host_matches(&host, domain))
            .map(|(_, source)| *source)
    }

    /// Key of this service under `[services]` and `[metadata.regions]`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::AppleTvPlus => "appletvplus",
            Self::DisneyPlus => "disneyplus",
            Self::FridayVideo => "friday",
            Self::GooglePlay => "googleplay",
            Self::HamiVideo => "hamivideo",
            Self::HboGoAsia => "hbogoasia",
            Self::Iqiyi => "iqiyi",
            Self::Kktv => "kktv",
            Self::MyVideo => "myvideo",
            Self::Netflix => "netflix",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a service needs besides its URL.
#[derive(Clone)]
pub struct ServiceContext {
    pub http: HttpClient,
    pub config: ServiceConfig,
    pub region: Option<String>,
    pub language: String,
}

impl ServiceContext {
    /// Resolve the service section, region and language for `source`.
    ///
    /// Region precedence: `region_override`, `[metadata.regions]`, then the
    /// service section's own `region`.
    pub fn new(
        source: Source,
        config: &AppConfig,
        http: HttpClient,
        region_override: Option<&str>,
    ) -> Result<Self, MetadataError> {
        let service = config.service(source.as_str())?.clone();
        let region = region_override
            .map(str::to_string)
            .or_else(|| config.metadata.regions.get(source.as_str()).cloned())
            .or_else(|| service.region.clone());
        let language = service
            .language
            .clone()
            .unwrap_or_else(|| config.metadata.default_language.clone());
        Ok(Self {
            http,
            config: service,
            region,
            language,
        })
    }

    pub fn endpoint(&self, name: &str) -> Result<&str, MetadataError> {
        Ok(self.config.endpoint(name)?)
    }
}

/// Build the service for `url`.
pub fn build_service(
    url: &str,
    config: &AppConfig,
    http: HttpClient,
    region_override: Option<&str>,
) -> Result<Box<dyn StreamingService>, MetadataError> {
    let source =
        Source::from_url(url).ok_or_else(|| MetadataError::Unsupported(url.to_string()))?;
    let unsupported = || MetadataError::Unsupported(format!("{source} is not supported ({url})"));
    if !matches!(
        source,
        Source::AppleTvPlus | Source::DisneyPlus | Source::HboGoAsia | Source::Iqiyi | Source::Kktv
    ) {
        return Err(unsupported());
    }

    let ctx = ServiceContext::new(source, config, http, region_override)?;
    let service: Box<dyn StreamingService> = match source {
        Source::AppleTvPlus => Box::new(appletvplus::AppleTvPlus::new(url, ctx)),
        Source::DisneyPlus => Box::new(disneyplus::DisneyPlus::new(url, ctx)),
        Source::HboGoAsia => Box::new(hbogoasia::HboGoAsia::new(url, ctx)?),
        Source::Iqiyi => Box::new(iqiyi::Iqiyi::new(url, ctx)),
        Source::Kktv => Box::new(kktv::Kktv::new(url, ctx)),
        _ => return Err(unsupported()),
    };
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_by_domain() {
        assert_eq!(Source::from_url("https://www.kktv.me/titles/1000"), Some(Source::Kktv));
        assert_eq!(
            Source::from_url("https://tv.apple.com/tw/show/ted-lasso/umc.cmc.vtoh0mn0xn7t3c643xqonfzy"),
            Some(Source::AppleTvPlus)
        );
        assert_eq!(
            Source::from_url("https://www.hbogoasia.com/zh-tw/sr12345"),
            Some(Source::HboGoAsia)
        );
        assert_eq!(Source::from_url("https://www.primevideo.com/detail/x"), Some(Source::Amazon));
        assert_eq!(Source::from_url("https://www.iq.com/album/abc"), Some(Source::Iqiyi));
        assert_eq!(Source::from_url("https://example.com/kktv.me"), None);
        assert_eq!(Source::from_url("not a url"), None);
    }

    #[test]
    fn lookalike_hosts_are_not_matched() {
        assert_eq!(Source::from_url("https://antiq.com/album/abc"), None);
        assert_eq!(Source::from_url("https://unique.com/play/x"), None);
        assert_eq!(Source::from_url("https://notkktv.me/titles/1"), None);
        assert_eq!(Source::from_url("https://iq.com/album/abc"), Some(Source::Iqiyi));
        assert!(host_matches("www.iq.com", "iq.com"));
        assert!(!host_matches("www.antiq.com", "iq.com"));
    }

    #[test]
    fn unimplemented_sources_are_rejected() {
        let config = AppConfig::builtin().unwrap();
        let http = HttpClient::new("test", None).unwrap();
        let err = build_service("https://www.netflix.com/title/80057281", &config, http.clone(), None)
            .err()
            .unwrap();
        assert!(matches!(err, MetadataError::Unsupported(_)));

        let err = build_service("https://example.com/x", &config, http, None).err().unwrap();
        assert!(matches!(err, MetadataError::Unsupported(_)));
    }

    #[test]
    fn context_region_precedence() {
        let config = AppConfig::builtin().unwrap();
        let http = HttpClient::new("test", None).unwrap();

        let ctx = ServiceContext::new(Source::DisneyPlus, &config, http.clone(), None).unwrap();
        assert_eq!(ctx.region.as_deref(), Some("TW"));
        assert_eq!(ctx.language, "zh-Hant");

        let ctx = ServiceContext::new(Source::DisneyPlus, &config, http, Some("HK")).unwrap();
        assert_eq!(ctx.region.as_deref(), Some("HK"));
    }
}

//! Application configuration.
//!
//! The built-in `config/default.toml` is parsed first and the user file is
//! deep-merged over it at the TOML table level, so a user file only has to
//! carry the keys it overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::CoreError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Default user config file name, resolved against the working directory.
pub const USER_CONFIG_FILE: &str = "user_config.toml";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub plex: PlexConfig,
    pub tmdb: TmdbConfig,
    pub metadata: MetadataConfig,
    pub directories: DirectoriesConfig,
    pub headers: HeadersConfig,
    /// Region code (e.g. `tw`) to proxy URL.
    pub proxies: BTreeMap<String, String>,
    /// Per-service endpoints and request parameters, keyed by service name.
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    pub baseurl: String,
    pub token: String,
}

impl PlexConfig {
    pub fn is_configured(&self) -> bool {
        !self.baseurl.trim().is_empty() && !self.token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: String,
}

impl TmdbConfig {
    /// The API key, if one is set.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        if key.is_empty() { None } else { Some(key) }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub default_language: String,
    /// Cut long synopses at a sentence boundary.
    pub truncate_synopsis: bool,
    /// Per-service metadata region override.
    pub regions: BTreeMap<String, String>,
}

impl MetadataConfig {
    /// Whether the preferred metadata language is Chinese.
    pub fn prefers_cjk(&self) -> bool {
        self.default_language.to_ascii_lowercase().starts_with("zh")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub downloads: PathBuf,
    pub images: PathBuf,
    pub logs: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            downloads: PathBuf::from("downloads"),
            images: PathBuf::from("images"),
            logs: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub region: Option<String>,
    pub language: Option<String>,
    /// URL templates with `{name}` placeholders.
    pub endpoints: BTreeMap<String, String>,
    /// Extra query parameters sent with every request.
    pub params: BTreeMap<String, String>,
}

impl ServiceConfig {
    pub fn endpoint(&self, name: &str) -> Result<&str, CoreError> {
        self.endpoints
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CoreError::Config(format!("missing endpoint `{name}`")))
    }
}

impl AppConfig {
    /// Built-in defaults only.
    pub fn builtin() -> Result<Self, CoreError> {
        toml::from_str(DEFAULT_CONFIG).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load the built-in defaults with the user file merged over them.
    ///
    /// An explicitly requested file must exist. Without one, the default
    /// [`USER_CONFIG_FILE`] is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut table: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| CoreError::Config(e.to_string()))?;

        let user_path = match path {
            Some(p) if !p.is_file() => {
                return Err(CoreError::Config(format!(
                    "config file {} was not found",
                    p.display()
                )));
            }
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(USER_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        match user_path {
            Some(p) => {
                let user_str = std::fs::read_to_string(&p)?;
                let user: toml::Table = toml::from_str(&user_str)
                    .map_err(|e| CoreError::Config(format!("{}: {e}", p.display())))?;
                merge_tables(&mut table, user);
                info!(path = %p.display(), "loaded user config");
            }
            None => debug!("no user config found, using built-in defaults"),
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| CoreError::Config(e.to_string()))
    }

    /// Settings for a named service.
    pub fn service(&self, name: &str) -> Result<&ServiceConfig, CoreError> {
        self.services
            .get(name)
            .ok_or_else(|| CoreError::Config(format!("no settings for service `{name}`")))
    }

    /// Resolve a `--proxy` value: a configured region code maps to its URL,
    /// anything else is taken as a proxy address.
    pub fn resolve_proxy(&self, value: &str) -> String {
        let value = value.trim();
        if let Some(url) = self.proxies.get(&value.to_ascii_lowercase()) {
            return url.clone();
        }
        if value.contains("://") {
            value.to_string()
        } else {
            format!("https://{value}")
        }
    }
}

/// Recursively merge `overlay` into `base`; overlay wins on scalar conflicts.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

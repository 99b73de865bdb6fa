mod prompt;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use plexmeta_core::AppConfig;
use plexmeta_core::episodes::parse_number_list;
use plexmeta_metadata::apply::{ApplyOptions, apply_titles};
use plexmeta_metadata::download::download_posters;
use plexmeta_metadata::http::HttpClient;
use plexmeta_metadata::plex::PlexClient;
use plexmeta_metadata::provider::build_service;
use plexmeta_metadata::tmdb::TmdbClient;
use plexmeta_metadata::{Title, TitleKind, Titles};
use plexmeta_text::ReconcileSettings;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::prompt::TerminalResolver;

#[derive(Parser, Debug)]
#[command(name = "plex-metadata", version)]
#[command(about = "Scrape streaming-service metadata and write it to a Plex library", long_about = None)]
struct Cli {
    /// Title page URL on a supported streaming service
    url: String,

    /// Title to search the Plex library with, instead of the scraped name
    #[arg(short = 't', long = "title")]
    plex_title: Option<String>,

    /// Write titles and summaries to Plex
    #[arg(short, long)]
    replace: bool,

    /// Also replace posters and background art (implies --replace)
    #[arg(long)]
    replace_poster: bool,

    /// Seasons to process, e.g. `1`, `1-3`, `2,4`, `3~`
    #[arg(short, long)]
    season: Option<String>,

    /// Episodes to process, same syntax as --season
    #[arg(short, long)]
    episode: Option<String>,

    /// Metadata region override, e.g. `TW`
    #[arg(long)]
    region: Option<String>,

    /// Save every poster under the images directory
    #[arg(long)]
    download_poster: bool,

    /// Proxy URL, or a region code from the `[proxies]` table
    #[arg(short, long)]
    proxy: Option<String>,

    /// Config file merged over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging, also written to a file under the logs directory
    #[arg(short, long)]
    debug: bool,
}

fn init_tracing(debug: bool, logs_dir: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if debug {
        EnvFilter::new("info,plex_metadata=debug,plexmeta_metadata=debug,plexmeta_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };

    let (file_layer, guard) = if debug {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("failed to create {}", logs_dir.display()))?;
        let file_name = format!(
            "plex-metadata_{}.log",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(logs_dir, file_name));
        let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Folder name for a title, with path separators and reserved characters replaced.
fn folder_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if "\\/:*?\"<>|".contains(c) { '_' } else { c })
        .collect()
}

fn log_title(title: &Title) {
    match title.kind {
        TitleKind::Movie => info!(
            name = %title.name,
            year = ?title.year,
            synopsis = title.synopsis.as_deref().unwrap_or_default(),
            "movie"
        ),
        TitleKind::Tv => info!(
            season = ?title.season,
            episode = ?title.episode,
            name = title.episode_name.as_deref().unwrap_or_default(),
            synopsis = title.episode_synopsis.as_deref().unwrap_or_default(),
            "episode"
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    let _guard = init_tracing(cli.debug, &config.directories.logs)?;
    debug!(?cli, "arguments");

    let seasons = cli
        .season
        .as_deref()
        .map(parse_number_list)
        .transpose()
        .context("invalid --season")?
        .unwrap_or_default();
    let episodes = cli
        .episode
        .as_deref()
        .map(parse_number_list)
        .transpose()
        .context("invalid --episode")?
        .unwrap_or_default();

    let proxy = cli.proxy.as_deref().map(|p| config.resolve_proxy(p));
    if let Some(proxy) = &proxy {
        info!(proxy = %proxy, "using proxy");
    }
    let http = HttpClient::new(&config.headers.user_agent, proxy.as_deref())
        .context("failed to build HTTP client")?;

    let service = build_service(&cli.url, &config, http.clone(), cli.region.as_deref())?;
    info!(source = %service.source(), url = %cli.url, "fetching titles");
    let titles = Titles::new(
        service
            .get_titles()
            .await
            .with_context(|| format!("failed to fetch titles from {}", cli.url))?,
    );
    if titles.is_empty() {
        warn!(url = %cli.url, "no titles found");
        return Ok(());
    }
    titles.log_summary();

    let wanted = titles.with_wanted(&seasons, &episodes);
    for title in &wanted {
        log_title(title);
    }

    if cli.replace || cli.replace_poster {
        let plex = PlexClient::new(&config.plex, http.inner().clone())?;
        let tmdb = config
            .tmdb
            .api_key()
            .map(|key| TmdbClient::new(key.to_string(), http.inner().clone()));
        let options = ApplyOptions {
            library_title: cli.plex_title.clone(),
            replace_poster: cli.replace_poster,
            reconcile: ReconcileSettings {
                prefer_cjk: config.metadata.prefers_cjk(),
                truncate_synopsis: config.metadata.truncate_synopsis,
            },
        };
        let report = apply_titles(&plex, &wanted, &options, &TerminalResolver::new(tmdb))
            .await
            .context("failed to update the Plex library")?;
        info!(
            shows = report.shows,
            movies = report.movies,
            seasons = report.seasons,
            episodes = report.episodes,
            skipped = report.skipped_episodes,
            "library updated"
        );
    }

    if cli.download_poster {
        let name = titles.iter().next().map(|t| t.name.as_str()).unwrap_or_default();
        let folder = config.directories.images.join(folder_name(name));
        let report = download_posters(&http, &titles.image_urls(), &folder).await?;
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "some posters could not be downloaded");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "plex-metadata",
            "https://www.kktv.me/titles/1000",
            "-t",
            "魔法少女",
            "-r",
            "-s",
            "1-2",
            "--region",
            "HK",
            "-d",
        ]);
        assert_eq!(cli.plex_title.as_deref(), Some("魔法少女"));
        assert!(cli.replace);
        assert!(!cli.replace_poster);
        assert_eq!(cli.season.as_deref(), Some("1-2"));
        assert_eq!(cli.region.as_deref(), Some("HK"));
        assert!(cli.debug);
    }

    #[test]
    fn folder_names_are_safe() {
        assert_eq!(folder_name(" Fate/Zero: 第二季 "), "Fate_Zero_ 第二季");
        assert_eq!(folder_name("魔法少女"), "魔法少女");
    }
}

//! Bounded-concurrency poster downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::MetadataError;
use crate::http::{HttpClient, url_basename};

/// Upper bound on concurrent downloads.
pub const MAX_WORKERS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    /// URLs that could not be fetched or written.
    pub failed: Vec<String>,
}

/// Local file name for an image URL: its basename with a `.png` suffix.
pub fn poster_file_name(url: &str) -> String {
    format!("{}.png", url_basename(url))
}

/// Number of download workers: available cores, capped at [`MAX_WORKERS`].
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

/// Download every URL into `folder`, which is emptied first.
///
/// A failed download is logged and reported; it does not stop the batch.
pub async fn download_posters(
    http: &HttpClient,
    urls: &[String],
    folder: &Path,
) -> Result<DownloadReport, MetadataError> {
    if folder.exists() {
        tokio::fs::remove_dir_all(folder).await?;
    }
    tokio::fs::create_dir_all(folder).await?;

    let semaphore = Arc::new(Semaphore::new(worker_count()));
    let mut tasks = JoinSet::new();

    for url in urls {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MetadataError::Provider(format!("download pool closed: {e}")))?;
        let http = http.clone();
        let url = url.clone();
        let path = folder.join(poster_file_name(&url));

        tasks.spawn(async move {
            let _permit = permit;
            let result = match http.get_bytes(&url).await {
                Ok(bytes) => tokio::fs::write(&path, bytes)
                    .await
                    .map_err(MetadataError::from),
                Err(e) => Err(e),
            };
            (url, path, result)
        });
    }

    let mut report = DownloadReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, path, Ok(()))) => report.saved.push(path),
            Ok((url, _, Err(e))) => {
                warn!(url = %url, error = %e, "poster download failed");
                report.failed.push(url);
            }
            Err(e) => warn!(error = %e, "download task panicked"),
        }
    }

    report.saved.sort();
    info!(
        folder = %folder.display(),
        saved = report.saved.len(),
        failed = report.failed.len(),
        "posters downloaded"
    );
    Ok(report)
}

use crate::extract::strip_query;
use crate::http::RetryingClient;
use crate::types::{CloudTaskError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Creates the directory (and parents) if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|source| CloudTaskError::File {
            path: dir.to_path_buf(),
            source,
        })?;
        info!("Directory created: {}", dir.display());
    }
    Ok(())
}

/// Wall-clock timestamped filename, e.g. `front_view_20250506_143025.jpg`.
/// Best-effort uniqueness only; two artifacts within the same second collide.
pub fn stamped_filename(prefix: &str, ext: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, ext)
}

/// Downloads `url` into `dest`. If the first attempt fails and the URL
/// carries a query string, retries once with the query stripped — some CDN
/// endpoints reject over-long signed URLs.
pub async fn fetch_to_file(client: &RetryingClient, url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    let bytes = match client.get_bytes(url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let simplified = strip_query(url);
            if simplified == url {
                return Err(e);
            }
            warn!("Download failed ({}), retrying with simplified URL", e);
            client.get_bytes(simplified).await?
        }
    };

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|source| CloudTaskError::File {
            path: dest.to_path_buf(),
            source,
        })?;
    info!("Saved {} bytes to {}", bytes.len(), dest.display());
    Ok(())
}

/// Lists files in `dir` whose extension (case-insensitive) is in `extensions`,
/// sorted by name. Used for the reuse-cached-artifact prompts.
pub fn list_files_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|source| CloudTaskError::File {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry
            .map_err(|source| CloudTaskError::File {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                extensions.iter().any(|wanted| *wanted == lower)
            })
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

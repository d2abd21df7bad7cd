use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::error::SubsetError;

/// Extension given to renamed downloads that have none.
pub(crate) const DEFAULT_EXTENSION: &str = "nc4";

pub(crate) fn backoff(current: Duration, max: Duration) -> Duration {
    let next = Duration::from_secs_f64(current.as_secs_f64() * 1.5);
    if next > max { max } else { next }
}

pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().and_then(|s| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    })
}

/// Human-readable granule name: the last path segment, ignoring query
/// parameters and trailing slashes.
pub(crate) fn granule_name(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

pub(crate) fn absolute_variable_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Moves a downloaded file to a fresh random name in `output_dir`, keeping its
/// extension.
pub(crate) fn move_to_unique_name(output_dir: &Path, downloaded: &Path) -> Result<PathBuf, SubsetError> {
    let extension = downloaded
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);

    let target = output_dir.join(format!("{}.{}", Uuid::new_v4().simple(), extension));

    std::fs::rename(downloaded, &target).map_err(|source| SubsetError::Io {
        path: downloaded.to_path_buf(),
        source,
    })?;

    Ok(target)
}

//! Post-delivery cleanup.
//!
//! Removes the files that were actually delivered and then the staging
//! directory, but only once it is empty. Files that failed to deliver are
//! intentionally left on disk for inspection or a retry. Every failure
//! here is logged and swallowed; cleanup is never surfaced to the user.

use std::path::{Path, PathBuf};

use tracing::{error, info};

/// Removes every successfully delivered file.
pub async fn remove_delivered(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "removed delivered file"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to remove delivered file"),
        }
    }
}

/// Removes the staging directory if it exists and is now empty.
///
/// Directory-not-empty and already-removed are both fine.
pub async fn remove_staging_if_empty(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return, // already gone
    };
    match entries.next_entry().await {
        Ok(Some(_)) => {
            info!(dir = %dir.display(), "staging directory not empty, leaving in place");
        }
        Ok(None) => match tokio::fs::remove_dir(dir).await {
            Ok(()) => info!(dir = %dir.display(), "removed empty staging directory"),
            Err(e) => error!(dir = %dir.display(), error = %e, "failed to remove staging directory"),
        },
        Err(e) => error!(dir = %dir.display(), error = %e, "failed to inspect staging directory"),
    }
}

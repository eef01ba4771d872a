//! Ephemeral-content aggregation.
//!
//! Lists the currently available stories for an account, filters by a
//! specific identifier when one was requested, deduplicates against the
//! client returning the same item twice, downloads each item with a
//! fallback to the client's built-in method, and returns the surviving
//! assets sorted ascending by capture time.

use std::collections::HashSet;
use std::path::Path;

use tracing::{error, info, warn};

use crate::client::{ClientError, ContentClient, MediaKind, StoryItem};
use crate::fetch::Fetcher;
use crate::media::{AssetBatch, MediaAsset, retain_valid, sort_chronological};

/// Deterministic filename for one story item.
///
/// Derived from handle, capture timestamp, and identifier so repeated
/// runs hit the same path and can skip re-downloads.
#[must_use]
pub fn story_file_name(handle: &str, item: &StoryItem) -> String {
    format!(
        "story_{handle}_{}_{}.{}",
        item.taken_at.format("%Y%m%d_%H%M%S"),
        item.id,
        item.kind().extension()
    )
}

/// Collects the available stories for `handle` into a validated batch.
///
/// An empty result is a "not found" outcome, not an error. When
/// `story_id` is given, only the matching item is processed.
///
/// # Errors
///
/// Returns [`ClientError`] when the user id or story list cannot be
/// fetched; [`ClientError::LoginRequired`] signals that a re-login retry
/// applies.
pub async fn collect_stories(
    client: &dyn ContentClient,
    fetcher: &Fetcher,
    handle: &str,
    story_id: Option<&str>,
    staging: &Path,
) -> Result<AssetBatch, ClientError> {
    let user_id = client.user_id_from_handle(handle).await?;
    let stories = client.list_stories(user_id).await?;

    if stories.is_empty() {
        info!(handle, "no stories currently available");
        return Ok(Vec::new());
    }
    info!(handle, count = stories.len(), "found stories");

    let mut processed: HashSet<String> = HashSet::new();
    let mut batch: AssetBatch = Vec::new();

    for item in &stories {
        if story_id.is_some_and(|wanted| wanted != item.id) {
            continue;
        }
        if !processed.insert(item.id.clone()) {
            info!(story = %item.id, "story already processed, skipping duplicate");
            continue;
        }

        let file_name = story_file_name(handle, item);
        let dest = staging.join(&file_name);
        if dest.exists() {
            info!(file = %file_name, "file already exists, skipping");
            continue;
        }

        let direct_url = match item.kind() {
            MediaKind::Video => item.video_url.as_deref(),
            MediaKind::Image => item.image_url.as_deref(),
        };

        let fetched = match direct_url {
            Some(url) => fetcher
                .fetch_to_path(url, &dest, item.kind())
                .await
                .map_err(|e| e.to_string()),
            None => Err("no direct URL on story item".to_string()),
        };

        match fetched {
            Ok(()) => {
                info!(story = %item.id, file = %file_name, "downloaded story");
                batch.push(
                    MediaAsset::new(dest, item.kind(), handle).with_captured_at(item.taken_at),
                );
            }
            Err(e) => {
                error!(story = %item.id, error = %e, "story fetch failed, trying backup download");
                // The backup destination is recomputed from the current
                // item; a name from a previous iteration is never reused.
                match client.story_download(&item.id, staging).await {
                    Ok(downloaded) => {
                        let final_path = if downloaded == dest {
                            dest.clone()
                        } else {
                            match tokio::fs::rename(&downloaded, &dest).await {
                                Ok(()) => dest.clone(),
                                Err(rename_err) => {
                                    warn!(error = %rename_err, "could not move backup story, keeping client path");
                                    downloaded
                                }
                            }
                        };
                        info!(story = %item.id, "downloaded backup story");
                        batch.push(
                            MediaAsset::new(final_path, item.kind(), handle)
                                .with_captured_at(item.taken_at),
                        );
                    }
                    Err(ClientError::LoginRequired) => return Err(ClientError::LoginRequired),
                    Err(backup_err) => {
                        error!(story = %item.id, error = %backup_err, "backup story download failed");
                    }
                }
            }
        }
    }

    sort_chronological(&mut batch);
    Ok(retain_valid(batch).await)
}

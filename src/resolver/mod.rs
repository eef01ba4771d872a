//! Media resolution for posts and reels.
//!
//! Given a shortcode, resolution asks the content client for metadata and
//! turns it into a validated [`AssetBatch`]: photos delegate to the
//! client's own download method, videos pick the highest-width rendition
//! with an explicit fallback chain, and albums enumerate through the
//! client with a best-effort quality upgrade for each video item.
//!
//! `LoginRequired` from the client bubbles out of every step so the
//! caller can re-authenticate and retry the whole resolution once.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, info, warn};

use crate::client::{ClientError, ContentClient, DeclaredType, MediaKind, Rendition};
use crate::fetch::Fetcher;
use crate::media::{AssetBatch, MediaAsset, NO_CAPTION, PostSummary, retain_valid};

/// Matches hashtag tokens for caption normalization.
#[allow(clippy::expect_used)]
static HASHTAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("hashtag regex is valid"));

/// Normalizes a caption: strips hashtag tokens, trims whitespace, and
/// substitutes a fixed placeholder when the caption is absent or empty.
#[must_use]
pub fn normalize_caption(caption: Option<&str>) -> String {
    let raw = match caption {
        Some(text) if !text.is_empty() => text,
        _ => return NO_CAPTION.to_string(),
    };
    let stripped = HASHTAG_PATTERN.replace_all(raw, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        NO_CAPTION.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Selects the highest-width rendition.
///
/// The resources list wins when it yields any candidate; only then is the
/// video-versions list consulted. Returns `None` when neither list has a
/// usable entry, in which case the caller falls back to the default URL.
#[must_use]
pub fn best_rendition<'a>(
    resources: &'a [Rendition],
    video_versions: &'a [Rendition],
) -> Option<&'a Rendition> {
    resources
        .iter()
        .max_by_key(|r| r.width)
        .or_else(|| video_versions.iter().max_by_key(|r| r.width))
}

/// Resolves a post/reel shortcode into a validated asset batch.
///
/// The post summary is attached to the first asset of the batch only.
/// Per-asset fetch failures drop the asset and continue; an empty batch
/// is the caller's terminal "not found" outcome.
///
/// # Errors
///
/// Returns [`ClientError`] when metadata cannot be fetched; in particular
/// [`ClientError::LoginRequired`] signals that a re-login retry applies.
pub async fn resolve_post(
    client: &dyn ContentClient,
    fetcher: &Fetcher,
    shortcode: &str,
    staging: &Path,
) -> Result<AssetBatch, ClientError> {
    let key = client.media_key_from_code(shortcode)?;
    let info = client.media_info(key).await?;
    let summary = PostSummary {
        caption: normalize_caption(info.caption_text.as_deref()),
        owner: info.owner.clone(),
        posted_at: info.taken_at,
    };

    let batch = match info.declared {
        DeclaredType::Photo => {
            let path = client.photo_download(key, staging).await?;
            vec![MediaAsset::new(path, MediaKind::Image, &info.owner)]
        }
        DeclaredType::Video => resolve_video(client, fetcher, shortcode, staging, key, &info).await?,
        DeclaredType::Album => resolve_album(client, fetcher, staging, key, &info).await?,
    };

    info!(
        shortcode,
        files = batch.len(),
        "downloaded files for reference"
    );

    let mut valid = retain_valid(batch).await;
    if let Some(first) = valid.first_mut() {
        first.summary = Some(summary);
    }
    Ok(valid)
}

/// Downloads a single video with the quality-fallback chain.
///
/// Strategies in order: chosen rendition via direct HTTP, default video
/// URL via direct HTTP, then the client's built-in download method.
async fn resolve_video(
    client: &dyn ContentClient,
    fetcher: &Fetcher,
    shortcode: &str,
    staging: &Path,
    key: crate::client::MediaKey,
    info: &crate::client::MediaInfo,
) -> Result<AssetBatch, ClientError> {
    let dest = staging.join(format!("{shortcode}.mp4"));

    let chosen = best_rendition(&info.resources, &info.video_versions);
    let (direct_url, quality_label) = match chosen {
        Some(rendition) => (
            Some(rendition.url.as_str()),
            (rendition.width > 0).then(|| format!("{}p", rendition.width)),
        ),
        None => (info.video_url.as_deref(), None),
    };

    if let Some(url) = direct_url {
        match fetcher.fetch_to_path(url, &dest, MediaKind::Video).await {
            Ok(()) => {
                if let Some(label) = &quality_label {
                    info!(quality = %label, path = %dest.display(), "downloaded high-quality video");
                }
                let mut asset = MediaAsset::new(dest, MediaKind::Video, &info.owner);
                if let Some(label) = quality_label {
                    asset = asset.with_quality_label(label);
                }
                return Ok(vec![asset]);
            }
            Err(e) => error!(error = %e, "high-quality video fetch failed"),
        }
    } else {
        error!(shortcode, "no video URL candidate found");
    }

    // Best-effort backup through the client's own download method. The
    // destination name is recomputed here, never reused across attempts.
    match client.video_download(key, staging).await {
        Ok(downloaded) => {
            if downloaded != dest {
                if let Err(e) = tokio::fs::rename(&downloaded, &dest).await {
                    error!(error = %e, "could not move backup video into place");
                    return Ok(Vec::new());
                }
            }
            info!(path = %dest.display(), "downloaded backup video");
            Ok(vec![MediaAsset::new(dest, MediaKind::Video, &info.owner)])
        }
        Err(ClientError::LoginRequired) => Err(ClientError::LoginRequired),
        Err(e) => {
            error!(error = %e, shortcode, "backup video download failed");
            Ok(Vec::new())
        }
    }
}

/// Downloads every album item, upgrading videos best-effort.
async fn resolve_album(
    client: &dyn ContentClient,
    fetcher: &Fetcher,
    staging: &Path,
    key: crate::client::MediaKey,
    info: &crate::client::MediaInfo,
) -> Result<AssetBatch, ClientError> {
    let files = client.album_download(key, staging).await?;

    let mut batch = Vec::with_capacity(files.len());
    for path in files {
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));

        if is_video {
            upgrade_album_video(fetcher, &path, info.video_url.as_deref()).await;
            batch.push(MediaAsset::new(path, MediaKind::Video, &info.owner));
        } else {
            batch.push(MediaAsset::new(path, MediaKind::Image, &info.owner));
        }
    }
    Ok(batch)
}

/// Re-fetches the top-level video URL over an album video, best-effort.
///
/// The replacement is staged next to the original and only moved into
/// place on success, so a failed upgrade leaves the downloaded file
/// standing.
async fn upgrade_album_video(fetcher: &Fetcher, path: &Path, video_url: Option<&str>) {
    let Some(url) = video_url else {
        return;
    };
    let upgrade_path = path.with_extension("mp4.upgrade");
    match fetcher
        .fetch_to_path(url, &upgrade_path, MediaKind::Video)
        .await
    {
        Ok(()) => match tokio::fs::rename(&upgrade_path, path).await {
            Ok(()) => info!(path = %path.display(), "re-downloaded album video in high quality"),
            Err(e) => {
                warn!(error = %e, "could not move upgraded album video into place");
                let _ = tokio::fs::remove_file(&upgrade_path).await;
            }
        },
        Err(e) => {
            warn!(error = %e, path = %path.display(), "album video upgrade failed, keeping original");
            let _ = tokio::fs::remove_file(&upgrade_path).await;
        }
    }
}

//! Media asset data model and batch helpers.
//!
//! A [`MediaAsset`] exists once its bytes are on disk. Batches keep the
//! order the rest of the pipeline relies on: chronological for stories,
//! API order for posts. Validation enforces the delivery invariant — no
//! asset leaves the pipeline unless its file exists with size > 0 at the
//! time it is checked.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::client::MediaKind;

/// Fixed placeholder when a post has no caption.
pub const NO_CAPTION: &str = "No caption";

/// Post summary attached to the first asset of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    /// Normalized caption (hashtags stripped, placeholder when absent).
    pub caption: String,
    /// Account handle of the content owner.
    pub owner: String,
    /// When the content was posted.
    pub posted_at: DateTime<Utc>,
}

impl PostSummary {
    /// Renders the summary message shown above the delivered files.
    #[must_use]
    pub fn message_text(&self) -> String {
        format!(
            "📝 Caption: {}\n\n👤 Posted by: @{}\n🕒 Posted at: {}",
            self.caption,
            self.owner,
            self.posted_at.format("%H:%M %d/%m/%Y")
        )
    }

    /// Profile URL for the owner, used for the inline keyboard button.
    #[must_use]
    pub fn owner_profile_url(&self) -> String {
        format!("https://instagram.com/{}", self.owner)
    }
}

/// One downloaded media file, ready for validation and delivery.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// Where the bytes live on disk.
    pub local_path: PathBuf,
    /// Image or video.
    pub kind: MediaKind,
    /// Account handle of the content owner.
    pub owner: String,
    /// Capture timestamp (stories only).
    pub captured_at: Option<DateTime<Utc>>,
    /// Quality label recorded when a rendition was chosen (e.g. "720p").
    pub quality_label: Option<String>,
    /// Post summary, present on the first asset of a post batch only.
    pub summary: Option<PostSummary>,
}

impl MediaAsset {
    /// Creates an asset with no summary or quality label.
    #[must_use]
    pub fn new(local_path: PathBuf, kind: MediaKind, owner: impl Into<String>) -> Self {
        Self {
            local_path,
            kind,
            owner: owner.into(),
            captured_at: None,
            quality_label: None,
            summary: None,
        }
    }

    /// Attaches a capture timestamp.
    #[must_use]
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// Attaches a quality label.
    #[must_use]
    pub fn with_quality_label(mut self, label: impl Into<String>) -> Self {
        self.quality_label = Some(label.into());
        self
    }
}

/// Ordered sequence of assets belonging to one content reference.
pub type AssetBatch = Vec<MediaAsset>;

/// Sorts a batch ascending by capture timestamp.
///
/// The sort is stable, so assets without a timestamp (and assets sharing
/// one) keep their relative order; re-sorting a sorted batch is a no-op.
pub fn sort_chronological(batch: &mut AssetBatch) {
    batch.sort_by_key(|asset| asset.captured_at);
}

/// Drops every asset whose file is missing or empty on disk.
///
/// Files may vanish between fetch and validation due to concurrent
/// external interference; that is a validation failure, not a crash.
pub async fn retain_valid(batch: AssetBatch) -> AssetBatch {
    let mut valid = Vec::with_capacity(batch.len());
    for asset in batch {
        match tokio::fs::metadata(&asset.local_path).await {
            Ok(meta) if meta.len() > 0 => {
                debug!(path = %asset.local_path.display(), "verified file");
                valid.push(asset);
            }
            Ok(_) => {
                error!(path = %asset.local_path.display(), "empty file, dropping asset");
            }
            Err(e) => {
                error!(path = %asset.local_path.display(), error = %e, "missing file, dropping asset");
            }
        }
    }
    valid
}

//! Delivery formatting and dispatch.
//!
//! Maps each validated asset to a document upload: filenames get a
//! 1-based index suffix only in multi-asset batches, captions carry the
//! media-kind label plus index/total, and story captions append a
//! relative-age line. Delivery failures for one asset never abort the
//! remaining deliveries.

mod sink;
mod telegram;

pub use sink::{
    Button, ButtonAction, ChatRef, DeliverySink, Keyboard, MessageRef, OutboundDocument, SinkError,
};
pub use telegram::TelegramSink;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::client::MediaKind;
use crate::media::AssetBatch;

/// Per-kind success counters for one delivery run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub videos: usize,
    pub images: usize,
}

impl DeliveryStats {
    /// Total number of delivered assets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.videos + self.images
    }

    /// True when nothing was delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Renders the per-kind status lines of the final message.
    #[must_use]
    pub fn status_lines(&self) -> String {
        let mut lines = Vec::new();
        if self.videos > 0 {
            lines.push(format!("👉 {} video(s)", self.videos));
        }
        if self.images > 0 {
            lines.push(format!("👉 {} image(s)", self.images));
        }
        lines.join("\n")
    }
}

/// Derives the delivery filename for one asset.
///
/// Single-asset batches use a bare name; multi-asset batches append a
/// 1-based index.
#[must_use]
pub fn document_filename(base: &str, kind: MediaKind, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{base}_{}.{}", index + 1, kind.extension())
    } else {
        format!("{base}.{}", kind.extension())
    }
}

/// Derives the caption for one asset.
///
/// Stories additionally carry a relative-age line computed from the
/// capture timestamp.
#[must_use]
pub fn document_caption(
    kind: MediaKind,
    index: usize,
    total: usize,
    captured_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let mut caption = if total > 1 {
        format!("{} {}/{total}", kind.label(), index + 1)
    } else {
        kind.label().to_string()
    };
    if let Some(captured) = captured_at {
        caption.push_str(&format!("\n🕒 {}", relative_age(captured, now)));
    }
    caption
}

/// Renders "Just now" / "1H ago" / "NH ago", whole hours rounded down.
#[must_use]
pub fn relative_age(captured_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = now
        .signed_duration_since(captured_at)
        .num_hours()
        .max(0);
    match hours {
        0 => "Just now".to_string(),
        1 => "1H ago".to_string(),
        n => format!("{n}H ago"),
    }
}

/// Sends every asset of a batch through the sink, in order.
///
/// The invariant is re-checked at delivery time: an asset whose file has
/// vanished or shrunk to zero bytes since validation is skipped. Returns
/// the per-kind counters and the paths that were actually delivered (for
/// cleanup); failed deliveries stay on disk.
pub async fn deliver_batch(
    sink: &dyn DeliverySink,
    chat: ChatRef,
    batch: &AssetBatch,
    base_name: &str,
    now: DateTime<Utc>,
) -> (DeliveryStats, Vec<PathBuf>) {
    let mut stats = DeliveryStats::default();
    let mut delivered = Vec::new();
    let total = batch.len();

    for (index, asset) in batch.iter().enumerate() {
        info!(
            index = index + 1,
            total,
            path = %asset.local_path.display(),
            "sending file"
        );

        match tokio::fs::metadata(&asset.local_path).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                error!(path = %asset.local_path.display(), "file is empty at delivery time, skipping");
                continue;
            }
            Err(e) => {
                error!(path = %asset.local_path.display(), error = %e, "file missing at delivery time, skipping");
                continue;
            }
        }

        let document = OutboundDocument {
            path: asset.local_path.clone(),
            filename: document_filename(base_name, asset.kind, index, total),
            caption: document_caption(asset.kind, index, total, asset.captured_at, now),
            kind: asset.kind,
        };

        match sink.send_document(chat, &document).await {
            Ok(()) => {
                match asset.kind {
                    MediaKind::Video => stats.videos += 1,
                    MediaKind::Image => stats.images += 1,
                }
                delivered.push(asset.local_path.clone());
                info!(index = index + 1, "sent file");
            }
            Err(e) => {
                error!(path = %asset.local_path.display(), error = %e, "failed to send file");
            }
        }
    }

    (stats, delivered)
}

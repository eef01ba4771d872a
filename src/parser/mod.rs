//! Classification of incoming text into content references.
//!
//! Incoming chat messages are free text. This module matches them against
//! the fixed Instagram link shape, extracts the content identifier (and an
//! optional secondary identifier), and classifies the link as a post, reel,
//! or story. Anything that does not match is rejected with a user-facing
//! error rather than a crash.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Regex pattern for Instagram content links.
///
/// Captures the path marker (`p`, `reel`, `stories`, `s`), the primary
/// identifier, and an optional secondary identifier. Matching is anchored
/// to the start of the (trimmed) input, mirroring how users paste links.
#[allow(clippy::expect_used)]
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?instagram\.com/(p|reel|stories|s)/([^/?#]+)(?:/([^/?#]+))?")
        .expect("link regex is valid") // Static pattern, safe to panic
});

/// Errors produced while classifying incoming text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not a recognized Instagram content link.
    #[error("not a recognized Instagram link: {input}")]
    InvalidUrl {
        /// The rejected input (truncated for display).
        input: String,
    },
}

impl ParseError {
    /// Creates an invalid-URL error, truncating very long inputs.
    pub fn invalid_url(input: &str) -> Self {
        let mut shown: String = input.chars().take(120).collect();
        if shown.len() < input.len() {
            shown.push('…');
        }
        Self::InvalidUrl { input: shown }
    }
}

/// What kind of content a link points at.
///
/// Posts and reels share the same fetch logic; the distinction only matters
/// for display text. Stories follow a separate aggregation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Reel,
    Story,
}

/// A classified content link.
///
/// For posts and reels `primary_id` is the shortcode. For stories it is the
/// account handle and `secondary_id` is a specific story identifier, or
/// `None` meaning "all currently available".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    pub kind: ContentKind,
    pub primary_id: String,
    pub secondary_id: Option<String>,
}

impl ContentReference {
    /// Returns true for story references.
    #[must_use]
    pub fn is_story(&self) -> bool {
        self.kind == ContentKind::Story
    }

    /// Name of the staging subdirectory for this reference.
    ///
    /// Derived deterministically from the identifiers so repeated requests
    /// land in the same directory.
    #[must_use]
    pub fn staging_dir_name(&self) -> String {
        match self.kind {
            ContentKind::Story => format!("stories_{}", self.primary_id),
            ContentKind::Post | ContentKind::Reel => self.primary_id.clone(),
        }
    }

    /// Base name used when deriving delivery filenames.
    #[must_use]
    pub fn base_file_name(&self) -> &str {
        match self.kind {
            ContentKind::Story => "story",
            ContentKind::Post | ContentKind::Reel => &self.primary_id,
        }
    }

    /// User-facing label for the final status message.
    #[must_use]
    pub fn display_label(&self) -> &'static str {
        match self.kind {
            ContentKind::Post => "post 📑",
            ContentKind::Reel => "reel 📱",
            ContentKind::Story => "story",
        }
    }
}

/// Classifies a free-text message as an Instagram content reference.
///
/// # Errors
///
/// Returns [`ParseError::InvalidUrl`] when the text does not match the
/// link pattern. Callers surface this as a rejection message, not a crash.
pub fn classify(input: &str) -> Result<ContentReference, ParseError> {
    let trimmed = input.trim();
    let captures = LINK_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ParseError::invalid_url(trimmed))?;

    let marker = captures.get(1).map_or("", |m| m.as_str());
    let primary_id = captures.get(2).map_or("", |m| m.as_str()).to_string();
    let secondary_id = captures.get(3).map(|m| m.as_str().to_string());

    let kind = match marker {
        "stories" | "s" => ContentKind::Story,
        "reel" => ContentKind::Reel,
        _ => ContentKind::Post,
    };

    debug!(?kind, primary = %primary_id, secondary = ?secondary_id, "classified link");

    Ok(ContentReference {
        kind,
        primary_id,
        secondary_id,
    })
}

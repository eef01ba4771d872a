//! Content-platform capability surface.
//!
//! The hard work of talking to Instagram's private API — authentication,
//! session persistence, the media graph, binary retrieval — sits behind the
//! [`ContentClient`] trait. The pipeline only consumes this surface; tests
//! substitute a stub, and production wires in [`GraphClient`].
//!
//! # Object Safety
//!
//! The trait uses `async_trait` to support dynamic dispatch via
//! `Arc<dyn ContentClient>`. Rust 2024 native async traits are not
//! object-safe, so `async_trait` is required for this seam.

mod graph;
mod shortcode;

pub use graph::GraphClient;
pub use shortcode::media_key_from_shortcode;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque internal media key, resolved from a shortcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaKey(pub u64);

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a binary asset on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// File extension for this kind.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }

    /// Capitalized label used in delivery captions.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }
}

/// Media type as declared by the platform (Photo=1, Video=2, Album=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Photo,
    Video,
    Album,
}

impl DeclaredType {
    /// Maps the platform's numeric type code, if recognized.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Photo),
            2 => Some(Self::Video),
            8 => Some(Self::Album),
            _ => None,
        }
    }

    /// The asset kind produced by this declared type (albums mix both).
    #[must_use]
    pub fn asset_kind(self) -> MediaKind {
        match self {
            Self::Video => MediaKind::Video,
            Self::Photo | Self::Album => MediaKind::Image,
        }
    }
}

/// One available quality/resolution variant of a video asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub url: String,
    pub width: u32,
}

/// Media metadata for one post, reel, or album.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Account handle of the content owner.
    pub owner: String,
    /// Raw caption text, if the post has one.
    pub caption_text: Option<String>,
    /// When the content was captured/posted.
    pub taken_at: DateTime<Utc>,
    /// Declared media type.
    pub declared: DeclaredType,
    /// Default video URL (lowest-effort fallback for videos).
    pub video_url: Option<String>,
    /// Candidate renditions from the resources list, when present.
    pub resources: Vec<Rendition>,
    /// Candidate renditions from the video-versions list.
    pub video_versions: Vec<Rendition>,
}

/// One currently-available ephemeral item for an account.
#[derive(Debug, Clone)]
pub struct StoryItem {
    /// Platform-assigned story identifier.
    pub id: String,
    /// Capture timestamp.
    pub taken_at: DateTime<Utc>,
    /// Declared media type (photo or video for stories).
    pub declared: DeclaredType,
    /// Direct video URL for video stories.
    pub video_url: Option<String>,
    /// Highest-quality image URL for photo stories.
    pub image_url: Option<String>,
}

impl StoryItem {
    /// The asset kind this story item produces.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.declared.asset_kind()
    }
}

/// Errors produced by content-platform clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session is invalid or expired; a re-login is required.
    #[error("login required")]
    LoginRequired,

    /// Network-level error talking to the platform.
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// The endpoint that failed.
        endpoint: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The platform returned an error status.
    #[error("API returned HTTP {status} for {endpoint}")]
    Api {
        /// The endpoint that returned the status.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response from {endpoint}: {detail}")]
    Shape {
        /// The endpoint whose response could not be interpreted.
        endpoint: String,
        /// What was missing or malformed.
        detail: String,
    },

    /// A shortcode could not be decoded into a media key.
    #[error("invalid shortcode: {code}")]
    BadShortcode {
        /// The offending shortcode.
        code: String,
    },

    /// Filesystem error while writing downloaded bytes or session state.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The session file exists but could not be used.
    #[error("session file {path} could not be used: {detail}")]
    Session {
        /// The session file path.
        path: PathBuf,
        /// Why it was rejected.
        detail: String,
    },
}

impl ClientError {
    /// Creates a network error for an endpoint.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates an API status error.
    pub fn api(endpoint: impl Into<String>, status: u16) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a response-shape error.
    pub fn shape(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Shape {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The capability surface consumed by the pipeline.
///
/// Mirrors the external client library the bot delegates to: session
/// management, metadata lookups, and built-in download methods that write
/// directly into a staging directory.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Authenticates with username/password and establishes a session.
    async fn login(&self, username: &str, password: &str) -> Result<(), ClientError>;

    /// Restores a previously saved session from disk.
    async fn load_session(&self, path: &Path) -> Result<(), ClientError>;

    /// Persists the current session to disk.
    async fn save_session(&self, path: &Path) -> Result<(), ClientError>;

    /// Resolves a shortcode into the opaque internal media key.
    fn media_key_from_code(&self, code: &str) -> Result<MediaKey, ClientError>;

    /// Fetches media metadata for a key.
    async fn media_info(&self, key: MediaKey) -> Result<MediaInfo, ClientError>;

    /// Downloads the photo for a key into `dir`, returning the file path.
    async fn photo_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError>;

    /// Downloads the video for a key into `dir` (built-in quality).
    async fn video_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError>;

    /// Downloads every item of an album into `dir`, in API order.
    async fn album_download(&self, key: MediaKey, dir: &Path) -> Result<Vec<PathBuf>, ClientError>;

    /// Resolves an account handle into the internal user id.
    async fn user_id_from_handle(&self, handle: &str) -> Result<u64, ClientError>;

    /// Lists all currently available ephemeral items for a user.
    async fn list_stories(&self, user_id: u64) -> Result<Vec<StoryItem>, ClientError>;

    /// Downloads one story item into `dir` (built-in quality).
    async fn story_download(&self, story_id: &str, dir: &Path) -> Result<PathBuf, ClientError>;
}

//! Streaming HTTP fetcher writing resolved media URLs to staging storage.
//!
//! The fetcher performs a plain GET and streams the body to disk in
//! chunks. Any non-success status is a fetch failure, and a zero-byte
//! result is never left behind as a valid file. Individual fetch failures
//! are non-fatal to a batch; callers drop the asset and continue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::client::MediaKind;

/// Connect timeout for media fetches.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout for image fetches.
pub const IMAGE_TIMEOUT_SECS: u64 = 30;

/// Total timeout for video fetches. Videos are larger, so the window is
/// wider; worst-case duration is bounded by this alone.
pub const VIDEO_TIMEOUT_SECS: u64 = 120;

/// Errors that can occur while fetching a media URL to disk.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Filesystem error while writing the body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The body was empty; the partial file has been removed.
    #[error("empty body fetching {url}")]
    EmptyBody {
        /// The URL that produced no bytes.
        url: String,
    },
}

impl FetchError {
    fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// HTTP fetcher for media binaries.
///
/// Created once and reused across requests to share the connection pool.
/// The per-request timeout is chosen from the media kind.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Creates a new fetcher with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches `url` into `dest`, streaming the body in chunks.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, non-success status,
    /// write failure, or an empty body. On any error the partial file is
    /// removed, so a zero-byte file is never registered as a valid asset.
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<(), FetchError> {
        let timeout = match kind {
            MediaKind::Image => Duration::from_secs(IMAGE_TIMEOUT_SECS),
            MediaKind::Video => Duration::from_secs(VIDEO_TIMEOUT_SECS),
        };

        debug!("starting fetch");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let result = stream_to_file(file, response, url, dest).await;

        match result {
            Ok(0) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(FetchError::EmptyBody {
                    url: url.to_string(),
                })
            }
            Ok(bytes) => {
                info!(bytes, "fetch complete");
                Ok(())
            }
            Err(e) => {
                debug!(path = %dest.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

/// Streams the response body to the file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    dest: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| FetchError::io(dest, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_writes_body_to_dest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video bytes"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("clip.mp4");
        let fetcher = Fetcher::new();
        let url = format!("{}/clip.mp4", server.uri());

        fetcher
            .fetch_to_path(&url, &dest, MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("gone.jpg");
        let fetcher = Fetcher::new();
        let url = format!("{}/gone.jpg", server.uri());

        let result = fetcher.fetch_to_path(&url, &dest, MediaKind::Image).await;
        match result {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected HttpStatus, got: {other:?}"),
        }
        assert!(!dest.exists(), "no file should be created on 404");
    }

    #[tokio::test]
    async fn test_fetch_empty_body_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b""))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("empty.jpg");
        let fetcher = Fetcher::new();
        let url = format!("{}/empty.jpg", server.uri());

        let result = fetcher.fetch_to_path(&url, &dest, MediaKind::Image).await;
        assert!(matches!(result, Err(FetchError::EmptyBody { .. })));
        assert!(
            !dest.exists(),
            "zero-byte file must not be left registered as an asset"
        );
    }

    #[tokio::test]
    async fn test_fetch_large_body_streams() {
        let server = MockServer::start().await;
        let body = vec![7u8; 1024 * 1024];
        Mock::given(method("GET"))
            .and(path("/large.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("large.mp4");
        let fetcher = Fetcher::new();
        let url = format!("{}/large.mp4", server.uri());

        fetcher
            .fetch_to_path(&url, &dest, MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), body.len() as u64);
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        // Unroutable port: connection refused maps to a network error.
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("never.jpg");
        let fetcher = Fetcher::new();

        let result = fetcher
            .fetch_to_path("http://127.0.0.1:9/never.jpg", &dest, MediaKind::Image)
            .await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
        assert!(!dest.exists());
    }
}

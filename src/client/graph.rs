//! Default [`ContentClient`] backend over Instagram's private web API.
//!
//! Talks to the same endpoints the web app uses, with browser-shaped
//! headers and cookie-based session state. Session state is a small JSON
//! file (session id, CSRF token, user id) that survives restarts.
//!
//! The backend is deliberately thin: metadata lookups return the raw
//! fields the resolver needs, and the built-in download methods write
//! whatever quality the API hands out. Quality selection and fallback
//! policy live in the `resolver` and `stories` modules, not here.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::shortcode::media_key_from_shortcode;
use super::{ClientError, ContentClient, DeclaredType, MediaInfo, MediaKey, Rendition, StoryItem};

/// Web origin used for login and profile lookups.
const WEB_BASE: &str = "https://www.instagram.com";

/// Private API origin used for media and story feeds.
const API_BASE: &str = "https://i.instagram.com/api/v1";

/// Instagram internal app ID (public, embedded in the web app).
const IG_APP_ID: &str = "936619743392459";

/// Browser User-Agent the web app presents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Persisted session state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionState {
    sessionid: Option<String>,
    csrftoken: Option<String>,
    ds_user_id: Option<String>,
}

impl SessionState {
    fn cookie_header(&self) -> Option<String> {
        let sessionid = self.sessionid.as_deref()?;
        let mut header = format!("sessionid={sessionid}");
        if let Some(csrf) = &self.csrftoken {
            header.push_str(&format!("; csrftoken={csrf}"));
        }
        if let Some(user_id) = &self.ds_user_id {
            header.push_str(&format!("; ds_user_id={user_id}"));
        }
        Some(header)
    }
}

/// Content client backed by the platform's private web API.
pub struct GraphClient {
    http: reqwest::Client,
    state: Mutex<SessionState>,
}

impl Default for GraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphClient {
    /// Creates a new client with browser-shaped defaults.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            http,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn snapshot(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn store(&self, state: SessionState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }

    /// Performs an authenticated GET and parses the JSON body.
    async fn get_json(&self, endpoint: &str) -> Result<Value, ClientError> {
        let mut request = self
            .http
            .get(endpoint)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("Accept", "*/*");
        if let Some(cookie) = self.snapshot().cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::network(endpoint, e))?;

        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Err(ClientError::LoginRequired);
        }
        if !response.status().is_success() {
            return Err(ClientError::api(endpoint, status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::network(endpoint, e))?;

        if body.get("message").and_then(Value::as_str) == Some("login_required") {
            return Err(ClientError::LoginRequired);
        }

        Ok(body)
    }

    /// Fetches the first item record for a media or story id.
    async fn media_item(&self, id: &str) -> Result<Value, ClientError> {
        let endpoint = format!("{API_BASE}/media/{id}/info/");
        let body = self.get_json(&endpoint).await?;
        body.pointer("/items/0")
            .cloned()
            .ok_or_else(|| ClientError::shape(&endpoint, "no items in response"))
    }

    /// Downloads a resolved binary URL into `dir` under `filename`.
    async fn download_to(
        &self,
        url: &str,
        dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::network(url, e))?;
        if !response.status().is_success() {
            return Err(ClientError::api(url, response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(url, e))?;

        let path = dir.join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ClientError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "client download complete");
        Ok(path)
    }
}

#[async_trait]
impl ContentClient for GraphClient {
    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let login_page = format!("{WEB_BASE}/accounts/login/");
        let seed = self
            .http
            .get(&login_page)
            .send()
            .await
            .map_err(|e| ClientError::network(&login_page, e))?;
        let csrf = cookie_from_response(&seed, "csrftoken")
            .ok_or_else(|| ClientError::shape(&login_page, "no csrftoken cookie"))?;

        // The web login form encodes the password with a timestamped prefix;
        // the `:0:` variant carries it without browser-side encryption.
        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{password}",
            Utc::now().timestamp()
        );
        let body = format!(
            "username={}&enc_password={}",
            urlencoding::encode(username),
            urlencoding::encode(&enc_password)
        );

        let endpoint = format!("{WEB_BASE}/accounts/login/ajax/");
        let response = self
            .http
            .post(&endpoint)
            .header("X-CSRFToken", &csrf)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("Referer", &login_page)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header(reqwest::header::COOKIE, format!("csrftoken={csrf}"))
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::network(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(ClientError::api(&endpoint, response.status().as_u16()));
        }

        let state = SessionState {
            sessionid: cookie_from_response(&response, "sessionid"),
            csrftoken: cookie_from_response(&response, "csrftoken").or(Some(csrf)),
            ds_user_id: cookie_from_response(&response, "ds_user_id"),
        };

        let outcome: Value = response
            .json()
            .await
            .map_err(|e| ClientError::network(&endpoint, e))?;
        let authenticated = outcome
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !authenticated || state.sessionid.is_none() {
            warn!("login rejected by platform");
            return Err(ClientError::LoginRequired);
        }

        self.store(state);
        info!("authenticated new session");
        Ok(())
    }

    async fn load_session(&self, path: &Path) -> Result<(), ClientError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::io(path, e))?;
        let state: SessionState =
            serde_json::from_str(&raw).map_err(|e| ClientError::Session {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        if state.sessionid.is_none() {
            return Err(ClientError::Session {
                path: path.to_path_buf(),
                detail: "no session id".to_string(),
            });
        }
        self.store(state);
        debug!(path = %path.display(), "restored session");
        Ok(())
    }

    async fn save_session(&self, path: &Path) -> Result<(), ClientError> {
        let state = self.snapshot();
        let raw = serde_json::to_string_pretty(&state).map_err(|e| ClientError::Session {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| ClientError::io(path, e))
    }

    fn media_key_from_code(&self, code: &str) -> Result<MediaKey, ClientError> {
        media_key_from_shortcode(code)
    }

    async fn media_info(&self, key: MediaKey) -> Result<MediaInfo, ClientError> {
        let endpoint = format!("{API_BASE}/media/{key}/info/");
        let body = self.get_json(&endpoint).await?;
        let item = body
            .pointer("/items/0")
            .ok_or_else(|| ClientError::shape(&endpoint, "no items in response"))?;
        parse_media_info(&endpoint, item)
    }

    async fn photo_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError> {
        let endpoint = format!("{API_BASE}/media/{key}/info/");
        let item = self.media_item(&key.to_string()).await?;
        let url = best_image_url(&item)
            .ok_or_else(|| ClientError::shape(&endpoint, "no image candidates"))?;
        self.download_to(&url, dir, &format!("{key}.jpg")).await
    }

    async fn video_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError> {
        let endpoint = format!("{API_BASE}/media/{key}/info/");
        let item = self.media_item(&key.to_string()).await?;
        let url = first_video_url(&item)
            .ok_or_else(|| ClientError::shape(&endpoint, "no video versions"))?;
        self.download_to(&url, dir, &format!("{key}.mp4")).await
    }

    async fn album_download(&self, key: MediaKey, dir: &Path) -> Result<Vec<PathBuf>, ClientError> {
        let endpoint = format!("{API_BASE}/media/{key}/info/");
        let item = self.media_item(&key.to_string()).await?;
        let children = item
            .get("carousel_media")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::shape(&endpoint, "no carousel media"))?;

        let mut paths = Vec::with_capacity(children.len());
        for (index, child) in children.iter().enumerate() {
            let child_id = child
                .get("pk")
                .map(json_id_string)
                .unwrap_or_else(|| format!("{key}_{index}"));
            if let Some(url) = first_video_url(child) {
                paths.push(
                    self.download_to(&url, dir, &format!("{child_id}.mp4"))
                        .await?,
                );
            } else if let Some(url) = best_image_url(child) {
                paths.push(
                    self.download_to(&url, dir, &format!("{child_id}.jpg"))
                        .await?,
                );
            } else {
                warn!(child = %child_id, "album item has no downloadable variant, skipping");
            }
        }
        Ok(paths)
    }

    async fn user_id_from_handle(&self, handle: &str) -> Result<u64, ClientError> {
        let endpoint = format!(
            "{WEB_BASE}/api/v1/users/web_profile_info/?username={}",
            urlencoding::encode(handle)
        );
        let body = self.get_json(&endpoint).await?;
        body.pointer("/data/user/id")
            .map(json_id_string)
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| ClientError::shape(&endpoint, "no user id"))
    }

    async fn list_stories(&self, user_id: u64) -> Result<Vec<StoryItem>, ClientError> {
        let endpoint = format!("{API_BASE}/feed/user/{user_id}/story/");
        let body = self.get_json(&endpoint).await?;
        parse_story_items(&endpoint, &body)
    }

    async fn story_download(&self, story_id: &str, dir: &Path) -> Result<PathBuf, ClientError> {
        let endpoint = format!("{API_BASE}/media/{story_id}/info/");
        let item = self.media_item(story_id).await?;
        if let Some(url) = first_video_url(&item) {
            self.download_to(&url, dir, &format!("{story_id}.mp4")).await
        } else if let Some(url) = best_image_url(&item) {
            self.download_to(&url, dir, &format!("{story_id}.jpg")).await
        } else {
            Err(ClientError::shape(&endpoint, "no downloadable variant"))
        }
    }
}

/// Extracts a named cookie value from a response's Set-Cookie headers.
fn cookie_from_response(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let (pair, _) = cookie.split_once(';').unwrap_or((cookie, ""));
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// Renders a JSON id that may be a number or a string.
fn json_id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Highest-width image candidate URL of an item record.
fn best_image_url(item: &Value) -> Option<String> {
    item.pointer("/image_versions2/candidates")
        .and_then(Value::as_array)?
        .iter()
        .max_by_key(|candidate| candidate.get("width").and_then(Value::as_u64).unwrap_or(0))
        .and_then(|candidate| candidate.get("url").and_then(Value::as_str))
        .map(String::from)
}

/// First (best) video-version URL of an item record.
fn first_video_url(item: &Value) -> Option<String> {
    item.pointer("/video_versions/0/url")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Capture timestamp of an item record.
fn taken_at(item: &Value) -> Option<DateTime<Utc>> {
    let secs = item.get("taken_at").and_then(Value::as_i64)?;
    DateTime::from_timestamp(secs, 0)
}

fn renditions(value: Option<&Value>) -> Vec<Rendition> {
    value
        .and_then(Value::as_array)
        .map(|versions| {
            versions
                .iter()
                .filter_map(|version| {
                    let url = version.get("url").and_then(Value::as_str)?;
                    let width = version.get("width").and_then(Value::as_u64).unwrap_or(0);
                    Some(Rendition {
                        url: url.to_string(),
                        width: u32::try_from(width).unwrap_or(u32::MAX),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Maps an item record into [`MediaInfo`].
fn parse_media_info(endpoint: &str, item: &Value) -> Result<MediaInfo, ClientError> {
    let owner = item
        .pointer("/user/username")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::shape(endpoint, "no owner username"))?
        .to_string();
    let declared = item
        .get("media_type")
        .and_then(Value::as_i64)
        .and_then(DeclaredType::from_code)
        .ok_or_else(|| ClientError::shape(endpoint, "unknown media type"))?;
    let taken = taken_at(item).ok_or_else(|| ClientError::shape(endpoint, "no taken_at"))?;

    let caption_text = item
        .pointer("/caption/text")
        .and_then(Value::as_str)
        .map(String::from);

    let video_versions = renditions(item.get("video_versions"));

    // Resources: album children that carry their own video variants.
    let resources = item
        .get("carousel_media")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .flat_map(|child| renditions(child.get("video_versions")).into_iter().take(1))
                .collect()
        })
        .unwrap_or_default();

    let video_url = video_versions.first().map(|r| r.url.clone());

    Ok(MediaInfo {
        owner,
        caption_text,
        taken_at: taken,
        declared,
        video_url,
        resources,
        video_versions,
    })
}

/// Maps a story-feed response into story items.
fn parse_story_items(endpoint: &str, body: &Value) -> Result<Vec<StoryItem>, ClientError> {
    let Some(items) = body.pointer("/reel/items").and_then(Value::as_array) else {
        // Accounts with no active stories come back without a reel.
        return Ok(Vec::new());
    };

    let mut stories = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .get("pk")
            .map(json_id_string)
            .ok_or_else(|| ClientError::shape(endpoint, "story item without pk"))?;
        let declared = item
            .get("media_type")
            .and_then(Value::as_i64)
            .and_then(DeclaredType::from_code)
            .ok_or_else(|| ClientError::shape(endpoint, "story item with unknown type"))?;
        let taken = taken_at(item)
            .ok_or_else(|| ClientError::shape(endpoint, "story item without taken_at"))?;
        stories.push(StoryItem {
            id,
            taken_at: taken,
            declared,
            video_url: first_video_url(item),
            image_url: best_image_url(item),
        });
    }
    Ok(stories)
}

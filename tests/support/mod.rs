//! Shared test doubles for pipeline integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use gramfetch::client::{
    ClientError, ContentClient, DeclaredType, MediaInfo, MediaKey, StoryItem,
    media_key_from_shortcode,
};
use gramfetch::deliver::{ChatRef, DeliverySink, Keyboard, MessageRef, OutboundDocument, SinkError};

/// Scripted content client covering the whole capability surface.
#[derive(Default)]
pub struct ScriptedClient {
    /// Results popped by successive `media_info` calls.
    pub infos: Mutex<VecDeque<Result<MediaInfo, ClientError>>>,
    /// Bytes written by `photo_download`.
    pub photo_bytes: Option<Vec<u8>>,
    /// Bytes written by `video_download`.
    pub video_bytes: Option<Vec<u8>>,
    /// Files written by `album_download` (name, bytes).
    pub album_files: Vec<(String, Vec<u8>)>,
    /// Items returned by `list_stories`.
    pub stories: Vec<StoryItem>,
    /// Bytes written by `story_download`.
    pub story_backup_bytes: Option<Vec<u8>>,
    /// When true, `login` fails with `LoginRequired`.
    pub reject_login: bool,
    /// Number of `login` calls observed.
    pub logins: Mutex<usize>,
    /// Number of `save_session` calls observed.
    pub session_saves: Mutex<usize>,
}

impl ScriptedClient {
    pub fn with_info(info: MediaInfo) -> Self {
        let client = Self::default();
        client.push_info(Ok(info));
        client
    }

    pub fn push_info(&self, result: Result<MediaInfo, ClientError>) {
        self.infos.lock().unwrap().push_back(result);
    }

    pub fn login_count(&self) -> usize {
        *self.logins.lock().unwrap()
    }
}

#[async_trait]
impl ContentClient for ScriptedClient {
    async fn login(&self, _username: &str, _password: &str) -> Result<(), ClientError> {
        *self.logins.lock().unwrap() += 1;
        if self.reject_login {
            return Err(ClientError::LoginRequired);
        }
        Ok(())
    }

    async fn load_session(&self, _path: &Path) -> Result<(), ClientError> {
        Ok(())
    }

    async fn save_session(&self, _path: &Path) -> Result<(), ClientError> {
        *self.session_saves.lock().unwrap() += 1;
        Ok(())
    }

    fn media_key_from_code(&self, code: &str) -> Result<MediaKey, ClientError> {
        media_key_from_shortcode(code)
    }

    async fn media_info(&self, _key: MediaKey) -> Result<MediaInfo, ClientError> {
        self.infos
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::shape("scripted", "no media_info scripted")))
    }

    async fn photo_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError> {
        let bytes = self
            .photo_bytes
            .as_ref()
            .ok_or_else(|| ClientError::shape("scripted", "no photo scripted"))?;
        let path = dir.join(format!("{key}.jpg"));
        std::fs::write(&path, bytes).map_err(|e| ClientError::io(&path, e))?;
        Ok(path)
    }

    async fn video_download(&self, key: MediaKey, dir: &Path) -> Result<PathBuf, ClientError> {
        let bytes = self
            .video_bytes
            .as_ref()
            .ok_or_else(|| ClientError::shape("scripted", "no video scripted"))?;
        let path = dir.join(format!("{key}_builtin.mp4"));
        std::fs::write(&path, bytes).map_err(|e| ClientError::io(&path, e))?;
        Ok(path)
    }

    async fn album_download(&self, _key: MediaKey, dir: &Path) -> Result<Vec<PathBuf>, ClientError> {
        let mut paths = Vec::new();
        for (name, bytes) in &self.album_files {
            let path = dir.join(name);
            std::fs::write(&path, bytes).map_err(|e| ClientError::io(&path, e))?;
            paths.push(path);
        }
        Ok(paths)
    }

    async fn user_id_from_handle(&self, _handle: &str) -> Result<u64, ClientError> {
        Ok(42)
    }

    async fn list_stories(&self, _user_id: u64) -> Result<Vec<StoryItem>, ClientError> {
        Ok(self.stories.clone())
    }

    async fn story_download(&self, story_id: &str, dir: &Path) -> Result<PathBuf, ClientError> {
        let bytes = self
            .story_backup_bytes
            .as_ref()
            .ok_or_else(|| ClientError::shape("scripted", "no story backup scripted"))?;
        let path = dir.join(format!("{story_id}_backup.bin"));
        std::fs::write(&path, bytes).map_err(|e| ClientError::io(&path, e))?;
        Ok(path)
    }
}

/// One document captured by the recording sink, with the file content
/// read at send time (the pipeline deletes delivered files afterwards).
pub struct SentDocument {
    pub chat: ChatRef,
    pub document: OutboundDocument,
    pub bytes: Vec<u8>,
}

/// Delivery sink that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingSink {
    pub texts: Mutex<Vec<(ChatRef, String, Option<Keyboard>)>>,
    pub edits: Mutex<Vec<(ChatRef, MessageRef, String)>>,
    pub documents: Mutex<Vec<SentDocument>>,
    /// Document filenames that should fail to send.
    pub fail_documents: Vec<String>,
    pub next_message: AtomicI32,
}

impl RecordingSink {
    /// All progress/text messages in order, edits included.
    pub fn all_texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self
            .texts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text, _)| text.clone())
            .collect();
        texts.extend(
            self.edits
                .lock()
                .unwrap()
                .iter()
                .map(|(_, _, text)| text.clone()),
        );
        texts
    }

    /// The text of the most recent edit (the final status message).
    pub fn last_edit(&self) -> Option<String> {
        self.edits
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, text)| text.clone())
    }

    pub fn sent_filenames(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .map(|sent| sent.document.filename.clone())
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, SinkError> {
        self.texts
            .lock()
            .unwrap()
            .push((chat, text.to_string(), keyboard));
        Ok(self.next_message.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
    ) -> Result<(), SinkError> {
        self.edits
            .lock()
            .unwrap()
            .push((chat, message, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatRef,
        document: &OutboundDocument,
    ) -> Result<(), SinkError> {
        if self.fail_documents.contains(&document.filename) {
            return Err(SinkError::request("send_document", "scripted failure"));
        }
        let bytes = std::fs::read(&document.path)
            .map_err(|e| SinkError::request("send_document", e.to_string()))?;
        self.documents.lock().unwrap().push(SentDocument {
            chat,
            document: document.clone(),
            bytes,
        });
        Ok(())
    }
}

/// Fixed capture instant used across tests.
pub fn captured(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Metadata for a photo post by `somebody`.
pub fn photo_info(caption: Option<&str>) -> MediaInfo {
    MediaInfo {
        owner: "somebody".to_string(),
        caption_text: caption.map(String::from),
        taken_at: captured(1_722_000_000),
        declared: DeclaredType::Photo,
        video_url: None,
        resources: Vec::new(),
        video_versions: Vec::new(),
    }
}

/// A video story item.
pub fn video_story(id: &str, secs: i64, url: Option<String>) -> StoryItem {
    StoryItem {
        id: id.to_string(),
        taken_at: captured(secs),
        declared: DeclaredType::Video,
        video_url: url,
        image_url: None,
    }
}

/// A photo story item.
pub fn image_story(id: &str, secs: i64, url: Option<String>) -> StoryItem {
    StoryItem {
        id: id.to_string(),
        taken_at: captured(secs),
        declared: DeclaredType::Photo,
        video_url: None,
        image_url: url,
    }
}

//! End-to-end per-request orchestration.
//!
//! One incoming message is processed on one cooperative task:
//! classification, resolution or story aggregation, sequential delivery,
//! then cleanup. A progress message is posted immediately and edited
//! through the stages. Only malformed URLs, empty results, and
//! "nothing survived the pipeline" reach the user as actionable
//! messages; everything else degrades to a partial result.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::classify;
use crate::cleanup::{remove_delivered, remove_staging_if_empty};
use crate::client::{ClientError, ContentClient};
use crate::deliver::{Button, ChatRef, DeliverySink, MessageRef, deliver_batch};
use crate::fetch::Fetcher;
use crate::media::AssetBatch;
use crate::parser::ContentReference;
use crate::resolver::resolve_post;
use crate::stories::collect_stories;

/// Rejection shown for unrecognized input.
const INVALID_URL_MESSAGE: &str = "Please send a valid Instagram URL.";

/// Terminal message when a post yields no assets.
const NOT_FOUND_MESSAGE: &str = "⚠️ Could not download. Possible reasons:\n\
    • The post was deleted\n\
    • The account is private\n\
    • The story has expired\n\
    • Instagram is limiting access";

/// Content-platform credentials used for re-authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Errors that abort a request after classification.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The content client failed terminally.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Staging storage could not be prepared.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// The download-and-deliver pipeline.
///
/// Holds the shared client handle and delivery sink; each incoming
/// message runs through [`Pipeline::process_message`] independently.
pub struct Pipeline {
    client: Arc<dyn ContentClient>,
    sink: Arc<dyn DeliverySink>,
    fetcher: Fetcher,
    credentials: Credentials,
    download_root: PathBuf,
    session_file: PathBuf,
}

impl Pipeline {
    /// Creates a pipeline over the given client and sink.
    #[must_use]
    pub fn new(
        client: Arc<dyn ContentClient>,
        sink: Arc<dyn DeliverySink>,
        credentials: Credentials,
        download_root: PathBuf,
        session_file: PathBuf,
    ) -> Self {
        Self {
            client,
            sink,
            fetcher: Fetcher::new(),
            credentials,
            download_root,
            session_file,
        }
    }

    /// Processes one incoming chat message end-to-end.
    ///
    /// Never returns an error: every failure mode ends in a user-facing
    /// message or a logged partial result.
    #[instrument(skip(self, text))]
    pub async fn process_message(&self, chat: ChatRef, text: &str) {
        let reference = match classify(text) {
            Ok(reference) => reference,
            Err(e) => {
                debug!(error = %e, "rejecting unrecognized input");
                self.send_or_log(chat, INVALID_URL_MESSAGE).await;
                return;
            }
        };

        let progress = match self.sink.send_text(chat, "⌛ Processing...", None).await {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "could not post progress message, dropping request");
                return;
            }
        };

        if let Err(e) = self.run(chat, progress, &reference).await {
            error!(error = %e, "request failed");
            self.edit_or_log(
                chat,
                progress,
                &format!("❌ Something went wrong: {e}\nPlease try again later."),
            )
            .await;
        }
    }

    /// The fallible stages between classification and the final status.
    async fn run(
        &self,
        chat: ChatRef,
        progress: MessageRef,
        reference: &ContentReference,
    ) -> Result<(), PipelineError> {
        self.edit_or_log(chat, progress, "🔍 Checking URL...").await;

        let staging = self.download_root.join(reference.staging_dir_name());
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| PipelineError::Io {
                path: staging.clone(),
                source: e,
            })?;

        let batch = if reference.is_story() {
            let handle = &reference.primary_id;
            self.edit_or_log(
                chat,
                progress,
                &format!("📥 Downloading stories from @{handle}..."),
            )
            .await;

            let batch = self.collect_stories_with_reauth(reference, &staging).await?;
            if batch.is_empty() {
                self.edit_or_log(chat, progress, &format!("⚠️ No stories found from @{handle}"))
                    .await;
                return Ok(());
            }
            self.edit_or_log(
                chat,
                progress,
                &format!(
                    "✅ Found {} stories from @{handle}\n⌛ Preparing to send...",
                    batch.len()
                ),
            )
            .await;
            batch
        } else {
            self.edit_or_log(chat, progress, "📥 Downloading content...").await;
            let batch = self.resolve_post_with_reauth(reference, &staging).await?;
            if batch.is_empty() {
                self.edit_or_log(chat, progress, NOT_FOUND_MESSAGE).await;
                return Ok(());
            }
            batch
        };

        // Post summary with a profile button, above the files.
        if let Some(summary) = batch.first().and_then(|asset| asset.summary.as_ref()) {
            let keyboard = vec![vec![Button::url(
                format!("@{}", summary.owner),
                summary.owner_profile_url(),
            )]];
            if let Err(e) = self
                .sink
                .send_text(chat, &summary.message_text(), Some(keyboard))
                .await
            {
                error!(error = %e, "failed to send post summary");
            }
        }

        self.edit_or_log(
            chat,
            progress,
            &format!("📤 Sending {} file(s)...", batch.len()),
        )
        .await;

        let (stats, delivered) = deliver_batch(
            self.sink.as_ref(),
            chat,
            &batch,
            reference.base_file_name(),
            Utc::now(),
        )
        .await;

        remove_delivered(&delivered).await;
        remove_staging_if_empty(&staging).await;

        if stats.is_empty() {
            self.edit_or_log(chat, progress, "❌ Could not deliver the content")
                .await;
        } else {
            let owner = batch.first().map_or_else(String::new, |a| a.owner.clone());
            let headline = if reference.is_story() {
                format!("✅ Downloaded stories from @{owner}!")
            } else {
                format!("✅ Downloaded {} from @{owner}!", reference.display_label())
            };
            info!(videos = stats.videos, images = stats.images, "request complete");
            self.edit_or_log(chat, progress, &format!("{headline}\n\n{}", stats.status_lines()))
                .await;
        }
        Ok(())
    }

    /// Resolves a post, retrying exactly once after a re-login.
    async fn resolve_post_with_reauth(
        &self,
        reference: &ContentReference,
        staging: &std::path::Path,
    ) -> Result<AssetBatch, ClientError> {
        match resolve_post(
            self.client.as_ref(),
            &self.fetcher,
            &reference.primary_id,
            staging,
        )
        .await
        {
            Err(ClientError::LoginRequired) => {
                self.reauthenticate().await?;
                resolve_post(
                    self.client.as_ref(),
                    &self.fetcher,
                    &reference.primary_id,
                    staging,
                )
                .await
            }
            other => other,
        }
    }

    /// Collects stories, retrying exactly once after a re-login.
    async fn collect_stories_with_reauth(
        &self,
        reference: &ContentReference,
        staging: &std::path::Path,
    ) -> Result<AssetBatch, ClientError> {
        match collect_stories(
            self.client.as_ref(),
            &self.fetcher,
            &reference.primary_id,
            reference.secondary_id.as_deref(),
            staging,
        )
        .await
        {
            Err(ClientError::LoginRequired) => {
                self.reauthenticate().await?;
                collect_stories(
                    self.client.as_ref(),
                    &self.fetcher,
                    &reference.primary_id,
                    reference.secondary_id.as_deref(),
                    staging,
                )
                .await
            }
            other => other,
        }
    }

    /// Re-logs-in with the configured credentials and persists the
    /// refreshed session. A second `LoginRequired` is terminal.
    async fn reauthenticate(&self) -> Result<(), ClientError> {
        warn!("login required, re-authenticating");
        self.client
            .login(&self.credentials.username, &self.credentials.password)
            .await?;
        if let Err(e) = self.client.save_session(&self.session_file).await {
            error!(error = %e, "failed to persist refreshed session");
        }
        Ok(())
    }

    async fn send_or_log(&self, chat: ChatRef, text: &str) {
        if let Err(e) = self.sink.send_text(chat, text, None).await {
            error!(error = %e, "failed to send message");
        }
    }

    async fn edit_or_log(&self, chat: ChatRef, message: MessageRef, text: &str) {
        if let Err(e) = self.sink.edit_text(chat, message, text).await {
            error!(error = %e, "failed to edit progress message");
        }
    }
}

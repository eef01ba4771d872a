//! Telegram-backed [`DeliverySink`].
//!
//! Thin wrapper around `teloxide::Bot`. Upload timeouts live on the
//! underlying HTTP client, so the sink holds two bot handles sharing one
//! token: the default one for text and images, and a long-timeout one
//! for video uploads.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use tracing::warn;
use url::Url;

use super::sink::{
    Button, ButtonAction, ChatRef, DeliverySink, Keyboard, MessageRef, OutboundDocument, SinkError,
};
use crate::client::MediaKind;

/// Connect timeout for Telegram API calls.
const CONNECT_TIMEOUT_SECS: u64 = 60;

/// Read/write window for text and image transfers.
const IMAGE_TRANSFER_TIMEOUT_SECS: u64 = 120;

/// Read/write window for video transfers.
const VIDEO_TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Delivery sink over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    video_bot: Bot,
}

impl TelegramSink {
    /// Creates a sink from a bot token.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(token: &str) -> Self {
        let bot = Bot::with_client(
            token.to_string(),
            http_client(IMAGE_TRANSFER_TIMEOUT_SECS),
        );
        let video_bot = Bot::with_client(
            token.to_string(),
            http_client(VIDEO_TRANSFER_TIMEOUT_SECS),
        );
        Self { bot, video_bot }
    }

    /// Creates a sink around an existing bot (shared with the dispatcher).
    #[must_use]
    pub fn from_bot(bot: Bot) -> Self {
        let video_bot = Bot::with_client(
            bot.token().to_string(),
            http_client(VIDEO_TRANSFER_TIMEOUT_SECS),
        );
        Self { bot, video_bot }
    }
}

#[allow(clippy::expect_used)]
fn http_client(transfer_timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(transfer_timeout_secs))
        .build()
        .expect("failed to build HTTP client with static configuration")
}

/// Converts the opaque keyboard rows into Telegram markup.
fn to_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.into_iter().map(|row| {
        row.into_iter()
            .filter_map(to_button)
            .collect::<Vec<InlineKeyboardButton>>()
    });
    InlineKeyboardMarkup::new(rows)
}

fn to_button(button: Button) -> Option<InlineKeyboardButton> {
    match button.action {
        ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(button.label, data)),
        ButtonAction::Url(raw) => match Url::parse(&raw) {
            Ok(url) => Some(InlineKeyboardButton::url(button.label, url)),
            Err(e) => {
                warn!(url = %raw, error = %e, "dropping keyboard button with invalid URL");
                None
            }
        },
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, SinkError> {
        let mut request = self.bot.send_message(ChatId(chat), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        let message = request
            .await
            .map_err(|e| SinkError::request("send_text", e.to_string()))?;
        Ok(message.id.0)
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
    ) -> Result<(), SinkError> {
        self.bot
            .edit_message_text(ChatId(chat), MessageId(message), text)
            .await
            .map_err(|e| SinkError::request("edit_text", e.to_string()))?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatRef,
        document: &OutboundDocument,
    ) -> Result<(), SinkError> {
        let file = InputFile::file(document.path.clone()).file_name(document.filename.clone());
        match document.kind {
            // Video goes through the long-timeout client, delivered as a
            // generic document so the platform does not reinterpret it.
            MediaKind::Video => {
                self.video_bot
                    .send_document(ChatId(chat), file)
                    .caption(document.caption.clone())
                    .disable_content_type_detection(true)
                    .await
                    .map_err(|e| SinkError::request("send_document", e.to_string()))?;
            }
            MediaKind::Image => {
                self.bot
                    .send_document(ChatId(chat), file)
                    .caption(document.caption.clone())
                    .await
                    .map_err(|e| SinkError::request("send_document", e.to_string()))?;
            }
        }
        Ok(())
    }
}

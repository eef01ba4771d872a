//! Chat-platform delivery surface.
//!
//! The pipeline never talks to Telegram directly; it goes through
//! [`DeliverySink`], which tests replace with a recording double.
//! Keyboards are opaque label→action rows so the surface stays free of
//! platform types.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::client::MediaKind;

/// Chat identifier on the delivery platform.
pub type ChatRef = i64;

/// Identifier of a previously sent message, for in-place edits.
pub type MessageRef = i32;

/// What pressing an inline keyboard button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Sends the given callback data back to the bot.
    Callback(String),
    /// Opens the given URL.
    Url(String),
}

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    /// Creates a URL button.
    #[must_use]
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    /// Creates a callback button.
    #[must_use]
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }
}

/// Inline keyboard: rows of buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// A file ready to be sent as a document.
#[derive(Debug, Clone)]
pub struct OutboundDocument {
    /// Local file to upload.
    pub path: PathBuf,
    /// Filename presented to the recipient.
    pub filename: String,
    /// Caption under the document.
    pub caption: String,
    /// Media kind; the sink derives its timeout policy from this and
    /// disables content-type auto-detection for video.
    pub kind: MediaKind,
}

/// Errors surfaced by delivery sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The platform rejected or failed the request.
    #[error("{operation} failed: {detail}")]
    Request {
        /// Which sink operation failed.
        operation: &'static str,
        /// Platform-reported detail.
        detail: String,
    },
}

impl SinkError {
    /// Creates a request error for an operation.
    pub fn request(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Request {
            operation,
            detail: detail.into(),
        }
    }
}

/// The delivery surface consumed by the pipeline.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Sends a text message, returning its id for later edits.
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, SinkError>;

    /// Edits a previously sent text message in place.
    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
    ) -> Result<(), SinkError>;

    /// Uploads a file as a document.
    async fn send_document(
        &self,
        chat: ChatRef,
        document: &OutboundDocument,
    ) -> Result<(), SinkError>;
}

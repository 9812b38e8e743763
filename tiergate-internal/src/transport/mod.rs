pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::types::{ChatId, UserId};

pub use telegram::TelegramClient;

/// A photo as referenced by the transport. The bytes stay on the transport side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub file_id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A `/command`, stored without arguments and with the leading slash
    Command(String),
    Text(String),
    Photo(Photo),
    Callback { id: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn callback_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Callback { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineAction {
    Url(Url),
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineChoice {
    pub label: String,
    pub action: InlineAction,
}

impl InlineChoice {
    pub fn url(label: impl Into<String>, url: Url) -> Self {
        Self {
            label: label.into(),
            action: InlineAction::Url(url),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: InlineAction::Callback(data.into()),
        }
    }
}

/// Choices attached to a reply: either a persistent keyboard of labels the
/// user sends back as text, or buttons attached to the message itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceSet {
    Keyboard(Vec<Vec<String>>),
    Inline(Vec<Vec<InlineChoice>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(Url),
    Bytes { file_name: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub source: MediaSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub choices: Option<ChoiceSet>,
    pub media: Option<MediaAttachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: None,
            media: None,
        }
    }

    pub fn with_choices(mut self, choices: ChoiceSet) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }
}

/// Chat transport boundary: inbound events in, replies out.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next batch of events. An empty batch is not an error.
    async fn poll(&self) -> Result<Vec<InboundEvent>, Error>;

    async fn send(&self, chat_id: ChatId, reply: &Reply) -> Result<(), Error>;

    /// Stops the client-side spinner on a pressed inline button
    async fn acknowledge(&self, callback_id: &str) -> Result<(), Error>;
}

use serde::Serialize;

use crate::types::Feature;

/// Where a user is in the conversation. Decides how free text and photos are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingChatText,
    AwaitingImagePrompt,
    AwaitingMusicPrompt,
    AwaitingVideoPrompt,
    AwaitingDocument,
}

impl ConversationState {
    pub fn awaiting(feature: Feature) -> Self {
        match feature {
            Feature::Chat => ConversationState::AwaitingChatText,
            Feature::Image => ConversationState::AwaitingImagePrompt,
            Feature::Music => ConversationState::AwaitingMusicPrompt,
            Feature::Video => ConversationState::AwaitingVideoPrompt,
            Feature::Document => ConversationState::AwaitingDocument,
        }
    }

    /// The feature whose input this state is waiting for, `None` when idle
    pub fn awaited_feature(&self) -> Option<Feature> {
        match self {
            ConversationState::Idle => None,
            ConversationState::AwaitingChatText => Some(Feature::Chat),
            ConversationState::AwaitingImagePrompt => Some(Feature::Image),
            ConversationState::AwaitingMusicPrompt => Some(Feature::Music),
            ConversationState::AwaitingVideoPrompt => Some(Feature::Video),
            ConversationState::AwaitingDocument => Some(Feature::Document),
        }
    }
}

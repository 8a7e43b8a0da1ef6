/// WebSocket Message Protocol
///
/// Frames exchanged over the live channel. Every frame is a JSON object
/// tagged by `type`.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::{
    conversation::{model::InboxEntry, schema::ConversationEntity},
    message::schema::MessageEntity,
};

/// Frames sent by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Attach an identity to the connection
    #[serde(rename_all = "camelCase")]
    Auth { token: String },

    /// Open a conversation and start watching its messages.
    /// Exactly one of the two fields is expected.
    #[serde(rename_all = "camelCase")]
    OpenConversation {
        #[serde(default)]
        artist_id: Option<String>,
        #[serde(default)]
        conversation_id: Option<Uuid>,
    },

    /// Stop watching a conversation
    #[serde(rename_all = "camelCase")]
    CloseConversation { conversation_id: Uuid },

    #[serde(rename_all = "camelCase")]
    SendMessage { conversation_id: Uuid, text: String },

    /// Watch the caller's inbox as an artist
    WatchInbox,

    UnwatchInbox,

    Ping,
}

/// Which live watch a frame refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum WatchKey {
    #[serde(rename_all = "camelCase")]
    Conversation { conversation_id: Uuid },
    Inbox,
}

/// Frames sent by the server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: String },

    #[serde(rename_all = "camelCase")]
    AuthFailed { reason: String },

    #[serde(rename_all = "camelCase")]
    ConversationOpened { conversation: ConversationEntity },

    /// Full ordered message sequence of a watched conversation
    #[serde(rename_all = "camelCase")]
    MessagesSnapshot { conversation_id: Uuid, messages: Vec<MessageEntity> },

    #[serde(rename_all = "camelCase")]
    InboxSnapshot { conversations: Vec<InboxEntry> },

    /// A watch ended with an unrecoverable error. No further snapshots follow.
    #[serde(rename_all = "camelCase")]
    SubscriptionFailed {
        #[serde(flatten)]
        watch: WatchKey,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    MessageSent { message: MessageEntity },

    Pong,

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}
